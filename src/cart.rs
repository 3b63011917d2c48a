//! Cart ledger: the live, mutable (phone, quantity) rows for each user.
//!
//! Line and cart totals are recomputed from the current catalog on every
//! read; unlike order snapshots, a cart view always reflects today's
//! prices. Adding a phone already in the cart merges quantities instead
//! of creating a second row.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;

use crate::auth::CurrentUser;
use crate::catalog;
use crate::error::{ApiError, Result};
use crate::AppState;

pub const MIN_QUANTITY: i64 = 1;
pub const MAX_QUANTITY: i64 = 99;

fn check_quantity(quantity: i64) -> Result<()> {
    if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
        return Err(ApiError::Validation(format!(
            "quantity must be between {MIN_QUANTITY} and {MAX_QUANTITY}"
        )));
    }
    Ok(())
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: i64,
    quantity: i64,
    created_at: DateTime<Utc>,
    phone_id: i64,
    phone_name: String,
    brand_name: String,
    price: i64,
    image_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CartItemView {
    pub id: i64,
    pub quantity: i64,
    pub created_at: DateTime<Utc>,
    pub phone_id: i64,
    pub phone_name: String,
    pub brand_name: String,
    pub price: i64,
    pub image_url: Option<String>,
    pub item_total: i64,
}

#[derive(Debug, Serialize)]
pub struct CartSummary {
    pub total_items: i64,
    pub total_amount: i64,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub summary: CartSummary,
}

/// The user's cart joined live against the catalog.
pub async fn list_cart(pool: &SqlitePool, user_id: i64) -> Result<CartView> {
    let rows = sqlx::query_as::<_, CartRow>(
        "SELECT ci.id, ci.quantity, ci.created_at,
                p.id AS phone_id, p.model_name AS phone_name, b.name AS brand_name,
                COALESCE(p.our_price, p.official_price, 0) AS price, p.image_url
         FROM cart_items ci
         JOIN phones p ON p.id = ci.phone_id
         JOIN brands b ON b.id = p.brand_id
         WHERE ci.user_id = ?
         ORDER BY ci.created_at DESC, ci.id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let items: Vec<CartItemView> = rows
        .into_iter()
        .map(|r| CartItemView {
            item_total: r.price * r.quantity,
            id: r.id,
            quantity: r.quantity,
            created_at: r.created_at,
            phone_id: r.phone_id,
            phone_name: r.phone_name,
            brand_name: r.brand_name,
            price: r.price,
            image_url: r.image_url,
        })
        .collect();

    let total_items = items.iter().map(|i| i.quantity).sum();
    let total_amount = items.iter().map(|i| i.item_total).sum();

    Ok(CartView {
        items,
        summary: CartSummary {
            total_items,
            total_amount,
        },
    })
}

#[derive(Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// A new row was created.
    Added,
    /// The (user, phone) row existed; quantity now holds the merged total.
    Merged { quantity: i64 },
}

pub async fn add_item(
    pool: &SqlitePool,
    user_id: i64,
    phone_id: i64,
    quantity: i64,
) -> Result<AddOutcome> {
    check_quantity(quantity)?;
    if !catalog::phone_exists(pool, phone_id).await? {
        return Err(ApiError::NotFound("phone"));
    }

    let existing: Option<(i64, i64)> =
        sqlx::query_as("SELECT id, quantity FROM cart_items WHERE user_id = ? AND phone_id = ?")
            .bind(user_id)
            .bind(phone_id)
            .fetch_optional(pool)
            .await?;

    match existing {
        Some((item_id, current)) => {
            let merged = current + quantity;
            sqlx::query(
                "UPDATE cart_items SET quantity = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
            )
            .bind(merged)
            .bind(item_id)
            .execute(pool)
            .await?;
            Ok(AddOutcome::Merged { quantity: merged })
        }
        None => {
            sqlx::query("INSERT INTO cart_items (user_id, phone_id, quantity) VALUES (?, ?, ?)")
                .bind(user_id)
                .bind(phone_id)
                .bind(quantity)
                .execute(pool)
                .await?;
            Ok(AddOutcome::Added)
        }
    }
}

/// Ownership is enforced by filtering on `id AND user_id` in one
/// predicate, so "not yours" and "does not exist" are the same outcome.
pub async fn update_quantity(
    pool: &SqlitePool,
    user_id: i64,
    item_id: i64,
    quantity: i64,
) -> Result<()> {
    check_quantity(quantity)?;
    let result = sqlx::query(
        "UPDATE cart_items SET quantity = ?, updated_at = CURRENT_TIMESTAMP
         WHERE id = ? AND user_id = ?",
    )
    .bind(quantity)
    .bind(item_id)
    .bind(user_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("cart item"));
    }
    Ok(())
}

pub async fn remove_item(pool: &SqlitePool, user_id: i64, item_id: i64) -> Result<()> {
    let result = sqlx::query("DELETE FROM cart_items WHERE id = ? AND user_id = ?")
        .bind(item_id)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("cart item"));
    }
    Ok(())
}

/// Remove every cart row for the user. A no-op on an empty cart.
pub async fn clear_cart(pool: &SqlitePool, user_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = ?")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn get_cart(State(state): State<AppState>, user: CurrentUser) -> Result<Json<CartView>> {
    Ok(Json(list_cart(state.db.pool(), user.id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub phone_id: i64,
    pub quantity: i64,
}

pub async fn add(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<AddItemRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    match add_item(state.db.pool(), user.id, req.phone_id, req.quantity).await? {
        AddOutcome::Added => Ok((
            StatusCode::CREATED,
            Json(json!({ "message": "added to cart" })),
        )),
        AddOutcome::Merged { quantity } => Ok((
            StatusCode::OK,
            Json(json!({ "message": "cart quantity updated", "quantity": quantity })),
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

pub async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(item_id): Path<i64>,
    Json(req): Json<UpdateQuantityRequest>,
) -> Result<Json<Value>> {
    update_quantity(state.db.pool(), user.id, item_id, req.quantity).await?;
    Ok(Json(
        json!({ "message": "quantity updated", "quantity": req.quantity }),
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(item_id): Path<i64>,
) -> Result<Json<Value>> {
    remove_item(state.db.pool(), user.id, item_id).await?;
    Ok(Json(json!({ "message": "removed from cart" })))
}

pub async fn clear(State(state): State<AppState>, user: CurrentUser) -> Result<Json<Value>> {
    clear_cart(state.db.pool(), user.id).await?;
    Ok(Json(json!({ "message": "cart cleared" })))
}

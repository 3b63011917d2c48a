//! Order engine: transactional checkout and the order status lifecycle.
//!
//! Checkout converts the cart into an immutable order inside one
//! transaction: load the cart joined with the live catalog, total it,
//! insert the order row, snapshot every line into `order_items`, then
//! empty the cart. If any step fails nothing persists and the cart
//! survives untouched.
//!
//! There is no payment gateway; checkout records an instantly paid order.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use validator::Validate;

use crate::auth::CurrentUser;
use crate::error::{is_unique_violation, ApiError, Result};
use crate::models::{Order, OrderItem, OrderStatus};
use crate::AppState;

/// How many order numbers to try before giving up. The 4-digit suffix is
/// random, so a same-day collision is possible under concurrent checkouts;
/// the unique index catches it and we regenerate.
const ORDER_NUMBER_ATTEMPTS: u32 = 3;

/// Human-readable order identifier: `ORD-<YYYYMMDD>-<4 random digits>`.
pub fn generate_order_number() -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..10_000);
    format!("ORD-{}-{suffix:04}", Utc::now().format("%Y%m%d"))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[validate(length(min = 1, message = "recipient name is required"))]
    pub recipient_name: String,
    #[validate(length(min = 1, message = "recipient phone is required"))]
    pub recipient_phone: String,
    #[validate(length(min = 1, message = "shipping address is required"))]
    pub shipping_address: String,
    #[validate(length(min = 1, message = "payment method is required"))]
    pub payment_method: String,
    /// Accepted and discarded; nothing is charged.
    pub credit_card_number: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    pub id: i64,
    pub order_number: String,
    pub total_amount: i64,
}

/// One cart line joined with the current catalog, captured for snapshotting.
#[derive(Debug, sqlx::FromRow)]
struct CartLine {
    phone_id: i64,
    phone_name: String,
    brand_name: String,
    price: i64,
    quantity: i64,
}

/// Place an order from the user's cart, retrying on an order-number
/// collision with a fresh number.
pub async fn checkout(
    pool: &SqlitePool,
    user_id: i64,
    details: &CheckoutRequest,
) -> Result<CheckoutReceipt> {
    let mut attempts = 0;
    loop {
        attempts += 1;
        match place_order(pool, user_id, details, &generate_order_number()).await {
            Err(ApiError::Database(e))
                if attempts < ORDER_NUMBER_ATTEMPTS && is_unique_violation(&e) =>
            {
                tracing::warn!(attempt = attempts, "order number collision, regenerating");
            }
            other => return other,
        }
    }
}

/// The checkout transaction proper, with the order number supplied so a
/// collision can be retried (and forced under test).
pub(crate) async fn place_order(
    pool: &SqlitePool,
    user_id: i64,
    details: &CheckoutRequest,
    order_number: &str,
) -> Result<CheckoutReceipt> {
    let mut tx = pool.begin().await?;

    let lines = sqlx::query_as::<_, CartLine>(
        "SELECT p.id AS phone_id, p.model_name AS phone_name, b.name AS brand_name,
                COALESCE(p.our_price, p.official_price, 0) AS price, ci.quantity
         FROM cart_items ci
         JOIN phones p ON p.id = ci.phone_id
         JOIN brands b ON b.id = p.brand_id
         WHERE ci.user_id = ?
         ORDER BY ci.id",
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    if lines.is_empty() {
        return Err(ApiError::Validation("cart is empty".to_string()));
    }

    let total_amount: i64 = lines.iter().map(|l| l.price * l.quantity).sum();

    let order_id: i64 = sqlx::query_scalar(
        "INSERT INTO orders (user_id, order_number, status, total_amount,
                             payment_method, payment_status,
                             recipient_name, recipient_phone, shipping_address, paid_at)
         VALUES (?, ?, 'paid', ?, ?, 'paid', ?, ?, ?, ?)
         RETURNING id",
    )
    .bind(user_id)
    .bind(order_number)
    .bind(total_amount)
    .bind(&details.payment_method)
    .bind(&details.recipient_name)
    .bind(&details.recipient_phone)
    .bind(&details.shipping_address)
    .bind(Utc::now())
    .fetch_one(&mut *tx)
    .await?;

    for line in &lines {
        sqlx::query(
            "INSERT INTO order_items (order_id, phone_id, phone_name, brand_name,
                                      price, quantity, subtotal)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order_id)
        .bind(line.phone_id)
        .bind(&line.phone_name)
        .bind(&line.brand_name)
        .bind(line.price)
        .bind(line.quantity)
        .bind(line.price * line.quantity)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("DELETE FROM cart_items WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(order_id, order_number, total_amount, "order placed");
    Ok(CheckoutReceipt {
        id: order_id,
        order_number: order_number.to_string(),
        total_amount,
    })
}

/// Cancel an order the actor owns. Guards run in order: existence,
/// ownership, then status.
pub async fn cancel_order(pool: &SqlitePool, user_id: i64, order_id: i64) -> Result<()> {
    let row: Option<(i64, OrderStatus)> =
        sqlx::query_as("SELECT user_id, status FROM orders WHERE id = ?")
            .bind(order_id)
            .fetch_optional(pool)
            .await?;
    let (owner_id, status) = row.ok_or(ApiError::NotFound("order"))?;

    if owner_id != user_id {
        return Err(ApiError::Forbidden);
    }
    if status == OrderStatus::Cancelled {
        return Err(ApiError::InvalidState("order is already cancelled"));
    }
    if !status.is_cancellable() {
        return Err(ApiError::InvalidState(
            "order has shipped and can no longer be cancelled",
        ));
    }

    sqlx::query("UPDATE orders SET status = 'cancelled' WHERE id = ?")
        .bind(order_id)
        .execute(pool)
        .await?;
    tracing::info!(order_id, "order cancelled");
    Ok(())
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderSummary {
    pub id: i64,
    pub order_number: String,
    pub status: OrderStatus,
    pub total_amount: i64,
    pub payment_status: String,
    pub created_at: DateTime<Utc>,
    pub item_count: i64,
}

pub async fn list_orders(pool: &SqlitePool, user_id: i64) -> Result<Vec<OrderSummary>> {
    let orders = sqlx::query_as::<_, OrderSummary>(
        "SELECT o.id, o.order_number, o.status, o.total_amount, o.payment_status,
                o.created_at, COUNT(oi.id) AS item_count
         FROM orders o
         LEFT JOIN order_items oi ON oi.order_id = o.id
         WHERE o.user_id = ?
         GROUP BY o.id
         ORDER BY o.created_at DESC, o.id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(orders)
}

#[derive(Debug, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Fetch an order by its human-readable number, scoped to the actor so
/// other users' numbers are indistinguishable from unknown ones.
pub async fn get_order_by_number(
    pool: &SqlitePool,
    user_id: i64,
    order_number: &str,
) -> Result<OrderDetail> {
    let order = sqlx::query_as::<_, Order>(
        "SELECT * FROM orders WHERE order_number = ? AND user_id = ?",
    )
    .bind(order_number)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ApiError::NotFound("order"))?;

    let items = sqlx::query_as::<_, OrderItem>(
        "SELECT id, order_id, phone_id, phone_name, brand_name, price, quantity, subtotal
         FROM order_items
         WHERE order_id = ?
         ORDER BY id",
    )
    .bind(order.id)
    .fetch_all(pool)
    .await?;

    Ok(OrderDetail { order, items })
}

#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct OrderTracking {
    pub id: i64,
    pub order_number: String,
    pub status: OrderStatus,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub shipping_address: String,
    pub created_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

pub async fn get_tracking(
    pool: &SqlitePool,
    user_id: i64,
    order_id: i64,
) -> Result<OrderTracking> {
    sqlx::query_as::<_, OrderTracking>(
        "SELECT id, order_number, status, recipient_name, recipient_phone,
                shipping_address, created_at, paid_at, shipped_at, delivered_at
         FROM orders
         WHERE id = ? AND user_id = ?",
    )
    .bind(order_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ApiError::NotFound("order"))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn checkout_handler(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<Value>)> {
    req.validate()?;
    let receipt = checkout(state.db.pool(), user.id, &req).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "message": "order placed", "order": receipt })),
    ))
}

pub async fn cancel(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Json<Value>> {
    cancel_order(state.db.pool(), user.id, order_id).await?;
    Ok(Json(json!({ "message": "order cancelled" })))
}

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<OrderSummary>>> {
    Ok(Json(list_orders(state.db.pool(), user.id).await?))
}

pub async fn get_by_number(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_number): Path<String>,
) -> Result<Json<OrderDetail>> {
    Ok(Json(
        get_order_by_number(state.db.pool(), user.id, &order_number).await?,
    ))
}

pub async fn tracking(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<i64>,
) -> Result<Json<OrderTracking>> {
    Ok(Json(get_tracking(state.db.pool(), user.id, order_id).await?))
}

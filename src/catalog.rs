//! Read-only catalog access: brands, phones and effective pricing.
//!
//! Nothing here mutates state; failures are plain not-found signals.

use axum::extract::{Path, State};
use axum::Json;

use sqlx::SqlitePool;

use crate::error::{ApiError, Result};
use crate::models::{Brand, PhoneDetail, PhoneSummary};
use crate::AppState;

/// How many phones the popularity listing returns.
const POPULAR_LIMIT: i64 = 20;

/// The price actually charged: `our_price` when set, else the official
/// list price, else zero.
pub async fn effective_price(pool: &SqlitePool, phone_id: i64) -> Result<i64> {
    sqlx::query_scalar(
        "SELECT COALESCE(our_price, official_price, 0) FROM phones WHERE id = ?",
    )
    .bind(phone_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ApiError::NotFound("phone"))
}

pub async fn phone_exists(pool: &SqlitePool, phone_id: i64) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM phones WHERE id = ?)")
        .bind(phone_id)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

pub async fn list_brands(State(state): State<AppState>) -> Result<Json<Vec<Brand>>> {
    let brands = sqlx::query_as::<_, Brand>(
        "SELECT id, name, logo_url FROM brands ORDER BY name",
    )
    .fetch_all(state.db.pool())
    .await?;
    Ok(Json(brands))
}

pub async fn list_brand_phones(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<PhoneSummary>>> {
    let pool = state.db.pool();

    let brand_id: Option<i64> = sqlx::query_scalar("SELECT id FROM brands WHERE name = ?")
        .bind(&name)
        .fetch_optional(pool)
        .await?;
    let brand_id = brand_id.ok_or(ApiError::NotFound("brand"))?;

    let phones = sqlx::query_as::<_, PhoneSummary>(
        "SELECT p.id, p.model_name, b.name AS brand_name,
                p.our_price, p.official_price, p.image_url
         FROM phones p
         JOIN brands b ON b.id = p.brand_id
         WHERE p.brand_id = ?
         ORDER BY p.release_date DESC, p.created_at DESC",
    )
    .bind(brand_id)
    .fetch_all(pool)
    .await?;
    Ok(Json(phones))
}

pub async fn list_popular_phones(
    State(state): State<AppState>,
) -> Result<Json<Vec<PhoneSummary>>> {
    let phones = sqlx::query_as::<_, PhoneSummary>(
        "SELECT p.id, p.model_name, b.name AS brand_name,
                p.our_price, p.official_price, p.image_url
         FROM phones p
         JOIN brands b ON b.id = p.brand_id
         ORDER BY p.popularity_score DESC
         LIMIT ?",
    )
    .bind(POPULAR_LIMIT)
    .fetch_all(state.db.pool())
    .await?;
    Ok(Json(phones))
}

pub async fn get_phone(
    State(state): State<AppState>,
    Path(phone_id): Path<i64>,
) -> Result<Json<PhoneDetail>> {
    sqlx::query_as::<_, PhoneDetail>(
        "SELECT p.id, b.name AS brand_name, p.model_name, p.release_date,
                p.official_price, p.our_price, p.display_size, p.resolution,
                p.weight, p.cpu, p.ram, p.storage, p.main_camera,
                p.front_camera, p.battery, p.os, p.image_url
         FROM phones p
         JOIN brands b ON b.id = p.brand_id
         WHERE p.id = ?",
    )
    .bind(phone_id)
    .fetch_optional(state.db.pool())
    .await?
    .map(Json)
    .ok_or(ApiError::NotFound("phone"))
}

//! Phoneshop
//!
//! JSON API for a mobile phone storefront.
//!
//! ## Features
//! - Catalog browsing (brands and phones)
//! - Per-user cart with merge-on-add semantics
//! - Transactional checkout into immutable order records
//! - Order tracking and guarded cancellation
//! - Credential accounts with bearer sessions

pub mod account;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod error;
pub mod models;
pub mod orders;

pub use error::{ApiError, Result};

use axum::routing::{get, patch, post};
use axum::{Json, Router};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    const DEFAULT_POOL_SIZE: u32 = 5;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/shop.db?mode=rwc`;
    /// use `sqlite::memory:` for tests.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(sqlx::Error::from)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!("connected to database: {} (pool size: {})", url, pool_size);

        Ok(Self { pool })
    }

    /// Run embedded migrations. Call once after connecting.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::Database(e.into()))?;
        tracing::info!("migrations complete");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
}

/// Build the full application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/brands", get(catalog::list_brands))
        .route("/brands/:name/phones", get(catalog::list_brand_phones))
        .route("/phones", get(catalog::list_popular_phones))
        .route("/phones/:phone_id", get(catalog::get_phone))
        .route(
            "/cart",
            get(cart::get_cart).post(cart::add).delete(cart::clear),
        )
        .route(
            "/cart/:item_id",
            patch(cart::update_item).delete(cart::remove),
        )
        .route("/checkout", post(orders::checkout_handler))
        .route("/orders", get(orders::list))
        .route("/orders/number/:order_number", get(orders::get_by_number))
        .route("/orders/:order_id/tracking", get(orders::tracking))
        .route("/orders/:order_id/cancel", patch(orders::cancel))
        .route(
            "/account/change-password",
            post(account::change_password_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "healthy", "service": "phoneshop" }))
}

//! Phoneshop - mobile phone storefront API.

use anyhow::Result;
use phoneshop::{router, AppState, Database};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:phoneshop.db?mode=rwc".to_string());
    let db = Database::connect(&database_url).await?;
    db.migrate().await?;

    let app = router(AppState { db });

    let port = std::env::var("PORT").unwrap_or_else(|_| "8080".to_string());
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    tracing::info!("phoneshop listening on 0.0.0.0:{port}");
    axum::serve(listener, app).await?;
    Ok(())
}

//! Web Server Entry Point
//!
//! Uses `anyhow` for startup errors. Request-level failures are
//! `identity::IdentityError` values rendered by the identity router.

mod app;
mod config;
mod health;

use std::net::SocketAddr;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::WebSettings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "web=info,identity=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = WebSettings::from_env()?;
    tracing::info!(
        environment = ?settings.environment,
        base_uri = %settings.identity.base_uri,
        providers = settings.providers.len(),
        "Loaded settings"
    );

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&settings.connection_string)
        .await?;

    tracing::info!("Connected to database");

    sqlx::migrate!("../../../database/migrations")
        .run(&pool)
        .await?;

    tracing::info!("Migrations completed");

    let app = app::build_app(&settings, pool);

    let listener = TcpListener::bind(settings.listen_addr).await?;
    tracing::info!("Listening on {}", settings.listen_addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

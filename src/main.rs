mod auth;
mod config;
mod db;
mod error;
mod models;
mod occupancy;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use dotenv::dotenv;
use tokio::net::TcpListener;

use crate::auth::AuthService;
use crate::config::Settings;
use crate::db::Database;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env()?;
    let db = Arc::new(Database::open(&settings.database_path)?);
    let auth = Arc::new(AuthService::new(
        db.clone(),
        settings.jwt_secret.clone(),
        settings.allow_plaintext_passwords,
    ));

    let app = routes::router(AppState { db, auth });

    let listener = TcpListener::bind(settings.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", settings.bind_addr))?;
    tracing::info!(addr = %settings.bind_addr, "listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server failed")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(%err, "failed to listen for shutdown signal");
    }
}

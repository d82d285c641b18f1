mod actions;
mod config;
mod creations;
mod db;
mod envelope;
mod errors;
mod identity;
mod llm_client;
mod models;
mod providers;
mod quota;
mod routes;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::creations::PgCreationLog;
use crate::db::create_pool;
use crate::identity::ClerkClient;
use crate::llm_client::LlmClient;
use crate::providers::{ClipDropClient, CloudinaryClient, PdfExtractor};
use crate::quota::PgUsageLedger;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Studio API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config).await?;

    let timeout = Duration::from_secs(config.provider_timeout_secs);

    // Initialize provider clients (one long-lived client each)
    let llm = LlmClient::new(
        config.text_api_key.clone(),
        config.text_api_base_url.clone(),
        config.text_model.clone(),
        timeout,
    )?;
    info!("LLM client initialized (model: {})", llm.model());

    let identity = ClerkClient::new(
        config.clerk_api_url.clone(),
        config.clerk_secret_key.clone(),
        &config.clerk_jwt_key,
        timeout,
    )?;
    let images = ClipDropClient::new(config.clipdrop_api_key.clone(), timeout)?;
    let media = CloudinaryClient::new(
        config.cloudinary_cloud_name.clone(),
        config.cloudinary_api_key.clone(),
        config.cloudinary_api_secret.clone(),
        timeout,
    )?;
    info!(
        "Provider clients initialized (timeout {}s, free usage limit {})",
        config.provider_timeout_secs, config.free_usage_limit
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        identity: Arc::new(identity),
        usage: Arc::new(PgUsageLedger::new(db.clone())),
        creations: Arc::new(PgCreationLog::new(db)),
        text: Arc::new(llm),
        images: Arc::new(images),
        media: Arc::new(media),
        documents: Arc::new(PdfExtractor),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the web client's domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

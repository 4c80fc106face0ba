use std::net::SocketAddr;
use tracing::{error, info, warn};

mod api;
mod auth;
mod card;
mod config;
mod db;
mod dice;
mod error;
mod shop;

use auth::TokenSigner;
use config::ServerConfig;
use db::Database;
use shop::VendorRegistry;

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dnd_cards_server=info,tower_http=info".into()),
        )
        .init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load()?;

    let db = Database::new(&config.database.url, config.database.max_connections)
        .await
        .map_err(|e| format!("Failed to initialize database: {}", e))?;

    let vendors = VendorRegistry::load_or_builtin(&config.data_dir);
    info!("Shop generator ready with {} vendors", vendors.len());

    let tokens = match config.auth.token_secret.as_deref() {
        Some(secret) => TokenSigner::new(secret.as_bytes(), config.auth.token_ttl_secs),
        None => {
            warn!("TOKEN_SECRET is not set; using a random secret, tokens will not survive a restart");
            TokenSigner::with_random_secret(config.auth.token_ttl_secs)
        }
    };

    let state = api::AppState::new(db, vendors, tokens);
    let app = api::router(state, &config.server.cors_origins);

    let addr = config.bind_addr()?;
    info!("Card server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

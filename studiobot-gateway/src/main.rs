//! `StudioBot` Gateway -- keyed document store and chat gateway.
//!
//! An axum WebSocket server exposing the studio's shared document tree
//! (`tasks`, `members`) with full-value change notifications, plus the group
//! chat channel the bot and clients exchange messages on.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 0.0.0.0:9100
//! cargo run --bin studiobot-gateway
//!
//! # Run on custom address with seeded data
//! cargo run --bin studiobot-gateway -- --bind 127.0.0.1:9100 --seed seed.json
//!
//! # Or via environment variables
//! GATEWAY_ADDR=127.0.0.1:9100 cargo run --bin studiobot-gateway
//! ```

use std::sync::Arc;

use clap::Parser;
use studiobot_gateway::config::{GatewayCliArgs, GatewayConfig};
use studiobot_gateway::gateway::{self, GatewayState};
use studiobot_gateway::store::DocumentStore;

#[tokio::main]
async fn main() {
    let cli = GatewayCliArgs::parse();

    // Load config from CLI args + config file + env vars + defaults.
    let config = match GatewayConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize tracing with the resolved log level.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    tracing::info!(addr = %config.bind_addr, "starting studiobot gateway");

    let store = match config.load_seed() {
        Ok(Some(seed)) => {
            tracing::info!("seeding document tree from file");
            DocumentStore::with_root(seed)
        }
        Ok(None) => DocumentStore::new(),
        Err(e) => {
            tracing::error!(error = %e, "failed to load seed data");
            std::process::exit(1);
        }
    };
    let mut state = GatewayState::with_store(store);
    state.max_payload_bytes = config.max_payload_bytes;
    let state = Arc::new(state);

    match gateway::start_server_with_state(&config.bind_addr, state).await {
        Ok((bound_addr, handle)) => {
            tracing::info!(addr = %bound_addr, "gateway listening");
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "gateway server task failed");
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to start gateway");
            std::process::exit(1);
        }
    }
}

//! Log Relay Collector - central log ingestion and read-back service
//!
//! Accepts pre-formatted record batches from shippers, files each line
//! into the partition named by the line's embedded date, and serves the
//! stored logs back over a ranged query API.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! - `LOG_RELAY_STORE_PATH`: store root directory (default: logs)
//! - `LOG_RELAY_BIND_ADDR`: listen address (default: 0.0.0.0:8000)
//! - `LOG_RELAY_CLIENT_SECRET`: shared secret accepted as bearer token (required)
//! - `LOG_RELAY_TENANT_ID` / `LOG_RELAY_CLIENT_ID` / `LOG_RELAY_ISSUER_BASE`:
//!   identity parameters for a JWKS-backed verifier deployment
//! - `RUST_LOG`: logging level filter (default: info)

use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use log_relay::auth::SharedSecretVerifier;
use log_relay::config::Config;
use log_relay::server::{self, CollectorState};
use log_relay::store::DateFileStore;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with environment filter
    init_tracing();

    info!("Starting Log Relay collector...");

    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(config) => {
            info!(
                store_path = %config.store_path.display(),
                bind_addr = %config.bind_addr,
                issuer = %config.issuer(),
                audience = %config.audience(),
                "Configuration loaded"
            );
            config
        }
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    // There is no unauthenticated mode: a verifier secret is mandatory.
    // Production swaps this for a JWKS-backed TokenVerifier.
    let Some(secret) = config.client_secret.clone() else {
        error!("LOG_RELAY_CLIENT_SECRET is required; refusing to start without a token verifier");
        std::process::exit(1);
    };
    let verifier = Arc::new(SharedSecretVerifier::new(secret));

    // Open the partitioned store; a root occupied by a file is fatal here.
    let store = match DateFileStore::open(&config.store_path).await {
        Ok(store) => {
            info!(root = %store.root().display(), "Store opened");
            store
        }
        Err(e) => {
            error!(error = %e, "Failed to open store");
            std::process::exit(1);
        }
    };

    let state = Arc::new(CollectorState::new(store, verifier));

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received, stopping..."),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
    };

    if let Err(e) = server::serve(state, config.bind_addr, shutdown).await {
        error!(error = %e, "Collector server failed");
        std::process::exit(1);
    }

    info!("Log Relay collector stopped");
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

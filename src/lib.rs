//! Log Relay Library
//!
//! Store-and-forward log shipping with a date-partitioned file store:
//!
//! - **record**: semicolon-delimited, timestamp-led record formatting
//! - **store**: date-partitioned append-only file store with ranged queries
//! - **auth**: credential and token-verifier collaborator boundary
//! - **sink**: remote delivery boundary and its HTTP implementation
//! - **shipper**: direct-or-buffer delivery decision plus reconnect drain
//! - **server**: collector HTTP API (`/Send`, `/getLogs`, `/checkConnection`)
//! - **config**: environment-based configuration for both sides
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use log_relay::auth::StaticTokenProvider;
//! use log_relay::config::Config;
//! use log_relay::shipper::Shipper;
//! use log_relay::sink::HttpSink;
//! use log_relay::store::DateFileStore;
//!
//! #[tokio::main]
//! async fn main() {
//!     // Load configuration from environment
//!     let config = Config::from_env().expect("Failed to load config");
//!
//!     // Local buffer for outages
//!     let store = DateFileStore::open(&config.store_path)
//!         .await
//!         .expect("Failed to open store");
//!
//!     // HTTP sink against the collector
//!     let sink = HttpSink::new(&config.collector_url, config.request_timeout)
//!         .expect("Failed to create sink");
//!     let tokens = StaticTokenProvider::new("dev-token");
//!
//!     // Reachable collector -> direct send; outage -> buffer + drain later
//!     let shipper = Shipper::new(store, Arc::new(sink), Arc::new(tokens));
//!     shipper.log(["err", "disk full"]).await.expect("log");
//! }
//! ```

// Module declarations
pub mod auth;
pub mod config;
pub mod record;
pub mod server;
pub mod shipper;
pub mod sink;
pub mod store;

// Re-export commonly used types at crate root for convenience
pub use auth::{AuthError, Credentials, TokenProvider, TokenVerifier};
pub use config::{Config, ConfigError};
pub use record::{format_message, partition_date, RecordError};
pub use server::{CollectorState, IngestSummary, ServerError};
pub use shipper::{Delivery, DrainOutcome, Shipper, ShipperError, ShipperStats};
pub use sink::{HttpSink, RemoteSink, SendOutcome, SinkError};
pub use store::{DateFileStore, SortOrder, StoreError, StoreSnapshot};

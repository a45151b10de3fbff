//! Remote sink boundary: the network client the shipper delivers through.
//!
//! The shipper only depends on the [`RemoteSink`] trait, so tests swap in
//! scripted sinks and production uses [`HttpSink`], a pooled reqwest client
//! speaking to the collector's `/Send` and `/checkConnection` routes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use tracing::debug;

use crate::auth::Credentials;

/// Outcome of a single send attempt.
///
/// `Rejected` means the transport round-trip completed but the collector
/// refused the payload; `TransportError` means the request never completed
/// (connection failure, timeout).
#[derive(Debug, Clone)]
pub enum SendOutcome {
    /// The collector accepted the payload.
    Accepted,

    /// The collector answered with a non-success status.
    Rejected {
        /// HTTP status code returned by the collector.
        status: u16,
    },

    /// The request failed before a response arrived.
    TransportError(String),
}

impl SendOutcome {
    /// Check whether the payload was confirmed accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, SendOutcome::Accepted)
    }
}

impl std::fmt::Display for SendOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SendOutcome::Accepted => write!(f, "accepted"),
            SendOutcome::Rejected { status } => write!(f, "rejected (status {})", status),
            SendOutcome::TransportError(e) => write!(f, "transport error: {}", e),
        }
    }
}

/// Errors that can occur while constructing a sink.
#[derive(Debug)]
pub enum SinkError {
    /// The HTTP client could not be built.
    Config(String),
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkError::Config(e) => write!(f, "sink configuration error: {}", e),
        }
    }
}

impl std::error::Error for SinkError {}

/// The three capabilities the shipper needs from the remote side.
///
/// All calls carry credentials; reachability is re-probed on every
/// delivery decision and never cached.
pub trait RemoteSink: Send + Sync {
    /// Lightweight authenticated reachability probe.
    fn check_reachable<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>>;

    /// Post one formatted record directly.
    fn post_direct<'a>(
        &'a self,
        record: &'a str,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = SendOutcome> + Send + 'a>>;

    /// Post a whole buffered batch as one payload.
    fn post_batch<'a>(
        &'a self,
        payload: &'a str,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = SendOutcome> + Send + 'a>>;
}

/// HTTP implementation of [`RemoteSink`] against the collector API.
///
/// The underlying reqwest client is reused for connection pooling and
/// carries a bounded request timeout, so a dead collector fails the probe
/// instead of hanging the delivery decision.
pub struct HttpSink {
    /// Pooled HTTP client.
    client: Client,

    /// `POST` endpoint for direct records and batches.
    send_url: String,

    /// `GET` endpoint for the reachability probe.
    check_url: String,
}

impl HttpSink {
    /// Create a sink for the collector at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SinkError::Config(e.to_string()))?;

        let base = base_url.trim_end_matches('/');

        Ok(Self {
            client,
            send_url: format!("{}/Send", base),
            check_url: format!("{}/checkConnection", base),
        })
    }

    /// The configured send endpoint.
    pub fn send_url(&self) -> &str {
        &self.send_url
    }

    /// The configured reachability probe endpoint.
    pub fn check_url(&self) -> &str {
        &self.check_url
    }

    async fn post_text(&self, url: &str, body: String, credentials: &Credentials) -> SendOutcome {
        let result = self
            .client
            .post(url)
            .header(AUTHORIZATION, credentials.authorization_value())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => SendOutcome::Accepted,
            Ok(response) => SendOutcome::Rejected {
                status: response.status().as_u16(),
            },
            Err(e) => SendOutcome::TransportError(e.to_string()),
        }
    }
}

impl RemoteSink for HttpSink {
    fn check_reachable<'a>(
        &'a self,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move {
            let result = self
                .client
                .get(&self.check_url)
                .header(AUTHORIZATION, credentials.authorization_value())
                .send()
                .await;

            match result {
                Ok(response) => {
                    let reachable = response.status().is_success();
                    debug!(
                        url = %self.check_url,
                        status = response.status().as_u16(),
                        reachable,
                        "Reachability probe completed"
                    );
                    reachable
                }
                Err(e) => {
                    debug!(url = %self.check_url, error = %e, "Reachability probe failed");
                    false
                }
            }
        })
    }

    fn post_direct<'a>(
        &'a self,
        record: &'a str,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = SendOutcome> + Send + 'a>> {
        Box::pin(self.post_text(&self.send_url, record.to_string(), credentials))
    }

    fn post_batch<'a>(
        &'a self,
        payload: &'a str,
        credentials: &'a Credentials,
    ) -> Pin<Box<dyn Future<Output = SendOutcome> + Send + 'a>> {
        Box::pin(self.post_text(&self.send_url, payload.to_string(), credentials))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_urls_from_base() {
        let sink = HttpSink::new("http://collector:8000/", Duration::from_secs(5)).unwrap();

        assert_eq!(sink.send_url(), "http://collector:8000/Send");
        assert_eq!(sink.check_url(), "http://collector:8000/checkConnection");
    }

    #[test]
    fn test_send_outcome_accepted() {
        assert!(SendOutcome::Accepted.is_accepted());
        assert!(!SendOutcome::Rejected { status: 503 }.is_accepted());
        assert!(!SendOutcome::TransportError("refused".to_string()).is_accepted());
    }

    #[test]
    fn test_send_outcome_display() {
        assert_eq!(format!("{}", SendOutcome::Accepted), "accepted");
        assert!(format!("{}", SendOutcome::Rejected { status: 401 }).contains("401"));
        assert!(
            format!("{}", SendOutcome::TransportError("timed out".to_string()))
                .contains("timed out")
        );
    }
}

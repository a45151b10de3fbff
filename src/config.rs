//! Environment-based configuration shared by the shipper and the
//! collector service.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default store root directory.
const DEFAULT_STORE_PATH: &str = "logs";

/// Default collector base URL.
const DEFAULT_COLLECTOR_URL: &str = "http://localhost:8000";

/// Default identity tenant.
const DEFAULT_TENANT_ID: &str = "common";

/// Default client identifier used when no real registration is supplied.
const DEFAULT_CLIENT_ID: &str = "local-dev";

/// Default OAuth issuer base URL.
const DEFAULT_ISSUER_BASE: &str = "https://login.microsoftonline.com/";

/// Default delay between drain reachability probes, in seconds.
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 5;

/// Minimum probe interval to avoid hammering a recovering collector.
const MIN_PROBE_INTERVAL_SECS: u64 = 1;

/// Maximum probe interval to keep backlog delivery reasonably fresh.
const MAX_PROBE_INTERVAL_SECS: u64 = 300;

/// Default HTTP request timeout, in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default collector bind address.
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

/// Configuration for log-relay.
///
/// All settings come from environment variables:
/// - `LOG_RELAY_STORE_PATH`: store root directory (default: `logs`)
/// - `LOG_RELAY_COLLECTOR_URL`: collector base URL (default: http://localhost:8000)
/// - `LOG_RELAY_TENANT_ID`: identity tenant (default: `common`)
/// - `LOG_RELAY_CLIENT_ID`: client registration id (default: `local-dev`)
/// - `LOG_RELAY_CLIENT_SECRET`: client secret / shared secret (no default)
/// - `LOG_RELAY_SCOPE`: token scope requested by the client (no default)
/// - `LOG_RELAY_ISSUER_BASE`: issuer base URL (default: https://login.microsoftonline.com/)
/// - `LOG_RELAY_PROBE_INTERVAL_SECS`: drain probe delay (default: 5)
/// - `LOG_RELAY_REQUEST_TIMEOUT_SECS`: HTTP timeout (default: 30)
/// - `LOG_RELAY_BIND_ADDR`: collector listen address (default: 0.0.0.0:8000)
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for the date-partitioned store.
    pub store_path: PathBuf,

    /// Base URL of the remote collector.
    pub collector_url: String,

    /// Identity tenant id.
    pub tenant_id: String,

    /// Client registration id; the expected token audience is
    /// `api://{client_id}`.
    pub client_id: String,

    /// Client secret for token acquisition, or the shared secret for the
    /// development verifier. Optional here; consumers that need it fail
    /// loudly when it is absent.
    pub client_secret: Option<String>,

    /// Token scope requested on the client side.
    pub scope: Option<String>,

    /// Issuer base URL; the full issuer is this plus the tenant id.
    pub issuer_base: String,

    /// Delay between drain reachability probes.
    pub probe_interval: Duration,

    /// HTTP request timeout for sink calls.
    pub request_timeout: Duration,

    /// Collector listen address.
    pub bind_addr: SocketAddr,
}

/// Error type for configuration loading failures.
#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub env_var: Option<String>,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.env_var {
            Some(var) => write!(f, "Configuration error for {}: {}", var, self.message),
            None => write!(f, "Configuration error: {}", self.message),
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load configuration from environment variables, falling back to
    /// defaults where a variable is unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a numeric variable does not parse or
    /// falls outside its allowed bounds, or the bind address is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let store_path = PathBuf::from(
            env::var("LOG_RELAY_STORE_PATH").unwrap_or_else(|_| DEFAULT_STORE_PATH.to_string()),
        );

        let collector_url = env::var("LOG_RELAY_COLLECTOR_URL")
            .unwrap_or_else(|_| DEFAULT_COLLECTOR_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let tenant_id =
            env::var("LOG_RELAY_TENANT_ID").unwrap_or_else(|_| DEFAULT_TENANT_ID.to_string());
        let client_id =
            env::var("LOG_RELAY_CLIENT_ID").unwrap_or_else(|_| DEFAULT_CLIENT_ID.to_string());
        let client_secret = env::var("LOG_RELAY_CLIENT_SECRET").ok();
        let scope = env::var("LOG_RELAY_SCOPE").ok();
        let issuer_base =
            env::var("LOG_RELAY_ISSUER_BASE").unwrap_or_else(|_| DEFAULT_ISSUER_BASE.to_string());

        let probe_interval = Duration::from_secs(Self::parse_probe_interval()?);

        let request_timeout_secs: u64 = env::var("LOG_RELAY_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let request_timeout = Duration::from_secs(request_timeout_secs);

        let bind_addr = Self::parse_bind_addr()?;

        Ok(Self {
            store_path,
            collector_url,
            tenant_id,
            client_id,
            client_secret,
            scope,
            issuer_base,
            probe_interval,
            request_timeout,
            bind_addr,
        })
    }

    /// The full token issuer: issuer base plus tenant id.
    pub fn issuer(&self) -> String {
        format!("{}{}", self.issuer_base, self.tenant_id)
    }

    /// The audience expected in presented tokens.
    pub fn audience(&self) -> String {
        format!("api://{}", self.client_id)
    }

    /// Parse the probe interval from the environment with validation.
    fn parse_probe_interval() -> Result<u64, ConfigError> {
        let env_var = "LOG_RELAY_PROBE_INTERVAL_SECS";

        match env::var(env_var) {
            Ok(value) => {
                let interval: u64 = value.parse().map_err(|_| ConfigError {
                    message: format!("'{}' is not a valid number", value),
                    env_var: Some(env_var.to_string()),
                })?;

                if interval < MIN_PROBE_INTERVAL_SECS {
                    return Err(ConfigError {
                        message: format!(
                            "probe interval {} is below minimum ({}s)",
                            interval, MIN_PROBE_INTERVAL_SECS
                        ),
                        env_var: Some(env_var.to_string()),
                    });
                }

                if interval > MAX_PROBE_INTERVAL_SECS {
                    return Err(ConfigError {
                        message: format!(
                            "probe interval {} exceeds maximum ({}s)",
                            interval, MAX_PROBE_INTERVAL_SECS
                        ),
                        env_var: Some(env_var.to_string()),
                    });
                }

                Ok(interval)
            }
            Err(_) => Ok(DEFAULT_PROBE_INTERVAL_SECS),
        }
    }

    /// Parse the collector bind address from the environment.
    fn parse_bind_addr() -> Result<SocketAddr, ConfigError> {
        let env_var = "LOG_RELAY_BIND_ADDR";

        match env::var(env_var) {
            Ok(value) => value.parse().map_err(|_| ConfigError {
                message: format!("'{}' is not a valid socket address", value),
                env_var: Some(env_var.to_string()),
            }),
            Err(_) => Ok(DEFAULT_BIND_ADDR
                .parse()
                .expect("default bind address must parse")),
        }
    }
}

impl Default for Config {
    /// Create a default configuration using default values.
    ///
    /// This is useful for testing or when environment variables are not set.
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            tenant_id: DEFAULT_TENANT_ID.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: None,
            scope: None,
            issuer_base: DEFAULT_ISSUER_BASE.to_string(),
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            bind_addr: DEFAULT_BIND_ADDR.parse().expect("default bind address"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Helper to temporarily set environment variables for testing
    struct EnvGuard {
        key: String,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &str, value: &str) -> Self {
            let original = env::var(key).ok();
            env::set_var(key, value);
            Self {
                key: key.to_string(),
                original,
            }
        }

        fn remove(key: &str) -> Self {
            let original = env::var(key).ok();
            env::remove_var(key);
            Self {
                key: key.to_string(),
                original,
            }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.original {
                Some(val) => env::set_var(&self.key, val),
                None => env::remove_var(&self.key),
            }
        }
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.store_path, PathBuf::from("logs"));
        assert_eq!(config.collector_url, "http://localhost:8000");
        assert_eq!(config.tenant_id, "common");
        assert_eq!(config.probe_interval, Duration::from_secs(5));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_issuer_and_audience() {
        let config = Config {
            tenant_id: "tenant-42".to_string(),
            client_id: "client-7".to_string(),
            ..Config::default()
        };

        assert_eq!(
            config.issuer(),
            "https://login.microsoftonline.com/tenant-42"
        );
        assert_eq!(config.audience(), "api://client-7");
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _guard1 = EnvGuard::remove("LOG_RELAY_STORE_PATH");
        let _guard2 = EnvGuard::remove("LOG_RELAY_COLLECTOR_URL");
        let _guard3 = EnvGuard::remove("LOG_RELAY_PROBE_INTERVAL_SECS");

        let config = Config::from_env().expect("Should load with defaults");
        assert_eq!(config.store_path, PathBuf::from("logs"));
        assert_eq!(config.collector_url, "http://localhost:8000");
        assert_eq!(config.probe_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_config_from_env_custom_values() {
        let _guard1 = EnvGuard::set("LOG_RELAY_STORE_PATH", "/var/spool/relay");
        let _guard2 = EnvGuard::set("LOG_RELAY_COLLECTOR_URL", "http://central:9000/");

        let config = Config::from_env().expect("Should load custom values");
        assert_eq!(config.store_path, PathBuf::from("/var/spool/relay"));
        assert_eq!(config.collector_url, "http://central:9000"); // Trailing slash removed
    }

    #[test]
    fn test_invalid_probe_interval() {
        let _guard = EnvGuard::set("LOG_RELAY_PROBE_INTERVAL_SECS", "not_a_number");

        let result = Config::from_env();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.message.contains("not a valid number"));
    }

    #[test]
    fn test_probe_interval_below_min() {
        let _guard = EnvGuard::set("LOG_RELAY_PROBE_INTERVAL_SECS", "0");

        let result = Config::from_env();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.message.contains("below minimum"));
    }

    #[test]
    fn test_probe_interval_exceeds_max() {
        let _guard = EnvGuard::set("LOG_RELAY_PROBE_INTERVAL_SECS", "999");

        let result = Config::from_env();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.message.contains("exceeds maximum"));
    }

    #[test]
    fn test_invalid_bind_addr() {
        let _guard = EnvGuard::set("LOG_RELAY_BIND_ADDR", "not-an-address");

        let result = Config::from_env();
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.message.contains("socket address"));
    }

    #[test]
    fn test_config_error_display() {
        let error = ConfigError {
            message: "test error".to_string(),
            env_var: Some("TEST_VAR".to_string()),
        };
        assert_eq!(
            format!("{}", error),
            "Configuration error for TEST_VAR: test error"
        );

        let error_no_var = ConfigError {
            message: "general error".to_string(),
            env_var: None,
        };
        assert_eq!(
            format!("{}", error_no_var),
            "Configuration error: general error"
        );
    }
}

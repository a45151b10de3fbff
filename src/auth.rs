//! Authorization collaborator boundary.
//!
//! Token acquisition (client side) and token verification (collector side)
//! are external concerns: production deployments plug in an OAuth
//! on-behalf-of exchange and a JWKS-backed verifier checking expiry,
//! issuer, and the `api://{client_id}` audience. The core only depends on
//! the traits here, and there is deliberately no unauthenticated mode.

use std::future::Future;
use std::pin::Pin;

/// A bearer credential presented on every remote call.
///
/// Wraps the raw token so it never leaks through `Debug` output.
#[derive(Clone)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    /// Create credentials from a raw bearer token.
    pub fn bearer(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    /// The raw token value.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The value for an `Authorization` header.
    pub fn authorization_value(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Errors raised by the authorization collaborators.
#[derive(Debug)]
pub enum AuthError {
    /// The presented token was rejected by the verifier.
    Unauthorized(String),

    /// The token provider could not produce credentials (for example, the
    /// upstream token endpoint was unreachable).
    Provider(String),
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::Unauthorized(reason) => write!(f, "token rejected: {}", reason),
            AuthError::Provider(reason) => {
                write!(f, "failed to acquire credentials: {}", reason)
            }
        }
    }
}

impl std::error::Error for AuthError {}

/// Client-side credential source.
///
/// Implementations refresh or exchange tokens as needed; the shipper asks
/// for credentials at every decision point and never caches them itself.
pub trait TokenProvider: Send + Sync {
    /// Produce credentials for the next remote call.
    fn credentials<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Credentials, AuthError>> + Send + 'a>>;
}

/// Collector-side token verifier.
///
/// A production implementation resolves the signing key from a JWKS
/// endpoint keyed by issuer and key id and checks expiry, issuer, and
/// audience. The collector routes only depend on this trait.
pub trait TokenVerifier: Send + Sync {
    /// Verify a raw bearer token, returning `Err` when it must be refused.
    fn verify<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuthError>> + Send + 'a>>;
}

/// Token provider backed by a fixed token.
///
/// Suitable for development and tests; production wires in an OAuth
/// exchange instead.
pub struct StaticTokenProvider {
    credentials: Credentials,
}

impl StaticTokenProvider {
    /// Create a provider that always hands out the same token.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            credentials: Credentials::bearer(token),
        }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn credentials<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Credentials, AuthError>> + Send + 'a>> {
        let creds = self.credentials.clone();
        Box::pin(async move { Ok(creds) })
    }
}

/// Verifier that accepts exactly one shared secret as the bearer token.
///
/// Suitable for development and tests; production wires in a JWKS-backed
/// verifier.
pub struct SharedSecretVerifier {
    secret: String,
}

impl SharedSecretVerifier {
    /// Create a verifier for the given shared secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl TokenVerifier for SharedSecretVerifier {
    fn verify<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), AuthError>> + Send + 'a>> {
        Box::pin(async move {
            if token == self.secret {
                Ok(())
            } else {
                Err(AuthError::Unauthorized("unknown bearer token".to_string()))
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider_hands_out_token() {
        let provider = StaticTokenProvider::new("abc123");
        let creds = provider.credentials().await.unwrap();

        assert_eq!(creds.token(), "abc123");
        assert_eq!(creds.authorization_value(), "Bearer abc123");
    }

    #[tokio::test]
    async fn test_shared_secret_verifier() {
        let verifier = SharedSecretVerifier::new("s3cret");

        assert!(verifier.verify("s3cret").await.is_ok());
        assert!(matches!(
            verifier.verify("wrong").await,
            Err(AuthError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_credentials_debug_redacted() {
        let creds = Credentials::bearer("super-secret");
        let debug = format!("{:?}", creds);

        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_auth_error_display() {
        let err = AuthError::Unauthorized("expired".to_string());
        assert!(format!("{}", err).contains("expired"));

        let err = AuthError::Provider("endpoint unreachable".to_string());
        assert!(format!("{}", err).contains("unreachable"));
    }
}

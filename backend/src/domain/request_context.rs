//! Per-request metadata carried into audit records and scope events.

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::CorrelationId;

/// Transport details of the request that triggered an operation.
///
/// The client IP is held raw here and only ever leaves the request as a
/// salted hash produced by [`ClientIpHasher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Correlation identifier shared with logs and errors.
    pub correlation_id: CorrelationId,
    /// Remote address as reported by the routing layer.
    pub client_ip: Option<String>,
    /// `User-Agent` header value.
    pub user_agent: Option<String>,
}

impl RequestContext {
    /// Context correlated with the [`CorrelationId`] in scope, or a fresh one.
    #[must_use]
    pub fn new(client_ip: Option<String>, user_agent: Option<String>) -> Self {
        Self {
            correlation_id: CorrelationId::current_or_generate(),
            client_ip,
            user_agent,
        }
    }

    /// Context for internal callers with no transport metadata.
    #[must_use]
    pub fn internal() -> Self {
        Self::new(None, None)
    }

    /// Override the correlation identifier.
    #[must_use]
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}

/// Salted SHA-256 hashing of client IPs: `hex(sha256(salt ":" ip))`.
///
/// # Examples
/// ```
/// use tenant_scope::domain::ClientIpHasher;
///
/// let hasher = ClientIpHasher::new("pepper");
/// let hashed = hasher.hash("203.0.113.7");
/// assert_eq!(hashed.len(), 64);
/// assert_ne!(hashed, ClientIpHasher::new("salt").hash("203.0.113.7"));
/// ```
#[derive(Clone)]
pub struct ClientIpHasher {
    salt: Zeroizing<String>,
}

impl ClientIpHasher {
    /// Build a hasher with the configured salt.
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            salt: Zeroizing::new(salt.into()),
        }
    }

    /// Hash one address.
    #[must_use]
    pub fn hash(&self, ip: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(b":");
        hasher.update(ip.trim().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Hash the client IP of `context`, skipping blank addresses.
    #[must_use]
    pub fn hash_context(&self, context: &RequestContext) -> Option<String> {
        context
            .client_ip
            .as_deref()
            .filter(|ip| !ip.trim().is_empty())
            .map(|ip| self.hash(ip))
    }
}

impl std::fmt::Debug for ClientIpHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientIpHasher")
            .field("salt", &"<redacted>")
            .finish()
    }
}

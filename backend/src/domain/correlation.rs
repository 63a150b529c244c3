//! Correlation identifiers tying one request's audit trail together.
//!
//! A [`CorrelationId`] travels from the routing layer into
//! [`crate::domain::RequestContext`], and from there into
//! [`crate::domain::ScopeChangeEvent`], [`crate::domain::AuditRecord`], and
//! every [`crate::domain::Error`] built while it is in scope. Upstream callers
//! may supply their own id (for example an `X-Correlation-Id` header); when
//! they do not, a UUID is minted.
//!
//! The id lives in a Tokio task-local. Spawned tasks do not inherit it, so
//! wrap their futures in [`CorrelationId::scope`] again.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::task_local;
use uuid::Uuid;

use super::IdValidationError;

/// Longest upstream id accepted before it is considered hostile.
const MAX_LEN: usize = 128;

task_local! {
    static CURRENT: CorrelationId;
}

/// Identifier shared by the logs, errors, and audit rows of one request.
///
/// # Examples
/// ```
/// use tenant_scope::domain::CorrelationId;
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let upstream = CorrelationId::new("checkout-7f3a").expect("printable id");
/// let seen = upstream.clone().scope(async { CorrelationId::current() }).await;
/// assert_eq!(seen, Some(upstream));
/// assert!(CorrelationId::current().is_none());
/// # });
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Accept an upstream id: trimmed, non-empty, printable ASCII without
    /// spaces, at most 128 bytes.
    ///
    /// # Errors
    ///
    /// [`IdValidationError`] for blank or unprintable input.
    pub fn new(value: impl AsRef<str>) -> Result<Self, IdValidationError> {
        let trimmed = value.as_ref().trim();
        if trimmed.is_empty() {
            return Err(IdValidationError::Empty { kind: "correlation id" });
        }
        if trimmed.len() > MAX_LEN || !trimmed.bytes().all(|byte| byte.is_ascii_graphic()) {
            return Err(IdValidationError::Malformed { kind: "correlation id" });
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Mint a fresh UUID-based id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Use the upstream id when it is acceptable, otherwise mint one.
    #[must_use]
    pub fn from_upstream(value: Option<&str>) -> Self {
        value
            .and_then(|raw| Self::new(raw).ok())
            .unwrap_or_else(Self::generate)
    }

    /// The id installed for the running task, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT.try_with(Clone::clone).ok()
    }

    /// The id in scope, or a fresh one for work outside any request.
    #[must_use]
    pub fn current_or_generate() -> Self {
        Self::current().unwrap_or_else(Self::generate)
    }

    /// Run `fut` with this id installed.
    pub async fn scope<Fut>(self, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        CURRENT.scope(self, fut).await
    }

    /// Borrow the id as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl PartialEq<&str> for CorrelationId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<Uuid> for CorrelationId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<String> for CorrelationId {
    type Error = IdValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CorrelationId> for String {
    fn from(value: CorrelationId) -> Self {
        value.0
    }
}

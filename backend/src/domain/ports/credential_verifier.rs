//! Port for bearer credential signature verification.
//!
//! Signature algorithms and key handling live behind this trait. The domain
//! only consumes the verified claim map.

use serde_json::{Map, Value};

use super::define_port_error;

define_port_error! {
    /// Reasons a credential failed verification.
    pub enum CredentialVerificationError {
        /// The credential was well formed but its expiry has passed.
        Expired => "credential has expired",
        /// Signature, audience, or structure did not verify.
        Invalid { message: String } => "credential is invalid: {message}",
    }
}

/// Verifies a raw bearer credential and returns its claims.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialVerifier: Send + Sync {
    /// Verify `token` against `secret`, enforcing `audience` when supplied.
    fn verify(
        &self,
        token: &str,
        secret: &str,
        audience: Option<String>,
    ) -> Result<Map<String, Value>, CredentialVerificationError>;
}

/// Verifier that rejects every credential.
///
/// Used where no verifier has been wired, so a misconfigured process fails
/// closed.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureCredentialVerifier;

impl CredentialVerifier for FixtureCredentialVerifier {
    fn verify(
        &self,
        _token: &str,
        _secret: &str,
        _audience: Option<String>,
    ) -> Result<Map<String, Value>, CredentialVerificationError> {
        Err(CredentialVerificationError::invalid("no verifier configured"))
    }
}

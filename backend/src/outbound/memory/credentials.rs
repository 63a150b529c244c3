//! Credential verifier over a fixed token table.
//!
//! Stands in for a signature-checking verifier in tests and local runs: each
//! registered token maps to the claims it verifies to.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::domain::ports::{CredentialVerificationError, CredentialVerifier};

enum TokenOutcome {
    Claims(Map<String, Value>),
    Expired,
}

/// Verifier that accepts only registered tokens signed with its secret.
pub struct StaticCredentialVerifier {
    secret: Zeroizing<String>,
    tokens: RwLock<HashMap<String, TokenOutcome>>,
}

impl StaticCredentialVerifier {
    /// Verifier expecting `secret`.
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Register a token that verifies to `claims`.
    pub fn insert_token(&self, token: impl Into<String>, claims: Map<String, Value>) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), TokenOutcome::Claims(claims));
    }

    /// Register a token that verifies as expired.
    pub fn insert_expired_token(&self, token: impl Into<String>) {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.into(), TokenOutcome::Expired);
    }
}

impl CredentialVerifier for StaticCredentialVerifier {
    fn verify(
        &self,
        token: &str,
        secret: &str,
        audience: Option<String>,
    ) -> Result<Map<String, Value>, CredentialVerificationError> {
        if secret != self.secret.as_str() {
            return Err(CredentialVerificationError::invalid("signature mismatch"));
        }
        let tokens = self.tokens.read().unwrap_or_else(PoisonError::into_inner);
        let claims = match tokens.get(token) {
            Some(TokenOutcome::Claims(claims)) => claims,
            Some(TokenOutcome::Expired) => return Err(CredentialVerificationError::expired()),
            None => return Err(CredentialVerificationError::invalid("unknown token")),
        };
        if let Some(expected) = audience {
            let matches = match claims.get("aud") {
                Some(Value::String(aud)) => *aud == expected,
                Some(Value::Array(auds)) => auds.iter().any(|aud| aud.as_str() == Some(&expected)),
                _ => false,
            };
            if !matches {
                return Err(CredentialVerificationError::invalid("audience mismatch"));
            }
        }
        Ok(claims.clone())
    }
}

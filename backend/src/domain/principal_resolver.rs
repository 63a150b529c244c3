//! Turns a raw bearer credential into a [`Principal`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use super::ports::{CredentialVerificationError, CredentialVerifier};
use super::{Claims, DivisionId, Error, OrganizationId, Principal, ScopeHints, UserId};

/// Why a credential did not yield a principal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrincipalResolutionError {
    /// No credential was presented.
    #[error("missing bearer credential")]
    MissingCredential,
    /// The credential verified but has expired.
    #[error("credential has expired")]
    TokenExpired,
    /// The credential failed verification.
    #[error("credential is invalid: {message}")]
    TokenInvalid {
        /// Verifier diagnostic.
        message: String,
    },
    /// The verified claims lack a usable subject or carry malformed hints.
    #[error("credential payload is invalid: {message}")]
    InvalidPayload {
        /// Which claim was rejected.
        message: String,
    },
}

impl PrincipalResolutionError {
    /// Stable machine-readable reason.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::MissingCredential => "missing_credential",
            Self::TokenExpired => "token_expired",
            Self::TokenInvalid { .. } => "token_invalid",
            Self::InvalidPayload { .. } => "invalid_payload",
        }
    }

    fn payload(message: impl Into<String>) -> Self {
        Self::InvalidPayload {
            message: message.into(),
        }
    }
}

impl From<PrincipalResolutionError> for Error {
    fn from(err: PrincipalResolutionError) -> Self {
        Self::unauthorized(err.to_string()).with_details(json!({ "reason": err.reason() }))
    }
}

impl From<CredentialVerificationError> for PrincipalResolutionError {
    fn from(err: CredentialVerificationError) -> Self {
        match err {
            CredentialVerificationError::Expired => Self::TokenExpired,
            CredentialVerificationError::Invalid { message } => Self::TokenInvalid { message },
        }
    }
}

/// Verifies credentials with the configured secret and audience.
pub struct PrincipalResolver {
    verifier: Arc<dyn CredentialVerifier>,
    secret: Zeroizing<String>,
    audience: Option<String>,
}

impl PrincipalResolver {
    /// Build a resolver.
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        secret: impl Into<String>,
        audience: Option<String>,
    ) -> Self {
        Self {
            verifier,
            secret: Zeroizing::new(secret.into()),
            audience: audience.filter(|aud| !aud.trim().is_empty()),
        }
    }

    /// Resolve a raw credential, with or without a `Bearer ` prefix.
    ///
    /// # Errors
    ///
    /// See [`PrincipalResolutionError`].
    pub fn resolve(&self, raw_credential: Option<&str>) -> Result<Principal, PrincipalResolutionError> {
        let token = raw_credential
            .map(strip_bearer)
            .filter(|token| !token.is_empty())
            .ok_or(PrincipalResolutionError::MissingCredential)?;

        let claims = self
            .verifier
            .verify(token, self.secret.as_str(), self.audience.clone())
            .inspect_err(|err| debug!(error = %err, "credential verification failed"))?;

        principal_from_claims(claims)
    }
}

impl std::fmt::Debug for PrincipalResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrincipalResolver")
            .field("audience", &self.audience)
            .finish_non_exhaustive()
    }
}

/// Drop a `Bearer` scheme, case-insensitively. A bare scheme leaves an empty
/// token.
fn strip_bearer(raw: &str) -> &str {
    let trimmed = raw.trim();
    let (scheme, rest) = trimmed
        .split_once(char::is_whitespace)
        .unwrap_or((trimmed, ""));
    if scheme.eq_ignore_ascii_case("bearer") {
        rest.trim()
    } else {
        trimmed
    }
}

/// Build a principal from a verified claim map.
///
/// # Errors
///
/// Returns [`PrincipalResolutionError::InvalidPayload`] when `sub` is absent
/// or blank, or when scope hint claims are malformed.
pub fn principal_from_claims(raw: Map<String, Value>) -> Result<Principal, PrincipalResolutionError> {
    let subject = optional_string(&raw, "sub").ok_or_else(|| PrincipalResolutionError::payload("sub"))?;
    let id = UserId::new(subject).map_err(|err| PrincipalResolutionError::payload(err.to_string()))?;

    let scope_hints = scope_hints(&raw)?;
    let claims = Claims {
        session_id: optional_string(&raw, "sid"),
        issued_at: timestamp(&raw, "iat"),
        expires_at: timestamp(&raw, "exp"),
        audience: audience(&raw),
        raw: raw.clone(),
    };

    Ok(Principal {
        id,
        email: optional_string(&raw, "email"),
        role: optional_string(&raw, "role"),
        claims,
        scope_hints,
    })
}

fn optional_string(claims: &Map<String, Value>, key: &str) -> Option<String> {
    claims
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

fn timestamp(claims: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    claims
        .get(key)
        .and_then(Value::as_i64)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}

fn audience(claims: &Map<String, Value>) -> Option<String> {
    match claims.get("aud")? {
        Value::String(aud) => Some(aud.clone()),
        Value::Array(items) => items.first().and_then(Value::as_str).map(str::to_owned),
        _ => None,
    }
}

fn scope_hints(claims: &Map<String, Value>) -> Result<Option<ScopeHints>, PrincipalResolutionError> {
    let org_ids = claims.get("org_ids");
    let division_ids = claims.get("division_ids");
    if org_ids.is_none() && division_ids.is_none() {
        return Ok(None);
    }

    let mut hints = ScopeHints::default();
    if let Some(value) = org_ids {
        hints.organization_ids = id_list(value, "org_ids", |raw| OrganizationId::new(raw))?
            .into_iter()
            .collect::<BTreeSet<_>>();
    }
    if let Some(value) = division_ids {
        let Value::Object(map) = value else {
            return Err(PrincipalResolutionError::payload("division_ids"));
        };
        let mut divisions = BTreeMap::new();
        for (org, list) in map {
            let org_id = OrganizationId::new(org)
                .map_err(|_| PrincipalResolutionError::payload("division_ids"))?;
            divisions.insert(org_id, id_list(list, "division_ids", |raw| DivisionId::new(raw))?);
        }
        hints.divisions = divisions;
    }
    Ok(Some(hints))
}

fn id_list<T, E>(
    value: &Value,
    claim: &str,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<Vec<T>, PrincipalResolutionError> {
    let Value::Array(items) = value else {
        return Err(PrincipalResolutionError::payload(claim));
    };
    items
        .iter()
        .map(|item| {
            item.as_str()
                .and_then(|raw| parse(raw).ok())
                .ok_or_else(|| PrincipalResolutionError::payload(claim))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    //! Claim mapping and failure classification.
    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::MockCredentialVerifier;
    use rstest::rstest;

    fn claims(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn resolver_returning(
        result: Result<Map<String, Value>, CredentialVerificationError>,
    ) -> PrincipalResolver {
        let mut verifier = MockCredentialVerifier::new();
        verifier
            .expect_verify()
            .withf(|token, secret, audience| {
                token == "tok" && secret == "s3cret" && audience.as_deref() == Some("app")
            })
            .times(1)
            .return_once(move |_, _, _| result);
        PrincipalResolver::new(Arc::new(verifier), "s3cret", Some("app".into()))
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("Bearer   "))]
    #[case(Some("bearer"))]
    #[case(Some("  BEARER\t "))]
    fn missing_credentials_never_reach_the_verifier(#[case] raw: Option<&str>) {
        let mut verifier = MockCredentialVerifier::new();
        verifier.expect_verify().never();
        let resolver = PrincipalResolver::new(Arc::new(verifier), "s", None);
        assert_eq!(
            resolver.resolve(raw),
            Err(PrincipalResolutionError::MissingCredential)
        );
    }

    #[rstest]
    #[case("tok")]
    #[case("Bearer tok")]
    #[case("bearer   tok ")]
    #[case("BEARER\ttok")]
    fn the_bearer_scheme_is_stripped(#[case] raw: &str) {
        let resolver = resolver_returning(Ok(claims(json!({"sub": "user-1"}))));
        let principal = resolver.resolve(Some(raw)).expect("resolves");
        assert_eq!(principal.id.as_str(), "user-1");
    }

    #[rstest]
    fn division_only_hints_admit_the_named_organization() {
        let principal = principal_from_claims(claims(json!({
            "sub": "user-1",
            "division_ids": {"org-member": ["div-led"]},
        })))
        .expect("valid claims");
        let hints = principal.scope_hints.expect("hints present");
        let org = OrganizationId::new("org-member").expect("valid id");
        assert!(hints.organization_ids.is_empty());
        assert!(hints.allows_organization(&org));
        assert!(hints.allows_division(&org, &DivisionId::new("div-led").expect("valid id")));
    }

    #[rstest]
    fn verified_claims_populate_the_principal() {
        let resolver = resolver_returning(Ok(claims(json!({
            "sub": "user-1",
            "email": "ada@example.com",
            "role": "member",
            "sid": "sess-9",
            "iat": 1_700_000_000,
            "exp": 1_700_003_600,
            "aud": ["app", "other"],
        }))));
        let principal = resolver.resolve(Some("Bearer tok")).expect("resolves");
        assert_eq!(principal.id.as_str(), "user-1");
        assert_eq!(principal.email.as_deref(), Some("ada@example.com"));
        assert_eq!(principal.role.as_deref(), Some("member"));
        assert_eq!(principal.claims.session_id.as_deref(), Some("sess-9"));
        assert_eq!(principal.claims.audience.as_deref(), Some("app"));
        assert_eq!(
            principal.claims.expires_at.map(|at| at.timestamp()),
            Some(1_700_003_600)
        );
        assert!(principal.scope_hints.is_none());
        assert_eq!(principal.session_key(), "user-1:sess-9");
    }

    #[rstest]
    #[case(CredentialVerificationError::expired(), PrincipalResolutionError::TokenExpired)]
    #[case(
        CredentialVerificationError::invalid("bad signature"),
        PrincipalResolutionError::TokenInvalid { message: "bad signature".into() }
    )]
    fn verifier_failures_are_classified(
        #[case] failure: CredentialVerificationError,
        #[case] expected: PrincipalResolutionError,
    ) {
        let resolver = resolver_returning(Err(failure));
        assert_eq!(resolver.resolve(Some("tok")), Err(expected));
    }

    #[rstest]
    #[case(json!({}))]
    #[case(json!({"sub": "  "}))]
    #[case(json!({"sub": 42}))]
    #[case(json!({"sub": "u", "org_ids": "org-1"}))]
    #[case(json!({"sub": "u", "division_ids": {"org-1": [1]}}))]
    fn unusable_payloads_are_rejected(#[case] raw: Value) {
        let err = principal_from_claims(claims(raw)).expect_err("payload rejected");
        assert_eq!(err.reason(), "invalid_payload");
    }

    #[rstest]
    fn scope_hint_claims_are_parsed() {
        let principal = principal_from_claims(claims(json!({
            "sub": "u",
            "org_ids": ["org-1", "org-2"],
            "division_ids": {"org-1": ["div-1"]},
        })))
        .expect("valid claims");
        let hints = principal.scope_hints.expect("hints present");
        assert_eq!(hints.organization_ids.len(), 2);
        let org = OrganizationId::new("org-1").expect("valid id");
        assert!(hints.allows_division(&org, &DivisionId::new("div-1").expect("valid id")));
        assert!(!hints.allows_division(&org, &DivisionId::new("div-2").expect("valid id")));
    }

    #[rstest]
    fn resolution_errors_map_to_unauthorized_with_reason() {
        let err: Error = PrincipalResolutionError::TokenExpired.into();
        assert_eq!(err.code(), ErrorCode::Unauthorized);
        assert_eq!(err.details(), Some(&json!({"reason": "token_expired"})));
    }
}

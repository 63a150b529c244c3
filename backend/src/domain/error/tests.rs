//! Tests for error construction and serialisation.

use super::*;
use rstest::rstest;
use serde_json::json;

#[rstest]
#[case(Error::invalid_request("bad"), ErrorCode::InvalidRequest)]
#[case(Error::unauthorized("who"), ErrorCode::Unauthorized)]
#[case(Error::forbidden("no"), ErrorCode::Forbidden)]
#[case(Error::not_found("gone"), ErrorCode::NotFound)]
#[case(Error::conflict("clash"), ErrorCode::Conflict)]
#[case(Error::rate_limited("slow down"), ErrorCode::RateLimited)]
#[case(Error::service_unavailable("later"), ErrorCode::ServiceUnavailable)]
#[case(Error::internal("boom"), ErrorCode::InternalError)]
fn constructors_set_codes(#[case] error: Error, #[case] expected: ErrorCode) {
    assert_eq!(error.code(), expected);
}

#[rstest]
fn expected_outcomes_exclude_faults() {
    assert!(ErrorCode::Forbidden.is_expected());
    assert!(ErrorCode::RateLimited.is_expected());
    assert!(!ErrorCode::InternalError.is_expected());
    assert!(!ErrorCode::ServiceUnavailable.is_expected());
}

#[rstest]
fn serialises_snake_case_code_and_omits_empty_fields() {
    let value = serde_json::to_value(Error::rate_limited("too many scope changes"))
        .expect("error serialises");
    assert_eq!(
        value,
        json!({ "code": "rate_limited", "message": "too many scope changes" })
    );
}

#[rstest]
fn details_are_serialised_when_present() {
    let error = Error::unauthorized("token rejected").with_details(json!({"reason": "token_expired"}));
    let value = serde_json::to_value(&error).expect("error serialises");
    assert_eq!(value["details"]["reason"], "token_expired");
}

#[rstest]
fn correlation_id_is_absent_out_of_scope() {
    assert!(Error::internal("boom").correlation_id().is_none());
}

#[tokio::test]
async fn correlation_id_is_captured_in_scope() {
    let id = CorrelationId::new("corr-9").expect("valid id");
    let error = id.scope(async { Error::forbidden("denied") }).await;
    let value = serde_json::to_value(&error).expect("error serialises");
    assert_eq!(value["correlationId"], "corr-9");
    assert_eq!(error.correlation_id().map(CorrelationId::as_str), Some("corr-9"));
}

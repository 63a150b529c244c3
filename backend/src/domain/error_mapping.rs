//! Port error to domain error mapping shared by the services.

use super::Error;
use super::ports::{
    MembershipRepositoryError, OnboardingSnapshotRepositoryError, ScopePreferenceRepositoryError,
    UserProfileRepositoryError,
};

pub(crate) fn map_membership_error(error: MembershipRepositoryError) -> Error {
    match error {
        MembershipRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("membership repository unavailable: {message}"))
        }
        MembershipRepositoryError::Query { message } => {
            Error::internal(format!("membership repository error: {message}"))
        }
    }
}

pub(crate) fn map_preference_error(error: ScopePreferenceRepositoryError) -> Error {
    match error {
        ScopePreferenceRepositoryError::Connection { message } => Error::service_unavailable(
            format!("scope preference repository unavailable: {message}"),
        ),
        ScopePreferenceRepositoryError::Query { message } => {
            Error::internal(format!("scope preference repository error: {message}"))
        }
    }
}

pub(crate) fn map_profile_error(error: UserProfileRepositoryError) -> Error {
    match error {
        UserProfileRepositoryError::Connection { message } => {
            Error::service_unavailable(format!("user profile repository unavailable: {message}"))
        }
        UserProfileRepositoryError::Query { message } => {
            Error::internal(format!("user profile repository error: {message}"))
        }
    }
}

pub(crate) fn map_snapshot_error(error: OnboardingSnapshotRepositoryError) -> Error {
    match error {
        OnboardingSnapshotRepositoryError::Connection { message } => Error::service_unavailable(
            format!("onboarding snapshot repository unavailable: {message}"),
        ),
        OnboardingSnapshotRepositoryError::Query { message } => {
            Error::internal(format!("onboarding snapshot repository error: {message}"))
        }
        OnboardingSnapshotRepositoryError::Decode { message } => {
            Error::internal(format!("stored onboarding snapshot is corrupt: {message}"))
        }
    }
}

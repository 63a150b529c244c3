//! Port for reading the user profile embedded in session snapshots.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::UserId;

use super::define_port_error;

define_port_error! {
    /// Errors raised by user profile adapters.
    pub enum UserProfileRepositoryError {
        /// Repository connection could not be established.
        Connection { message: String } =>
            "user profile repository connection failed: {message}",
        /// Query failed during execution.
        Query { message: String } =>
            "user profile repository query failed: {message}",
    }
}

/// Profile fields surfaced to clients in a session snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Profile owner.
    pub id: UserId,
    /// Email address.
    pub email: Option<String>,
    /// Display name.
    pub display_name: Option<String>,
    /// Avatar image URL.
    pub avatar_url: Option<String>,
}

/// Read access to user profiles.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserProfileRepository: Send + Sync {
    /// Fetch the profile, or `None` when the user has no stored profile yet.
    async fn find_profile(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserProfile>, UserProfileRepositoryError>;
}

/// Repository with no stored profiles.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureUserProfileRepository;

#[async_trait]
impl UserProfileRepository for FixtureUserProfileRepository {
    async fn find_profile(
        &self,
        _user_id: &UserId,
    ) -> Result<Option<UserProfile>, UserProfileRepositoryError> {
        Ok(None)
    }
}

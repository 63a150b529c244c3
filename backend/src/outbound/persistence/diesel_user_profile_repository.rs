//! PostgreSQL-backed `UserProfileRepository` implementation using Diesel ORM.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;

use crate::domain::UserId;
use crate::domain::ports::{UserProfile, UserProfileRepository, UserProfileRepositoryError};

use super::diesel_basic_error_mapping::{map_basic_diesel_error, map_basic_pool_error};
use super::models::UserProfileRow;
use super::pool::DbPool;
use super::schema::user_profiles;

/// Diesel-backed implementation of the `UserProfileRepository` port.
#[derive(Clone)]
pub struct DieselUserProfileRepository {
    pool: DbPool,
}

impl DieselUserProfileRepository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserProfileRepository for DieselUserProfileRepository {
    async fn find_profile(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserProfile>, UserProfileRepositoryError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|err| map_basic_pool_error(err, UserProfileRepositoryError::connection))?;

        let row: Option<UserProfileRow> = user_profiles::table
            .filter(user_profiles::id.eq(user_id.as_str()))
            .select(UserProfileRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|err| {
                map_basic_diesel_error(
                    err,
                    UserProfileRepositoryError::query,
                    UserProfileRepositoryError::connection,
                )
            })?;

        Ok(row.map(|row| UserProfile {
            id: user_id.clone(),
            email: row.email,
            display_name: row.display_name,
            avatar_url: row.avatar_url,
        }))
    }
}

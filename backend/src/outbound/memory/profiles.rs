//! In-process user profile store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use crate::domain::UserId;
use crate::domain::ports::{UserProfile, UserProfileRepository, UserProfileRepositoryError};

/// Profiles held in memory; counts reads so cache behaviour is observable.
#[derive(Default)]
pub struct InMemoryUserProfileRepository {
    profiles: RwLock<HashMap<UserId, UserProfile>>,
    reads: AtomicUsize,
}

impl InMemoryUserProfileRepository {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a profile.
    pub fn upsert(&self, profile: UserProfile) {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.id.clone(), profile);
    }

    /// How many lookups have been served.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl UserProfileRepository for InMemoryUserProfileRepository {
    async fn find_profile(
        &self,
        user_id: &UserId,
    ) -> Result<Option<UserProfile>, UserProfileRepositoryError> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(user_id)
            .cloned())
    }
}

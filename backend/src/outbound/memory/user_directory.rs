//! In-process user directory.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::ports::{UserDirectory, UserDirectoryError};
use crate::domain::{UserId, UserProfile};

/// Directory backed by a map of known profiles.
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    profiles: RwLock<HashMap<UserId, UserProfile>>,
}

impl InMemoryUserDirectory {
    /// Seed the directory with `profiles`.
    pub fn with_profiles(profiles: impl IntoIterator<Item = UserProfile>) -> Self {
        Self {
            profiles: RwLock::new(profiles.into_iter().map(|p| (p.id(), p)).collect()),
        }
    }

    /// Add or replace a profile.
    pub async fn upsert(&self, profile: UserProfile) {
        self.profiles.write().await.insert(profile.id(), profile);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_user(&self, id: UserId) -> Result<Option<UserProfile>, UserDirectoryError> {
        Ok(self.profiles.read().await.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;

    #[tokio::test]
    async fn upserted_profiles_are_found() {
        let directory = InMemoryUserDirectory::default();
        let profile = UserProfile::try_new(UserId::random(), "Ada", None).expect("valid profile");
        directory.upsert(profile.clone()).await;

        let found = directory.find_user(profile.id()).await.expect("lookup");
        assert_eq!(found, Some(profile));
    }
}

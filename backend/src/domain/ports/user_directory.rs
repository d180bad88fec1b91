//! Port for resolving user identities.
//!
//! Identity lives outside the lending core. The directory turns ids into
//! [`UserProfile`]s for status text and notification addressing.

use async_trait::async_trait;

use crate::domain::{UserId, UserProfile};

use super::define_port_error;

define_port_error! {
    /// Errors raised by user directory adapters.
    pub enum UserDirectoryError {
        /// Directory connection could not be established.
        Connection { message: String } =>
            "user directory connection failed: {message}",
        /// Lookup failed during execution.
        Query { message: String } =>
            "user directory query failed: {message}",
    }
}

/// Port for user profile lookup.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Fetch a profile; `None` when the user is unknown.
    async fn find_user(&self, id: UserId) -> Result<Option<UserProfile>, UserDirectoryError>;
}

/// Fixture directory that knows nobody.
///
/// Status text falls back to generic names when profiles are missing, so
/// this is enough for tests that do not assert on names.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureUserDirectory;

#[async_trait]
impl UserDirectory for FixtureUserDirectory {
    async fn find_user(&self, _id: UserId) -> Result<Option<UserProfile>, UserDirectoryError> {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;

    #[tokio::test]
    async fn fixture_directory_returns_none() {
        let directory = FixtureUserDirectory;
        let found = directory
            .find_user(UserId::random())
            .await
            .expect("fixture lookup succeeds");
        assert!(found.is_none());
    }
}

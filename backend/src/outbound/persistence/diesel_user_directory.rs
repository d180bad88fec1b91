//! PostgreSQL-backed [`UserDirectory`] reading the `users` table.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::warn;

use super::error_mapping::{directory_pool_error, user_directory_error};
use super::models::UserRow;
use super::pool::DbPool;
use super::schema::users;
use crate::domain::ports::{UserDirectory, UserDirectoryError};
use crate::domain::{UserId, UserProfile};

/// Diesel implementation of the user directory.
#[derive(Clone)]
pub struct DieselUserDirectory {
    pool: DbPool,
}

impl DieselUserDirectory {
    /// Directory drawing connections from `pool`.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Rows with an unusable display name are treated as unknown users so that
/// status text falls back to a generic name.
fn row_to_profile(row: UserRow) -> Option<UserProfile> {
    match UserProfile::try_new(UserId::from_uuid(row.id), row.display_name, row.email.as_deref()) {
        Ok(profile) => Some(profile),
        Err(error) => {
            warn!(user_id = %row.id, %error, "stored user profile is invalid");
            None
        }
    }
}

#[async_trait]
impl UserDirectory for DieselUserDirectory {
    async fn find_user(&self, id: UserId) -> Result<Option<UserProfile>, UserDirectoryError> {
        let mut conn = self.pool.get().await.map_err(directory_pool_error)?;
        let row: Option<UserRow> = users::table
            .find(id.as_uuid())
            .select(UserRow::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(|error| user_directory_error(&error))?;
        Ok(row.and_then(row_to_profile))
    }
}

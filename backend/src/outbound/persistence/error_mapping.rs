//! Diesel and pool failures mapped onto the lending port errors.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use tracing::debug;

use super::pool::PoolError;
use crate::domain::ports::{LendingStoreError, UserDirectoryError};

/// Coarse classification shared by every adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FailureKind {
    /// The connection is gone.
    Connection,
    /// A concurrent transaction won; retrying may succeed.
    Conflict,
    /// The statement itself failed.
    Query,
}

/// Classify a Diesel error, logging the driver detail at debug level.
pub(crate) fn classify(error: &DieselError) -> (FailureKind, &'static str) {
    match error {
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
        }
        _ => debug!(
            error_type = %std::any::type_name_of_val(error),
            "diesel operation failed"
        ),
    }

    match error {
        DieselError::NotFound => (FailureKind::Query, "record not found"),
        DieselError::QueryBuilderError(_) => (FailureKind::Query, "database query error"),
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, _) => {
            (FailureKind::Connection, "database connection error")
        }
        DieselError::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
            (FailureKind::Conflict, "serialization failure")
        }
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            (FailureKind::Conflict, "unique constraint violated")
        }
        DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
            (FailureKind::Query, "referenced row missing")
        }
        _ => (FailureKind::Query, "database error"),
    }
}

/// Map a Diesel error for the lending store.
pub(crate) fn lending_store_error(error: &DieselError) -> LendingStoreError {
    match classify(error) {
        (FailureKind::Connection, message) => LendingStoreError::connection(message),
        (FailureKind::Conflict, message) => LendingStoreError::conflict(message),
        (FailureKind::Query, message) => LendingStoreError::query(message),
    }
}

/// Map a Diesel error for the user directory. Conflicts are plain query
/// failures there since reads never retry.
pub(crate) fn user_directory_error(error: &DieselError) -> UserDirectoryError {
    match classify(error) {
        (FailureKind::Connection, message) => UserDirectoryError::connection(message),
        (FailureKind::Conflict | FailureKind::Query, message) => UserDirectoryError::query(message),
    }
}

/// Pool failures are always connection errors.
pub(crate) fn lending_pool_error(error: PoolError) -> LendingStoreError {
    LendingStoreError::connection(error.into_message())
}

/// Pool failures are always connection errors.
pub(crate) fn directory_pool_error(error: PoolError) -> UserDirectoryError {
    UserDirectoryError::connection(error.into_message())
}

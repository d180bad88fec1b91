//! Port for lending state persistence.
//!
//! The store exposes consistent reads plus a single write primitive,
//! [`LendingStore::atomically`], which loads a snapshot, runs a pure
//! decision against it, and applies the resulting change set in one
//! isolated unit of work. Adapters must guarantee that two concurrent units
//! of work touching the same aggregates cannot both commit decisions based
//! on the same prior state; the loser reports
//! [`LendingStoreError::Conflict`] and the caller re-runs its decision.

use async_trait::async_trait;

use crate::domain::{
    Decision, Error, Grant, ItemCategory, LendingSnapshot, Principal, SnapshotScope, Transaction,
    UserId,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by lending store adapters.
    pub enum LendingStoreError {
        /// Store connection could not be established.
        Connection { message: String } =>
            "lending store connection failed: {message}",
        /// Query or mutation failed during execution.
        Query { message: String } =>
            "lending store query failed: {message}",
        /// A concurrent unit of work won; the decision should be re-run.
        Conflict { message: String } =>
            "lending store write conflicted: {message}",
    }
}

/// Why a unit of work did not commit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UnitOfWorkError {
    /// The decision refused the operation; nothing was written.
    #[error(transparent)]
    Rejected(Error),
    /// The store failed; nothing was written.
    #[error(transparent)]
    Store(#[from] LendingStoreError),
}

/// Port for lending state storage.
#[async_trait]
pub trait LendingStore: Send + Sync {
    /// Load the aggregates named by `scope` without locking them.
    async fn snapshot(&self, scope: &SnapshotScope) -> Result<LendingSnapshot, LendingStoreError>;

    /// Grants held by any of `principals`.
    async fn grants_held_by(&self, principals: &[Principal])
    -> Result<Vec<Grant>, LendingStoreError>;

    /// Every transaction, open or closed, where `user` is a party.
    async fn transactions_involving(
        &self,
        user: UserId,
    ) -> Result<Vec<Transaction>, LendingStoreError>;

    /// The category catalogue ordered by name.
    async fn categories(&self) -> Result<Vec<ItemCategory>, LendingStoreError>;

    /// Load `scope`, run `decide`, and apply its changes atomically.
    ///
    /// `decide` may run more than once per call only if the adapter retries
    /// internally; it must therefore be free of side effects.
    async fn atomically<T, F>(
        &self,
        scope: &SnapshotScope,
        decide: F,
    ) -> Result<Decision<T>, UnitOfWorkError>
    where
        T: Send + 'static,
        F: Fn(&LendingSnapshot) -> Result<Decision<T>, Error> + Send + Sync;
}

#[cfg(test)]
mod tests {
    //! Regression coverage for this module.
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn conflict_error_formats_message() {
        let error = LendingStoreError::conflict("could not serialize access");
        assert_eq!(
            error.to_string(),
            "lending store write conflicted: could not serialize access"
        );
    }

    #[rstest]
    fn rejected_unit_of_work_surfaces_domain_message() {
        let error = UnitOfWorkError::Rejected(Error::moderator_required("keep one"));
        assert_eq!(error.to_string(), "keep one");
    }

    #[rstest]
    fn store_errors_convert_into_unit_of_work_errors() {
        let error: UnitOfWorkError = LendingStoreError::query("boom").into();
        assert!(matches!(error, UnitOfWorkError::Store(LendingStoreError::Query { .. })));
    }
}

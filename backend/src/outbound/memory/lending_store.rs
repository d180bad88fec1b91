//! In-process lending store.
//!
//! A single async mutex serialises every unit of work, which gives the same
//! guarantee as SERIALIZABLE isolation: each decision sees the state left by
//! the previous commit. Change sets are applied to a copy of the tables and
//! swapped in only when every write succeeds.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::state::LendingTables;
use crate::domain::ports::{LendingStore, LendingStoreError, UnitOfWorkError};
use crate::domain::{
    Decision, Error, Grant, ItemCategory, LendingSnapshot, Principal, SnapshotScope, Transaction,
    UserId,
};

/// Lending store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryLendingStore {
    tables: Mutex<LendingTables>,
}

impl InMemoryLendingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LendingStore for InMemoryLendingStore {
    async fn snapshot(&self, scope: &SnapshotScope) -> Result<LendingSnapshot, LendingStoreError> {
        Ok(self.tables.lock().await.snapshot(scope))
    }

    async fn grants_held_by(
        &self,
        principals: &[Principal],
    ) -> Result<Vec<Grant>, LendingStoreError> {
        Ok(self.tables.lock().await.grants_held_by(principals))
    }

    async fn transactions_involving(
        &self,
        user: UserId,
    ) -> Result<Vec<Transaction>, LendingStoreError> {
        Ok(self.tables.lock().await.transactions_involving(user))
    }

    async fn categories(&self) -> Result<Vec<ItemCategory>, LendingStoreError> {
        Ok(self.tables.lock().await.categories())
    }

    async fn atomically<T, F>(
        &self,
        scope: &SnapshotScope,
        decide: F,
    ) -> Result<Decision<T>, UnitOfWorkError>
    where
        T: Send + 'static,
        F: Fn(&LendingSnapshot) -> Result<Decision<T>, Error> + Send + Sync,
    {
        let mut tables = self.tables.lock().await;
        let snapshot = tables.snapshot(scope);
        let decision = decide(&snapshot).map_err(UnitOfWorkError::Rejected)?;

        let mut staged = tables.clone();
        for change in decision.changes.changes() {
            staged.apply(change.clone()).inspect_err(|error| {
                debug!(%error, "in-memory write rejected; discarding unit of work");
            })?;
        }
        *tables = staged;
        Ok(decision)
    }
}

//! Runs lending decisions against the store and publishes their events.
//!
//! Every mutating service operation goes through [`UnitOfWork::run`]: the
//! store loads a snapshot, the pure decision runs against it, and the writes
//! commit atomically. Store conflicts re-run the whole decision a bounded
//! number of times so legality is always derived from committed state.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::ports::{LendingEventSink, LendingStore, LendingStoreError, UnitOfWorkError};
use crate::domain::{Decision, Error, LendingEvent, LendingSnapshot, SnapshotScope};

/// Retries after a store conflict before giving up.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 3;

/// Map lending store failures to domain errors.
pub(crate) fn map_store_error(error: LendingStoreError) -> Error {
    match error {
        LendingStoreError::Connection { message } => {
            Error::service_unavailable(format!("lending store unavailable: {message}"))
        }
        LendingStoreError::Query { message } => {
            Error::internal(format!("lending store error: {message}"))
        }
        LendingStoreError::Conflict { message } => Error::conflict(format!(
            "concurrent update could not be serialised: {message}"
        )),
    }
}

/// Shared store, notification sink, and retry policy.
pub struct UnitOfWork<S, E> {
    store: Arc<S>,
    events: Arc<E>,
    conflict_retries: u32,
}

impl<S, E> Clone for UnitOfWork<S, E> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            events: Arc::clone(&self.events),
            conflict_retries: self.conflict_retries,
        }
    }
}

impl<S, E> UnitOfWork<S, E> {
    /// Wrap a store and sink with the default retry policy.
    pub fn new(store: Arc<S>, events: Arc<E>) -> Self {
        Self {
            store,
            events,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }

    /// Override how many times a conflicted unit of work is re-run.
    pub fn with_conflict_retries(mut self, retries: u32) -> Self {
        self.conflict_retries = retries;
        self
    }

    /// Configured retry budget.
    pub fn conflict_retries(&self) -> u32 {
        self.conflict_retries
    }

    /// Underlying store, for read-only queries.
    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S, E> UnitOfWork<S, E>
where
    S: LendingStore,
    E: LendingEventSink,
{
    /// Load `scope` without taking part in a unit of work.
    pub async fn snapshot(&self, scope: &SnapshotScope) -> Result<LendingSnapshot, Error> {
        self.store.snapshot(scope).await.map_err(map_store_error)
    }

    /// Execute `decide` atomically, retrying on store conflicts, and publish
    /// its events once the writes commit.
    pub async fn run<T, F>(
        &self,
        operation: &'static str,
        scope: SnapshotScope,
        decide: F,
    ) -> Result<T, Error>
    where
        T: Send + 'static,
        F: Fn(&LendingSnapshot) -> Result<Decision<T>, Error> + Send + Sync,
    {
        let mut attempt: u32 = 0;
        loop {
            match self.store.atomically(&scope, &decide).await {
                Ok(decision) => {
                    let (changes, events) = decision.changes.into_parts();
                    if !changes.is_empty() {
                        info!(operation, writes = changes.len(), "lending change committed");
                    }
                    self.publish(events).await;
                    return Ok(decision.value);
                }
                Err(UnitOfWorkError::Rejected(error)) => {
                    debug!(
                        operation,
                        code = ?error.code(),
                        message = error.message(),
                        "operation rejected"
                    );
                    return Err(error);
                }
                Err(UnitOfWorkError::Store(LendingStoreError::Conflict { message }))
                    if attempt < self.conflict_retries =>
                {
                    attempt += 1;
                    debug!(operation, attempt, %message, "store conflict; re-running decision");
                }
                Err(UnitOfWorkError::Store(error)) => {
                    debug!(operation, %error, "lending store failed");
                    return Err(map_store_error(error));
                }
            }
        }
    }

    async fn publish(&self, events: Vec<LendingEvent>) {
        for event in events {
            if let Err(error) = self.events.publish(&event).await {
                warn!(
                    %error,
                    kind = event.kind(),
                    recipient = %event.recipient(),
                    "lending event delivery failed"
                );
            }
        }
    }
}

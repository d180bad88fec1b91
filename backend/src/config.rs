//! Lending core configuration loaded via OrthoConfig.

use std::sync::Arc;
use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;

use crate::domain::{DEFAULT_CONFLICT_RETRIES, UnitOfWork};

const DEFAULT_POOL_MAX_SIZE: u32 = 10;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

/// Settings shared by the binaries and service wiring.
#[derive(Debug, Clone, Deserialize, OrthoConfig)]
#[ortho_config(prefix = "BORROWD")]
pub struct LendingSettings {
    /// PostgreSQL connection URL; absent means in-memory only.
    pub database_url: Option<String>,
    /// Maximum pooled connections.
    #[ortho_config(default = 10)]
    pub pool_max_size: u32,
    /// Idle connections kept warm.
    pub pool_min_idle: Option<u32>,
    /// Seconds to wait for a pooled connection.
    #[ortho_config(default = 30)]
    pub connection_timeout_secs: u64,
    /// Re-runs of a unit of work after a serialisation conflict.
    #[ortho_config(default = 3)]
    pub conflict_retries: u32,
}

impl LendingSettings {
    /// Connection checkout timeout.
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Unit of work over `store` and `events` using the configured retry
    /// budget.
    pub fn unit_of_work<S, E>(&self, store: Arc<S>, events: Arc<E>) -> UnitOfWork<S, E> {
        UnitOfWork::new(store, events).with_conflict_retries(self.conflict_retries)
    }
}

impl Default for LendingSettings {
    fn default() -> Self {
        Self {
            database_url: None,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            pool_min_idle: None,
            connection_timeout_secs: DEFAULT_CONNECTION_TIMEOUT_SECS,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

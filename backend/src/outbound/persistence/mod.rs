//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! # Architecture
//!
//! - **Thin adapters**: the store translates between rows and domain types
//!   and applies change sets. Legality is decided in the domain.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Serialisable units of work**: every decision runs inside one
//!   SERIALIZABLE transaction; conflicts are reported for retry.
//! - **Async-safe pooling**: connections come from a `bb8` pool through
//!   `diesel-async`.
//!
//! # Example
//!
//! ```no_run
//! use borrowd::outbound::persistence::{DbPool, DieselLendingStore, PoolConfig};
//!
//! # async fn wire() -> Result<(), borrowd::outbound::persistence::PoolError> {
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/borrowd")).await?;
//! let store = DieselLendingStore::new(pool);
//! # let _ = store;
//! # Ok(())
//! # }
//! ```

mod diesel_lending_store;
mod diesel_user_directory;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_lending_store::DieselLendingStore;
pub use diesel_user_directory::DieselUserDirectory;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};

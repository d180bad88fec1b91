//! In-process adapters for the lending ports.
//!
//! Used by tests and by embedders that do not need durable storage.

mod lending_store;
mod state;
mod user_directory;

pub use lending_store::InMemoryLendingStore;
pub use user_directory::InMemoryUserDirectory;

//! Outbound adapters implementing the lending ports.
//!
//! - **memory**: in-process store and directory for tests and embedding
//! - **persistence**: PostgreSQL-backed adapters using Diesel ORM
//! - **notifications**: event sinks
//!
//! Adapters translate between domain types and their storage or transport
//! representation. They contain no lending rules.

pub mod memory;
pub mod notifications;
pub mod persistence;

//! Domain ports defining the edges of the hexagon.
//!
//! Ports describe how the lending core reaches its driven adapters: the
//! store holding lending state, the directory resolving user identities,
//! and the sink delivering notifications. Each port exposes a typed error
//! enum so adapters map their failures into predictable variants.

mod macros;
pub(crate) use macros::define_port_error;

mod lending_event_sink;
mod lending_store;
mod user_directory;

#[cfg(test)]
pub use lending_event_sink::MockLendingEventSink;
pub use lending_event_sink::{FixtureLendingEventSink, LendingEventSink, LendingEventSinkError};
pub use lending_store::{LendingStore, LendingStoreError, UnitOfWorkError};
#[cfg(test)]
pub use user_directory::MockUserDirectory;
pub use user_directory::{FixtureUserDirectory, UserDirectory, UserDirectoryError};

//! Port for outbound lending notifications.

use async_trait::async_trait;

use crate::domain::LendingEvent;

use super::define_port_error;

define_port_error! {
    /// Errors raised by notification adapters.
    pub enum LendingEventSinkError {
        /// The delivery channel refused or dropped the event.
        Delivery { message: String } =>
            "lending event delivery failed: {message}",
    }
}

/// Fire-and-forget notification hook.
///
/// Services call this after the triggering change commits. Failures are
/// logged by the caller and never undo or fail the operation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LendingEventSink: Send + Sync {
    /// Hand one event to the delivery channel.
    async fn publish(&self, event: &LendingEvent) -> Result<(), LendingEventSinkError>;
}

/// Fixture sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureLendingEventSink;

#[async_trait]
impl LendingEventSink for FixtureLendingEventSink {
    async fn publish(&self, _event: &LendingEvent) -> Result<(), LendingEventSinkError> {
        Ok(())
    }
}

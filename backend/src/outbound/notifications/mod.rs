//! Notification adapters.
//!
//! Delivery channels (email, push) sit outside the lending core. The
//! tracing sink records each event as a structured log line so operators
//! can see what would have been sent.

use async_trait::async_trait;
use tracing::info;

use crate::domain::LendingEvent;
use crate::domain::ports::{LendingEventSink, LendingEventSinkError};

/// Sink that logs events instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Create a new tracing sink.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LendingEventSink for TracingEventSink {
    async fn publish(&self, event: &LendingEvent) -> Result<(), LendingEventSinkError> {
        let payload = serde_json::to_string(event)
            .map_err(|err| LendingEventSinkError::delivery(err.to_string()))?;
        info!(
            kind = event.kind(),
            recipient = %event.recipient(),
            %payload,
            "lending event"
        );
        Ok(())
    }
}

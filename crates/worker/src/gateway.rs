//! Gateways that write outbound messages to the log.

use async_trait::async_trait;
use domain::{BookingCommand, BundleEvent, Message};
use saga::{CommandSender, EventPublisher, SagaError};

/// Writes every command as a structured log record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingCommandSender;

#[async_trait]
impl CommandSender for LoggingCommandSender {
    async fn send(&self, command: BookingCommand) -> saga::Result<()> {
        let payload =
            serde_json::to_string(&command).map_err(|e| SagaError::CommandSend(e.to_string()))?;
        tracing::info!(
            target: "bundle_worker::commands",
            command_type = command.message_type(),
            %payload,
            "command"
        );
        Ok(())
    }
}

/// Writes every event as a structured log record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventPublisher;

#[async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish(&self, event: BundleEvent) -> saga::Result<()> {
        let payload =
            serde_json::to_string(&event).map_err(|e| SagaError::EventPublish(e.to_string()))?;
        tracing::info!(
            target: "bundle_worker::events",
            event_type = event.message_type(),
            %payload,
            "event"
        );
        Ok(())
    }
}

//! Outbound gateways: where commands and events leave the process manager.

use std::sync::Arc;

use async_trait::async_trait;
use domain::{BookingCommand, BundleEvent};
use tokio::sync::Mutex;

use crate::error::{Result, SagaError};

/// Sends commands to downstream booking services.
///
/// Delivery is at-least-once; receivers deduplicate with the idempotency
/// key carried by booking commands.
#[async_trait]
pub trait CommandSender: Send + Sync {
    /// Hands a command to the bus.
    async fn send(&self, command: BookingCommand) -> Result<()>;
}

/// Publishes bundle events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Hands an event to the bus.
    async fn publish(&self, event: BundleEvent) -> Result<()>;
}

#[derive(Debug, Default)]
struct FailureInjection {
    always: bool,
    remaining: usize,
}

impl FailureInjection {
    fn should_fail(&mut self) -> bool {
        if self.always {
            return true;
        }
        if self.remaining > 0 {
            self.remaining -= 1;
            return true;
        }
        false
    }
}

#[derive(Debug, Default)]
struct SentCommands {
    commands: Vec<BookingCommand>,
    failures: FailureInjection,
}

/// Command sender that records every command it accepts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCommandSender {
    state: Arc<Mutex<SentCommands>>,
}

impl InMemoryCommandSender {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail until reset.
    pub async fn set_fail(&self, fail: bool) {
        self.state.lock().await.failures.always = fail;
    }

    /// Makes the next `count` sends fail.
    pub async fn fail_next(&self, count: usize) {
        self.state.lock().await.failures.remaining = count;
    }

    /// Returns the accepted commands in send order.
    pub async fn sent(&self) -> Vec<BookingCommand> {
        self.state.lock().await.commands.clone()
    }

    /// Removes and returns the accepted commands.
    pub async fn take(&self) -> Vec<BookingCommand> {
        std::mem::take(&mut self.state.lock().await.commands)
    }
}

#[async_trait]
impl CommandSender for InMemoryCommandSender {
    async fn send(&self, command: BookingCommand) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.failures.should_fail() {
            return Err(SagaError::CommandSend(
                "command bus unavailable".to_string(),
            ));
        }
        state.commands.push(command);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct PublishedEvents {
    events: Vec<BundleEvent>,
    failures: FailureInjection,
}

/// Event publisher that records every event it accepts.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventPublisher {
    state: Arc<Mutex<PublishedEvents>>,
}

impl InMemoryEventPublisher {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every publish fail until reset.
    pub async fn set_fail(&self, fail: bool) {
        self.state.lock().await.failures.always = fail;
    }

    /// Makes the next `count` publishes fail.
    pub async fn fail_next(&self, count: usize) {
        self.state.lock().await.failures.remaining = count;
    }

    /// Returns the accepted events in publish order.
    pub async fn published(&self) -> Vec<BundleEvent> {
        self.state.lock().await.events.clone()
    }

    /// Removes and returns the accepted events.
    pub async fn take(&self) -> Vec<BundleEvent> {
        std::mem::take(&mut self.state.lock().await.events)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventPublisher {
    async fn publish(&self, event: BundleEvent) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.failures.should_fail() {
            return Err(SagaError::EventPublish(
                "event bus unavailable".to_string(),
            ));
        }
        state.events.push(event);
        Ok(())
    }
}

//! In-process delivery of inbound events with retry and a poison queue.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use domain::{InboundEvent, Message};
use tokio::sync::{Mutex, mpsc};
use tokio::task::{JoinHandle, JoinSet};

use crate::error::Result;

/// Handles one inbound event.
#[async_trait]
pub trait InboundHandler: Send + Sync {
    /// Routes the event to its handler.
    ///
    /// Returning an error marks the event as unprocessed; the delivery
    /// layer decides from [`SagaError::is_retriable`](crate::SagaError::is_retriable)
    /// whether to try again.
    async fn handle(&self, event: &InboundEvent) -> Result<()>;
}

/// Exponential backoff between delivery attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retries() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Returns the wait before the given retry (0-based), capped at `max_backoff`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        let capped = millis.min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// An event that could not be handled.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub event: InboundEvent,

    /// Error returned by the last attempt.
    pub error: String,

    pub attempts: u32,
}

/// How a delivery ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The handler succeeded.
    Handled { attempts: u32 },

    /// The event was moved to the poison queue.
    DeadLettered { attempts: u32 },
}

impl DeliveryOutcome {
    /// Returns the number of handler invocations.
    pub fn attempts(&self) -> u32 {
        match self {
            DeliveryOutcome::Handled { attempts } | DeliveryOutcome::DeadLettered { attempts } => {
                *attempts
            }
        }
    }

    /// Returns true if the handler succeeded.
    pub fn is_handled(&self) -> bool {
        matches!(self, DeliveryOutcome::Handled { .. })
    }
}

/// Delivers inbound events to a handler, one task per event.
///
/// Retriable failures are retried with backoff. Permanent failures, and
/// retriable ones that outlast the policy, are parked in the poison queue
/// until [`Delivery::replay_dead_letters`] is called.
pub struct Delivery<H> {
    handler: Arc<H>,
    policy: RetryPolicy,
    dead_letters: Arc<Mutex<Vec<DeadLetter>>>,
}

impl<H> Clone for Delivery<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            policy: self.policy.clone(),
            dead_letters: Arc::clone(&self.dead_letters),
        }
    }
}

impl<H> Delivery<H>
where
    H: InboundHandler + 'static,
{
    /// Creates a delivery layer for the handler.
    pub fn new(handler: H, policy: RetryPolicy) -> Self {
        Self {
            handler: Arc::new(handler),
            policy,
            dead_letters: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the wrapped handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Delivers one event, retrying until it is handled or dead-lettered.
    #[tracing::instrument(
        skip(self, event),
        fields(
            message_type = event.message_type(),
            message_id = %event.header().id,
            correlation_key = %event.correlation_key()
        )
    )]
    pub async fn deliver(&self, event: InboundEvent) -> DeliveryOutcome {
        let started = Instant::now();
        let mut attempts = 0;

        let outcome = loop {
            attempts += 1;
            match self.handler.handle(&event).await {
                Ok(()) => break DeliveryOutcome::Handled { attempts },
                Err(err) if err.is_retriable() && attempts <= self.policy.max_retries => {
                    let delay = self.policy.backoff(attempts - 1);
                    metrics::counter!("delivery_retries_total").increment(1);
                    tracing::warn!(attempts, ?delay, error = %err, "handler failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    metrics::counter!("delivery_dead_letters_total").increment(1);
                    tracing::warn!(
                        attempts,
                        retriable = err.is_retriable(),
                        error = %err,
                        "handler failed, moving event to poison queue"
                    );
                    self.dead_letters.lock().await.push(DeadLetter {
                        event,
                        error: err.to_string(),
                        attempts,
                    });
                    break DeliveryOutcome::DeadLettered { attempts };
                }
            }
        };

        metrics::histogram!("delivery_duration_seconds").record(started.elapsed().as_secs_f64());
        outcome
    }

    /// Delivers the event on its own task.
    pub fn spawn(&self, event: InboundEvent) -> JoinHandle<DeliveryOutcome> {
        let delivery = self.clone();
        tokio::spawn(async move { delivery.deliver(event).await })
    }

    /// Delivers every event received on the channel until it closes.
    ///
    /// Each event runs on its own task; returns once the channel is closed
    /// and every spawned delivery has finished. Returns the number of
    /// events received.
    pub async fn run(&self, mut receiver: mpsc::Receiver<InboundEvent>) -> usize {
        let mut tasks = JoinSet::new();
        let mut received = 0;

        while let Some(event) = receiver.recv().await {
            received += 1;
            let delivery = self.clone();
            tasks.spawn(async move { delivery.deliver(event).await });

            // Reap finished tasks so the set does not grow without bound.
            while let Some(joined) = tasks.try_join_next() {
                log_join_error(joined);
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join_error(joined);
        }
        received
    }

    /// Returns a snapshot of the poison queue.
    pub async fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.lock().await.clone()
    }

    /// Returns the number of events in the poison queue.
    pub async fn dead_letter_count(&self) -> usize {
        self.dead_letters.lock().await.len()
    }

    /// Drains the poison queue and delivers every entry again, in order.
    ///
    /// Entries that fail again are put back into the queue.
    pub async fn replay_dead_letters(&self) -> Vec<DeliveryOutcome> {
        let parked = std::mem::take(&mut *self.dead_letters.lock().await);
        tracing::info!(count = parked.len(), "replaying poison queue");

        let mut outcomes = Vec::with_capacity(parked.len());
        for letter in parked {
            outcomes.push(self.deliver(letter.event).await);
        }
        outcomes
    }
}

fn log_join_error(joined: std::result::Result<DeliveryOutcome, tokio::task::JoinError>) {
    if let Err(err) = joined {
        tracing::error!(error = %err, "delivery task failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use common::{BundleId, MessageHeader};
    use domain::{BundleError, BundleInitialized};

    use crate::error::SagaError;

    /// Fails with the given error for the first `failures` calls.
    struct Flaky {
        failures: u32,
        retriable: bool,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, retriable: bool) -> Self {
            Self {
                failures,
                retriable,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl InboundHandler for Flaky {
        async fn handle(&self, _event: &InboundEvent) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call >= self.failures {
                return Ok(());
            }
            if self.retriable {
                Err(SagaError::CommandSend("bus down".to_string()))
            } else {
                Err(SagaError::Bundle(BundleError::MalformedId {
                    kind: "reference_id",
                    value: "x".to_string(),
                }))
            }
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            multiplier: 2.0,
        }
    }

    fn event() -> InboundEvent {
        InboundEvent::BundleInitialized(BundleInitialized {
            header: MessageHeader::new(),
            bundle_id: BundleId::new(),
        })
    }

    #[test]
    fn test_default_policy_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(3), Duration::from_millis(800));
        assert_eq!(policy.backoff(4), Duration::from_secs(1));
        assert_eq!(policy.backoff(30), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_retriable_failure_is_retried() {
        let delivery = Delivery::new(Flaky::new(3, true), fast_policy(5));

        let outcome = delivery.deliver(event()).await;

        assert_eq!(outcome, DeliveryOutcome::Handled { attempts: 4 });
        assert_eq!(delivery.dead_letter_count().await, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_dead_letter() {
        let delivery = Delivery::new(Flaky::new(10, true), fast_policy(2));

        let outcome = delivery.deliver(event()).await;

        assert_eq!(outcome, DeliveryOutcome::DeadLettered { attempts: 3 });
        let letters = delivery.dead_letters().await;
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].attempts, 3);
        assert!(letters[0].error.contains("bus down"));
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let delivery = Delivery::new(Flaky::new(1, false), fast_policy(5));

        let outcome = delivery.deliver(event()).await;

        assert_eq!(outcome, DeliveryOutcome::DeadLettered { attempts: 1 });
        assert_eq!(delivery.handler().calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_replay_drains_poison_queue() {
        let delivery = Delivery::new(Flaky::new(1, false), fast_policy(0));
        delivery.deliver(event()).await;
        assert_eq!(delivery.dead_letter_count().await, 1);

        let outcomes = delivery.replay_dead_letters().await;

        assert_eq!(outcomes, vec![DeliveryOutcome::Handled { attempts: 1 }]);
        assert_eq!(delivery.dead_letter_count().await, 0);
    }

    #[tokio::test]
    async fn test_run_delivers_until_channel_closes() {
        let delivery = Delivery::new(Flaky::new(0, true), fast_policy(0));
        let (tx, rx) = mpsc::channel(4);

        let runner = {
            let delivery = delivery.clone();
            tokio::spawn(async move { delivery.run(rx).await })
        };
        for _ in 0..10 {
            tx.send(event()).await.unwrap();
        }
        drop(tx);

        assert_eq!(runner.await.unwrap(), 10);
        assert_eq!(delivery.handler().calls.load(Ordering::SeqCst), 10);
    }
}

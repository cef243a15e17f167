//! Worker that hosts the bundle process manager.
//!
//! Reads newline-delimited JSON, creates bundles from `InitializeBundle`
//! lines, delivers inbound events on their own tasks through the retrying
//! delivery layer, and logs outbound commands and events as structured
//! records.

pub mod config;
pub mod error;
pub mod gateway;
pub mod intake;

use std::future::Future;

use saga::{Delivery, RetryPolicy};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

pub use config::{Config, LogFormat};
pub use error::{Result, WorkerError};
pub use gateway::{LoggingCommandSender, LoggingEventPublisher};
pub use intake::{BundleIntake, InitializeBundle, Intake, parse_line};

/// Counters reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Bundles created from `InitializeBundle` lines.
    pub initialized: usize,

    /// `InitializeBundle` lines that could not be applied.
    pub failed_initializations: usize,

    /// Events handed to the delivery layer.
    pub delivered: usize,

    /// Input lines that could not be parsed.
    pub skipped: usize,

    /// Events left in the poison queue.
    pub dead_letters: usize,
}

/// Feeds lines from `input` to `handler` until EOF or `shutdown` resolves.
///
/// Bundle creation runs inline, so events on later lines find the bundle.
/// In-flight deliveries are drained before returning, including those
/// waiting for a retry.
pub async fn run<H, R, F>(
    handler: H,
    policy: RetryPolicy,
    queue_capacity: usize,
    input: R,
    shutdown: F,
) -> Result<RunSummary>
where
    H: BundleIntake + 'static,
    R: AsyncBufRead + Unpin,
    F: Future<Output = ()>,
{
    let delivery = Delivery::new(handler, policy);
    let (sender, receiver) = mpsc::channel(queue_capacity.max(1));

    let runner = {
        let delivery = delivery.clone();
        tokio::spawn(async move { delivery.run(receiver).await })
    };

    let mut lines = input.lines();
    let mut summary = RunSummary::default();
    tokio::pin!(shutdown);

    loop {
        let line = tokio::select! {
            () = &mut shutdown => {
                tracing::info!("shutdown requested, draining in-flight events");
                break;
            }
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            tracing::info!("input closed, draining in-flight events");
            break;
        };

        match parse_line(&line) {
            Ok(Some(Intake::Event(event))) => {
                if sender.send(event).await.is_err() {
                    tracing::error!("delivery loop stopped, no more events accepted");
                    break;
                }
            }
            Ok(Some(Intake::Initialize(request))) => {
                let bundle_id = request.bundle_id;
                match delivery.handler().initialize(request).await {
                    Ok(_) => {
                        summary.initialized += 1;
                        metrics::counter!("intake_initializations_total", "result" => "ok")
                            .increment(1);
                    }
                    Err(err) => {
                        summary.failed_initializations += 1;
                        metrics::counter!("intake_initializations_total", "result" => "error")
                            .increment(1);
                        tracing::warn!(
                            %bundle_id,
                            retriable = err.is_retriable(),
                            error = %err,
                            "bundle not initialized"
                        );
                    }
                }
            }
            Ok(None) => {}
            Err(err) => {
                summary.skipped += 1;
                metrics::counter!("intake_skipped_lines_total").increment(1);
                tracing::warn!(error = %err, "skipping malformed input line");
            }
        }
    }

    drop(sender);
    summary.delivered = runner.await?;
    summary.dead_letters = delivery.dead_letter_count().await;
    for letter in delivery.dead_letters().await {
        tracing::warn!(
            correlation_key = %letter.event.correlation_key(),
            attempts = letter.attempts,
            error = %letter.error,
            "event left in poison queue"
        );
    }

    tracing::info!(?summary, "worker stopped");
    Ok(summary)
}

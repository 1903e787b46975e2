//! Single consumer of the log queue.
//!
//! Every line is delivered over its own connection. Failures are retried
//! every `retry_interval`. Until the first success the worker is
//! bootstrapping: if nothing has been delivered by the time the bootstrap
//! window (measured from the first attempt) runs out, the worker asks the
//! coordinator to shut everything down and stops consuming. After one success
//! it retries forever; the queue bound is what limits memory.
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::queue::QueueConsumer;
use crate::record::RecordFormatter;
use crate::shutdown::ShutdownRequest;
use crate::transport::Collector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// `deadline` is fixed by the first attempt and never moves.
    Bootstrapping { deadline: Option<Instant> },
    Steady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryEnd {
    /// All producers closed and every dequeued line was delivered.
    Drained,
    /// Gave up during bootstrap; queued lines were abandoned.
    BootstrapExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: u64,
    pub failed_attempts: u64,
    pub end: DeliveryEnd,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub retry_interval: Duration,
    pub bootstrap_window: Duration,
}

pub struct DeliveryWorker {
    queue: QueueConsumer,
    collector: Arc<dyn Collector>,
    formatter: RecordFormatter,
    policy: RetryPolicy,
    shutdown_tx: mpsc::Sender<ShutdownRequest>,
    state: WriterState,
    delivered: u64,
    failed_attempts: u64,
}

impl DeliveryWorker {
    pub fn new(
        queue: QueueConsumer,
        collector: Arc<dyn Collector>,
        formatter: RecordFormatter,
        policy: RetryPolicy,
        shutdown_tx: mpsc::Sender<ShutdownRequest>,
    ) -> Self {
        Self {
            queue,
            collector,
            formatter,
            policy,
            shutdown_tx,
            state: WriterState::Bootstrapping { deadline: None },
            delivered: 0,
            failed_attempts: 0,
        }
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<DeliveryReport> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> DeliveryReport {
        while let Some(line) = self.queue.dequeue().await {
            let payload = self.formatter.format(&line.text);
            if !self.deliver_with_retry(&payload).await {
                tracing::error!(
                    error.kind = "delivery.bootstrap_exhausted",
                    collector = %self.collector.endpoint(),
                    window_secs = self.policy.bootstrap_window.as_secs(),
                    "collector unreachable since first attempt; shutting down and abandoning buffered lines"
                );
                // Coordinator may already be gone if the child exited first.
                let _ = self
                    .shutdown_tx
                    .send(ShutdownRequest::DeliveryFailed)
                    .await;
                return self.report(DeliveryEnd::BootstrapExhausted);
            }
        }
        tracing::debug!(delivered = self.delivered, "queue drained");
        self.report(DeliveryEnd::Drained)
    }

    /// Returns false only when the bootstrap window has been exhausted.
    async fn deliver_with_retry(&mut self, payload: &[u8]) -> bool {
        loop {
            if let WriterState::Bootstrapping { deadline: None } = self.state {
                self.state = WriterState::Bootstrapping {
                    deadline: Some(bootstrap_deadline(self.policy.bootstrap_window)),
                };
            }

            match self.collector.deliver(payload).await {
                Ok(()) => {
                    if matches!(self.state, WriterState::Bootstrapping { .. }) {
                        tracing::info!(collector = %self.collector.endpoint(), "collector reachable");
                        self.state = WriterState::Steady;
                    }
                    self.delivered += 1;
                    return true;
                }
                Err(e) => {
                    self.failed_attempts += 1;
                    if let WriterState::Bootstrapping {
                        deadline: Some(deadline),
                    } = self.state
                    {
                        if Instant::now() > deadline {
                            return false;
                        }
                    }
                    tracing::warn!(
                        error.kind = "delivery.attempt_failed",
                        collector = %self.collector.endpoint(),
                        error.message = %e,
                        retry_in_secs = self.policy.retry_interval.as_secs_f64(),
                        "failed to write to collector; retrying"
                    );
                    tokio::time::sleep(self.policy.retry_interval).await;
                }
            }
        }
    }

    fn report(&self, end: DeliveryEnd) -> DeliveryReport {
        DeliveryReport {
            delivered: self.delivered,
            failed_attempts: self.failed_attempts,
            end,
        }
    }
}

/// `now + window`, saturating to roughly 30 years for windows too large to add.
fn bootstrap_deadline(window: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(window)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

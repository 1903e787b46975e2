use std::time::Duration;

use crate::config::{AppConfig, RecordConfig};
use crate::delivery::RetryPolicy;
use crate::supervisor::ChildExit;

/// Resolved knobs for one wrapper run.
#[derive(Debug, Clone)]
pub struct WrapOptions {
    pub buffer_size: usize,
    pub retry_interval: Duration,
    pub bootstrap_window: Duration,
    pub term_grace: Duration,
    pub drain_grace: Duration,
    pub record: RecordConfig,
}

impl WrapOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            buffer_size: cfg.delivery.buffer_size,
            retry_interval: cfg.delivery.retry_interval(),
            bootstrap_window: cfg.delivery.bootstrap_window(),
            term_grace: cfg.shutdown.term_grace(),
            drain_grace: cfg.shutdown.drain_grace(),
            record: cfg.record.clone(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_interval: self.retry_interval,
            bootstrap_window: self.bootstrap_window,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalReason {
    /// No delivery succeeded within the bootstrap window.
    BootstrapExhausted,
    /// Buffered lines were still pending when the drain grace period ran out.
    DrainTimeout,
    /// The delivery task ended abnormally.
    WorkerFailed,
}

#[derive(Debug, Clone, Copy)]
pub struct WrapOutcome {
    pub child: ChildExit,
    pub lines_read: u64,
    pub delivered: u64,
    pub fatal: Option<FatalReason>,
}

impl WrapOutcome {
    pub fn exit_code(&self) -> i32 {
        match self.fatal {
            None => 0,
            Some(_) => 1,
        }
    }
}

//! Wires queue, tees, delivery worker, supervisor and signal listener for
//! one run, then bounds the post-exit drain.
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::AppConfig;
use crate::delivery::{DeliveryEnd, DeliveryReport, DeliveryWorker};
use crate::error::WrapError;
use crate::queue::BoundedQueue;
use crate::record::RecordFormatter;
use crate::shutdown::{shutdown_channel, spawn_signal_listener, ShutdownCoordinator};
use crate::supervisor::ProcessSupervisor;
use crate::tee;
use crate::transport::{Collector, TcpCollector};

use super::types::{FatalReason, WrapOptions, WrapOutcome};

const SHUTDOWN_CHANNEL_CAPACITY: usize = 8;

/// Runs `argv` against the TCP collector named in `cfg`.
pub async fn run_wrapper(argv: &[String], cfg: &AppConfig) -> Result<WrapOutcome, WrapError> {
    cfg.validate().map_err(WrapError::Config)?;
    let collector: Arc<dyn Collector> = Arc::new(TcpCollector::from_config(&cfg.collector));
    run_wrapper_with(argv, &WrapOptions::from_config(cfg), collector).await
}

#[tracing::instrument(name = "relaylog.run", skip_all, fields(program = ?argv.first()))]
pub async fn run_wrapper_with(
    argv: &[String],
    opts: &WrapOptions,
    collector: Arc<dyn Collector>,
) -> Result<WrapOutcome, WrapError> {
    let queue = BoundedQueue::new(opts.buffer_size)?;
    let formatter = RecordFormatter::new(&opts.record);
    let endpoint = collector.endpoint();

    let (shutdown_tx, mut shutdown_rx) = shutdown_channel(SHUTDOWN_CHANNEL_CAPACITY);
    let listener = spawn_signal_listener(shutdown_tx.clone())?;

    let (mut supervisor, pipes) = match ProcessSupervisor::spawn(argv, opts.term_grace) {
        Ok(spawned) => spawned,
        Err(e) => {
            listener.abort();
            return Err(e);
        }
    };

    let (producer, consumer) = queue.split();
    let mut out_task = tee::tee_stdout(pipes.stdout, producer.clone());
    let mut err_task = tee::tee_stderr(pipes.stderr, producer);
    let mut worker = DeliveryWorker::new(
        consumer,
        collector,
        formatter,
        opts.retry_policy(),
        shutdown_tx,
    )
    .spawn();

    let mut coordinator = ShutdownCoordinator::new();
    let child = match coordinator.supervise(&mut supervisor, &mut shutdown_rx).await {
        Ok(child) => child,
        Err(e) => {
            listener.abort();
            out_task.abort();
            err_task.abort();
            worker.abort();
            return Err(e);
        }
    };

    // Grace period starts at child exit and is not extended by progress.
    let drained = tokio::time::timeout(opts.drain_grace, async {
        let lines =
            join_tee(&mut out_task, "stdout").await + join_tee(&mut err_task, "stderr").await;
        (lines, (&mut worker).await)
    })
    .await;

    listener.abort();

    let timed_out = drained.is_err();
    let (lines_read, report) = match drained {
        Ok((lines, Ok(report))) => (lines, Some(report)),
        Ok((lines, Err(e))) => {
            tracing::error!(error.kind = "delivery.task_failed", error.message = %e);
            (lines, None)
        }
        Err(_) => {
            out_task.abort();
            err_task.abort();
            let report = if worker.is_finished() {
                (&mut worker).await.ok()
            } else {
                worker.abort();
                None
            };
            (0, report)
        }
    };

    let fatal = match (report, timed_out) {
        (
            Some(DeliveryReport {
                end: DeliveryEnd::BootstrapExhausted,
                ..
            }),
            _,
        ) => Some(FatalReason::BootstrapExhausted),
        (_, true) => {
            tracing::error!(
                error.kind = "delivery.drain_timeout",
                collector = %endpoint,
                grace_secs = opts.drain_grace.as_secs_f64(),
                "flushing logs to collector timed out; giving up on buffered lines"
            );
            Some(FatalReason::DrainTimeout)
        }
        (None, false) => Some(FatalReason::WorkerFailed),
        (Some(_), false) => None,
    };

    let delivered = report.map(|r| r.delivered).unwrap_or(0);
    tracing::info!(
        child_status = %child.status,
        child_state = ?child.state,
        lines_read,
        delivered,
        fatal = ?fatal,
        "wrapper finished"
    );

    Ok(WrapOutcome {
        child,
        lines_read,
        delivered,
        fatal,
    })
}

async fn join_tee(task: &mut JoinHandle<Result<u64, WrapError>>, stream: &'static str) -> u64 {
    match task.await {
        Ok(Ok(lines)) => lines,
        Ok(Err(e)) => {
            tracing::warn!(error.kind = "tee.failed", stream, error.message = %e);
            0
        }
        Err(e) => {
            tracing::warn!(error.kind = "tee.task_failed", stream, error.message = %e);
            0
        }
    }
}

//! Shutdown requests and the OS signal listener that produces them.
//!
//! Everything that wants the child gone sends a [`ShutdownRequest`] down one
//! channel. The [`ShutdownCoordinator`] turns the first request into a single
//! escalation and ignores the rest.
//!
//! ## Signals
//! **Unix platforms:** `SIGINT` and `SIGTERM`.
//!
//! **Windows platforms:** `Ctrl-C` via [`tokio::signal::ctrl_c`].
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::WrapError;
use crate::supervisor::{ChildExit, ProcessSupervisor};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    Signal(&'static str),
    DeliveryFailed,
}

impl std::fmt::Display for ShutdownRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownRequest::Signal(name) => write!(f, "received {name}"),
            ShutdownRequest::DeliveryFailed => {
                f.write_str("collector unreachable during bootstrap")
            }
        }
    }
}

pub fn shutdown_channel(
    capacity: usize,
) -> (mpsc::Sender<ShutdownRequest>, mpsc::Receiver<ShutdownRequest>) {
    mpsc::channel(capacity.max(1))
}

/// Tracks whether escalation has begun; only the first request wins.
#[derive(Debug, Default)]
pub struct ShutdownCoordinator {
    reason: Option<ShutdownRequest>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reason(&self) -> Option<ShutdownRequest> {
        self.reason
    }

    pub fn is_escalating(&self) -> bool {
        self.reason.is_some()
    }

    /// Returns the request if it should start escalation, `None` if one is
    /// already underway.
    pub fn admit(&mut self, request: ShutdownRequest) -> Option<ShutdownRequest> {
        if let Some(current) = self.reason {
            tracing::warn!(
                request = %request,
                escalation = %current,
                "shutdown already in progress; ignoring request"
            );
            return None;
        }
        tracing::warn!(reason = %request, "shutdown requested");
        self.reason = Some(request);
        Some(request)
    }

    /// Waits for the child to exit, escalating on the first request.
    ///
    /// Requests that arrive while escalation runs are logged and dropped.
    pub async fn supervise(
        &mut self,
        supervisor: &mut ProcessSupervisor,
        requests: &mut mpsc::Receiver<ShutdownRequest>,
    ) -> Result<ChildExit, WrapError> {
        let reason = loop {
            tokio::select! {
                res = supervisor.wait() => {
                    let status = res?;
                    tracing::info!(status = %status, "child exited");
                    return Ok(ChildExit {
                        status,
                        state: supervisor.handle().state(),
                        escalation: None,
                    });
                }
                Some(request) = requests.recv() => {
                    if let Some(reason) = self.admit(request) {
                        break reason;
                    }
                }
            }
        };

        let status = {
            let escalation = supervisor.escalate(reason);
            tokio::pin!(escalation);
            loop {
                tokio::select! {
                    res = &mut escalation => break res?,
                    Some(request) = requests.recv() => {
                        self.admit(request);
                    }
                }
            }
        };

        Ok(ChildExit {
            status,
            state: supervisor.handle().state(),
            escalation: Some(reason),
        })
    }
}

/// Forwards every termination signal the process receives until the
/// receiving side of `tx` is dropped.
#[cfg(unix)]
pub fn spawn_signal_listener(
    tx: mpsc::Sender<ShutdownRequest>,
) -> Result<JoinHandle<()>, WrapError> {
    use tokio::signal::unix::{signal, SignalKind};

    let register = |kind: SignalKind, name: &str| {
        signal(kind).map_err(|e| WrapError::Signal(format!("register {name} failed: {e}")))
    };
    let mut sigint = register(SignalKind::interrupt(), "SIGINT")?;
    let mut sigterm = register(SignalKind::terminate(), "SIGTERM")?;

    Ok(tokio::spawn(async move {
        loop {
            let name = tokio::select! {
                Some(()) = sigint.recv() => "SIGINT",
                Some(()) = sigterm.recv() => "SIGTERM",
                _ = tx.closed() => return,
                else => return,
            };
            if tx.send(ShutdownRequest::Signal(name)).await.is_err() {
                return;
            }
        }
    }))
}

#[cfg(not(unix))]
pub fn spawn_signal_listener(
    tx: mpsc::Sender<ShutdownRequest>,
) -> Result<JoinHandle<()>, WrapError> {
    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    if res.is_err() || tx.send(ShutdownRequest::Signal("CTRL_C")).await.is_err() {
                        return;
                    }
                }
                _ = tx.closed() => return,
            }
        }
    }))
}

//! Child process lifecycle: spawn, wait, and SIGTERM → SIGKILL escalation.
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::error::WrapError;
use crate::shutdown::ShutdownRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildState {
    Running,
    TermSent,
    Killed,
    Exited,
}

/// How the child ended.
#[derive(Debug, Clone, Copy)]
pub struct ChildExit {
    pub status: ExitStatus,
    pub state: ChildState,
    pub escalation: Option<ShutdownRequest>,
}

/// Output pipes handed to the stream tees.
pub struct ChildPipes {
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

/// Owns the spawned child. The exit status is recorded exactly once.
pub struct ChildHandle {
    child: Child,
    pid: Option<u32>,
    state: ChildState,
    status: Option<ExitStatus>,
}

impl ChildHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn state(&self) -> ChildState {
        self.state
    }

    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }

    fn record_exit(&mut self, status: ExitStatus) -> ExitStatus {
        if self.status.is_none() {
            self.status = Some(status);
            if self.state != ChildState::Killed {
                self.state = ChildState::Exited;
            }
        }
        status
    }
}

pub struct ProcessSupervisor {
    handle: ChildHandle,
    term_grace: Duration,
}

impl ProcessSupervisor {
    /// Launches `argv` with inherited stdin/environment and piped stdout/stderr.
    pub fn spawn(
        argv: &[String],
        term_grace: Duration,
    ) -> Result<(Self, ChildPipes), WrapError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| WrapError::Spawn("no command provided".into()))?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| WrapError::Spawn(format!("{program}: {e}")))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WrapError::Spawn("no stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| WrapError::Spawn("no stderr".into()))?;

        let pid = child.id();
        tracing::info!(pid = ?pid, program = %program, "child started");

        Ok((
            Self {
                handle: ChildHandle {
                    child,
                    pid,
                    state: ChildState::Running,
                    status: None,
                },
                term_grace,
            },
            ChildPipes { stdout, stderr },
        ))
    }

    pub fn handle(&self) -> &ChildHandle {
        &self.handle
    }

    /// Waits for the child to exit on its own.
    pub async fn wait(&mut self) -> Result<ExitStatus, WrapError> {
        if let Some(status) = self.handle.status {
            return Ok(status);
        }
        let status = self
            .handle
            .child
            .wait()
            .await
            .map_err(|e| WrapError::Spawn(format!("wait failed: {e}")))?;
        Ok(self.handle.record_exit(status))
    }

    /// Sends SIGTERM, waits up to the grace period, then SIGKILLs and waits
    /// without bound.
    pub async fn escalate(&mut self, reason: ShutdownRequest) -> Result<ExitStatus, WrapError> {
        if let Some(status) = self.handle.status {
            return Ok(status);
        }
        let pid = self.handle.pid;

        tracing::warn!(pid = ?pid, reason = %reason, "sending SIGTERM to child");
        if let Err(e) = self.terminate_gracefully() {
            tracing::warn!(pid = ?pid, error.message = %e, "SIGTERM could not be delivered");
        }
        self.handle.state = ChildState::TermSent;

        match tokio::time::timeout(self.term_grace, self.wait()).await {
            Ok(res) => {
                let status = res?;
                tracing::info!(pid = ?pid, status = %status, "child exited after SIGTERM");
                Ok(status)
            }
            Err(_) => {
                tracing::warn!(
                    pid = ?pid,
                    grace_secs = self.term_grace.as_secs_f64(),
                    "child did not exit after SIGTERM; sending SIGKILL"
                );
                self.handle
                    .child
                    .start_kill()
                    .map_err(|e| WrapError::Signal(format!("SIGKILL failed: {e}")))?;
                self.handle.state = ChildState::Killed;
                let status = self.wait().await?;
                tracing::warn!(pid = ?pid, status = %status, "child killed");
                Ok(status)
            }
        }
    }

    #[cfg(unix)]
    fn terminate_gracefully(&mut self) -> Result<(), WrapError> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = self
            .handle
            .child
            .id()
            .ok_or_else(|| WrapError::Signal("child already reaped".into()))?;
        kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
            .map_err(|e| WrapError::Signal(format!("SIGTERM failed: {e}")))
    }

    #[cfg(not(unix))]
    fn terminate_gracefully(&mut self) -> Result<(), WrapError> {
        self.handle
            .child
            .start_kill()
            .map_err(|e| WrapError::Signal(format!("terminate failed: {e}")))
    }
}

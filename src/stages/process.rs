//! # Launching and operating stage processes.
//!
//! The supervisor never touches `tokio::process` directly. It asks a
//! [`Launcher`] for a [`StageHandle`] and drives the handle:
//!
//! ```text
//! Launcher::launch(role, cmd) ──► Box<dyn StageHandle>
//!                                   ├─ try_exit()   non-blocking liveness probe
//!                                   ├─ terminate()  polite stop request (SIGTERM)
//!                                   ├─ wait()       until the process exits
//!                                   ├─ kill()       force stop + reap
//!                                   └─ stderr_tail() last diagnostics lines
//! ```
//!
//! [`ProcessLauncher`] is the real implementation. Stderr of stages that
//! capture it is drained by a background task into a bounded tail buffer,
//! so a chatty stage can never block on a full pipe.

use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};

use super::{CommandSpec, StageExit, StageRole};
use crate::error::StageError;

/// Lines of stderr kept per stage.
const TAIL_LINES: usize = 40;
/// Characters of stderr reported in diagnostics.
const TAIL_CHARS: usize = 500;

/// Spawns stage processes.
pub trait Launcher: Send + Sync + 'static {
    fn launch(&self, role: StageRole, cmd: &CommandSpec) -> Result<Box<dyn StageHandle>, StageError>;
}

/// A running (or exited) stage process.
#[async_trait]
pub trait StageHandle: Send + 'static {
    /// OS process id, if the process has not been reaped yet.
    fn pid(&self) -> Option<u32>;

    /// Returns the exit description if the process has exited, without blocking.
    fn try_exit(&mut self) -> Result<Option<StageExit>, StageError>;

    /// Requests a graceful stop. Does not wait.
    fn terminate(&mut self) -> Result<(), StageError>;

    /// Waits until the process exits.
    async fn wait(&mut self) -> Result<StageExit, StageError>;

    /// Force-stops the process and reaps it.
    async fn kill(&mut self) -> Result<(), StageError>;

    /// Last captured stderr output, at most 500 characters.
    fn stderr_tail(&self) -> Option<String>;
}

/// Launches stages as OS child processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessLauncher;

impl Launcher for ProcessLauncher {
    fn launch(&self, role: StageRole, cmd: &CommandSpec) -> Result<Box<dyn StageHandle>, StageError> {
        let mut command = Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .envs(cmd.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(if cmd.capture_stderr {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|source| StageError::Spawn {
            program: cmd.program.clone(),
            source,
        })?;
        tracing::debug!(stage = %role, pid = ?child.id(), command = %cmd, "stage spawned");

        let tail = StderrTail::default();
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(tail.clone().drain(role, stderr));
        }
        Ok(Box::new(ChildStage { child, tail }))
    }
}

/// Bounded buffer of the most recent stderr lines.
#[derive(Clone, Default)]
struct StderrTail {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl StderrTail {
    async fn drain(self, role: StageRole, stderr: ChildStderr) {
        let mut reader = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            tracing::trace!(stage = %role, "{line}");
            let mut lines = self.lines.lock();
            if lines.len() == TAIL_LINES {
                lines.pop_front();
            }
            lines.push_back(line);
        }
    }

    fn snapshot(&self) -> Option<String> {
        let joined = self
            .lines
            .lock()
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n");
        let joined = joined.trim();
        if joined.is_empty() {
            return None;
        }
        let skip = joined.chars().count().saturating_sub(TAIL_CHARS);
        Some(joined.chars().skip(skip).collect())
    }
}

struct ChildStage {
    child: Child,
    tail: StderrTail,
}

#[async_trait]
impl StageHandle for ChildStage {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    fn try_exit(&mut self) -> Result<Option<StageExit>, StageError> {
        Ok(self.child.try_wait()?.map(StageExit::from))
    }

    #[cfg(unix)]
    fn terminate(&mut self) -> Result<(), StageError> {
        let Some(pid) = self.child.id() else {
            return Ok(());
        };
        // SAFETY: `pid` belongs to our own unreaped child, so it cannot have been recycled.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc == 0 {
            Ok(())
        } else {
            let err = std::io::Error::last_os_error();
            match err.raw_os_error() {
                Some(libc::ESRCH) => Ok(()),
                _ => Err(err.into()),
            }
        }
    }

    #[cfg(not(unix))]
    fn terminate(&mut self) -> Result<(), StageError> {
        Ok(self.child.start_kill()?)
    }

    async fn wait(&mut self) -> Result<StageExit, StageError> {
        Ok(self.child.wait().await?.into())
    }

    async fn kill(&mut self) -> Result<(), StageError> {
        Ok(self.child.kill().await?)
    }

    fn stderr_tail(&self) -> Option<String> {
        self.tail.snapshot()
    }
}

//! Stage identity and exit description.

use std::fmt;
use std::process::ExitStatus;

/// One of the three processes of the streaming pipeline, in start order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageRole {
    /// Virtual framebuffer the renderer draws into.
    Display,
    /// Dashboard program producing frames on the display.
    Renderer,
    /// Capture + encode + transmit process.
    Encoder,
}

impl StageRole {
    /// All roles in dependency order.
    pub const ALL: [StageRole; 3] = [StageRole::Display, StageRole::Renderer, StageRole::Encoder];

    /// Short lowercase name used in logs and feed events.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageRole::Display => "display",
            StageRole::Renderer => "renderer",
            StageRole::Encoder => "encoder",
        }
    }
}

impl fmt::Display for StageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a stage process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageExit {
    /// Exit code, when the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal, when the process was killed (unix only).
    pub signal: Option<i32>,
}

impl StageExit {
    /// Exit with a plain status code.
    pub fn code(code: i32) -> Self {
        Self {
            code: Some(code),
            signal: None,
        }
    }

    /// Exit caused by a signal.
    pub fn signal(signal: i32) -> Self {
        Self {
            code: None,
            signal: Some(signal),
        }
    }

    /// True for exit code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<ExitStatus> for StageExit {
    fn from(status: ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = {
            use std::os::unix::process::ExitStatusExt;
            status.signal()
        };
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

impl fmt::Display for StageExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {code}"),
            (None, Some(sig)) => write!(f, "killed by signal {sig}"),
            (None, None) => f.write_str("exited"),
        }
    }
}

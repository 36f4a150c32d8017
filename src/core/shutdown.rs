//! # Cross-platform OS signal handling.
//!
//! [`ShutdownSignals`] registers listeners up front (so a registration
//! failure can be reported before any stage is spawned) and then yields one
//! item per received termination signal.
//!
//! **Unix:** `SIGINT`, `SIGTERM`, `SIGQUIT`. **Windows:** Ctrl-C.

use std::io;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};
use tokio_util::sync::CancellationToken;

/// Registered termination signal listeners.
pub struct ShutdownSignals {
    #[cfg(unix)]
    int: Signal,
    #[cfg(unix)]
    term: Signal,
    #[cfg(unix)]
    quit: Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    pub fn register() -> io::Result<Self> {
        Ok(Self {
            int: signal(SignalKind::interrupt())?,
            term: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    #[cfg(not(unix))]
    pub fn register() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Waits for the next signal and returns its name.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.int.recv()  => "SIGINT",
            _ = self.term.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> &'static str {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        "ctrl-c"
    }

    /// Cancels `token` on the first signal. Later signals are only logged.
    pub async fn cancel_on_signal(mut self, token: CancellationToken) {
        let name = self.recv().await;
        tracing::info!(signal = name, "termination signal received, shutting down");
        token.cancel();
        loop {
            let name = self.recv().await;
            tracing::info!(signal = name, "shutdown already in progress");
        }
    }
}

//! Error types used by the streamvisor runtime, its stages and its sources.
//!
//! This module defines the error enums for each failure class:
//!
//! - [`RuntimeError`] fatal errors: the pipeline cannot start and the process exits non-zero.
//! - [`ConfigError`] invalid launch parameters (reported as fatal by the binary).
//! - [`StageError`] errors raised while operating one child process.
//! - [`FetchError`] errors raised by an activity source; never leave the source.
//!
//! All types provide `as_label` for logs/metrics.

use std::time::Duration;

use thiserror::Error;

use crate::stages::{StageExit, StageRole};

/// # Fatal errors produced by the supervisor.
///
/// Any of these aborts the whole pipeline. Started stages are cleaned up
/// before the error is returned.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Stream mode was requested without a destination credential.
    #[error("stream key is not set; export YOUTUBE_STREAM_KEY or use --preview")]
    MissingStreamKey,

    /// Launch parameters are invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A stage exited before its settle delay elapsed.
    #[error("{role} failed to start ({exit}){}", fmt_stderr(.stderr))]
    StageStartFailed {
        /// Stage that died.
        role: StageRole,
        /// How it exited.
        exit: StageExit,
        /// Tail of the stage's stderr, if any was captured.
        stderr: Option<String>,
    },

    /// A stage could not be spawned at all.
    #[error("{role} could not be launched: {source}")]
    Launch {
        /// Stage that could not be spawned.
        role: StageRole,
        /// Underlying stage error.
        #[source]
        source: StageError,
    },

    /// OS signal listeners could not be registered.
    #[error("signal registration failed: {0}")]
    Signal(#[source] std::io::Error),
}

fn fmt_stderr(stderr: &Option<String>) -> String {
    match stderr {
        Some(s) if !s.is_empty() => format!("\n{s}"),
        _ => String::new(),
    }
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::MissingStreamKey.as_label(), "runtime_missing_stream_key");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::MissingStreamKey => "runtime_missing_stream_key",
            RuntimeError::Config(_) => "runtime_invalid_config",
            RuntimeError::StageStartFailed { .. } => "runtime_stage_start_failed",
            RuntimeError::Launch { .. } => "runtime_stage_launch_failed",
            RuntimeError::Signal(_) => "runtime_signal_registration",
        }
    }
}

/// # Invalid launch parameters.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Resolution is not of the form `WxH` with non-zero sides.
    #[error("invalid resolution {0:?}; expected WIDTHxHEIGHT, e.g. 1280x720")]
    InvalidResolution(String),

    /// Bitrate is not of the form `<n>k`.
    #[error("invalid bitrate {0:?}; expected kilobits with a k suffix, e.g. 2500k")]
    InvalidBitrate(String),

    /// Renderer command line is empty.
    #[error("renderer command is empty")]
    EmptyRendererCommand,

    /// Frame rate is zero or above what the capture accepts.
    #[error("frame rate {0} is out of range; expected 1..={max}", max = crate::config::MAX_FPS)]
    FrameRateOutOfRange(u32),

    /// Poll interval is zero or longer than a day.
    #[error("poll interval {0:?} is out of range; expected 1ms..=24h")]
    PollIntervalOutOfRange(Duration),

    /// Jitter name is not one of `none`, `full`, `equal`, `decorrelated`.
    #[error("invalid jitter {0:?}; expected none, full, equal or decorrelated")]
    InvalidJitter(String),

    /// Backoff growth factor is below 1 or not finite.
    #[error("backoff factor {0} is invalid; expected a finite value >= 1.0")]
    InvalidBackoffFactor(f64),
}

/// # Errors produced while operating a single stage process.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StageError {
    /// The OS refused to spawn the program.
    #[error("spawn {program:?}: {source}")]
    Spawn {
        /// Program that was executed.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Polling, signalling or waiting on the process failed.
    #[error("process i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl StageError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            StageError::Spawn { .. } => "stage_spawn",
            StageError::Io(_) => "stage_io",
        }
    }
}

/// # Errors produced by one activity source tick.
///
/// These never propagate past the source: each one is turned into a feed event.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FetchError {
    /// The request exceeded its timeout.
    #[error("API timeout after {0:?}")]
    Timeout(Duration),

    /// The endpoint answered 429.
    #[error("rate limited")]
    RateLimited,

    /// The endpoint answered with a non-success status.
    #[error("HTTP {0}")]
    Status(u16),

    /// Connection or protocol failure.
    #[error("{0}")]
    Transport(String),

    /// Body was not the expected JSON shape.
    #[error("malformed response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use streamvisor::FetchError;
    ///
    /// assert_eq!(FetchError::RateLimited.as_label(), "fetch_rate_limited");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "fetch_timeout",
            FetchError::RateLimited => "fetch_rate_limited",
            FetchError::Status(_) => "fetch_status",
            FetchError::Transport(_) => "fetch_transport",
            FetchError::Decode(_) => "fetch_decode",
        }
    }

    /// Indicates whether the error is the server asking us to slow down.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, FetchError::RateLimited)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_start_failed_includes_stderr_tail() {
        let err = RuntimeError::StageStartFailed {
            role: StageRole::Encoder,
            exit: StageExit::code(1),
            stderr: Some("rtmp: connection refused".into()),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("encoder failed to start (exit code 1)"), "{msg}");
        assert!(msg.ends_with("rtmp: connection refused"), "{msg}");
    }

    #[test]
    fn test_stage_start_failed_without_stderr() {
        let err = RuntimeError::StageStartFailed {
            role: StageRole::Display,
            exit: StageExit::code(1),
            stderr: None,
        };
        assert_eq!(err.to_string(), "display failed to start (exit code 1)");
    }

    #[test]
    fn test_config_error_is_fatal_runtime_error() {
        let err: RuntimeError = ConfigError::InvalidBitrate("fast".into()).into();
        assert_eq!(err.as_label(), "runtime_invalid_config");
    }
}

//! # Pipeline configuration.
//!
//! Provides [`Config`], the centralized launch parameters of the streaming
//! pipeline, plus the small value types it is made of ([`Resolution`],
//! [`Bitrate`], [`RunMode`]).
//!
//! Config is used in two ways:
//! 1. **Command construction**: [`CommandSpec`](crate::CommandSpec) builders read
//!    display/resolution/fps/bitrate/destination from it.
//! 2. **Supervision**: settle delays, poll interval, cooldowns and grace.
//!
//! ## Fatal checks
//! [`Config::validate`] is run before anything is spawned; in
//! [`RunMode::Stream`] a non-empty stream key is mandatory.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{ConfigError, RuntimeError};
use crate::policies::{BackoffPolicy, RestartPolicy};
use crate::stages::StageRole;

/// Highest capture frame rate accepted by [`Config::validate`].
pub const MAX_FPS: u32 = 240;

/// Longest liveness poll interval accepted by [`Config::validate`].
pub const MAX_POLL_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Frame size of the virtual display and of the capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl FromStr for Resolution {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidResolution(s.to_string());
        let (w, h) = s.trim().split_once(['x', 'X']).ok_or_else(invalid)?;
        let width: u32 = w.parse().map_err(|_| invalid())?;
        let height: u32 = h.parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Video bitrate in kilobits per second (`2500k`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bitrate {
    pub kbps: u32,
}

impl Bitrate {
    /// Rate-control buffer size: twice the bitrate.
    pub fn bufsize(&self) -> Bitrate {
        Bitrate {
            kbps: self.kbps.saturating_mul(2),
        }
    }
}

impl Default for Bitrate {
    fn default() -> Self {
        Self { kbps: 2500 }
    }
}

impl FromStr for Bitrate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidBitrate(s.to_string());
        let digits = s
            .trim()
            .strip_suffix(['k', 'K'])
            .ok_or_else(invalid)?;
        let kbps: u32 = digits.parse().map_err(|_| invalid())?;
        if kbps == 0 {
            return Err(invalid());
        }
        Ok(Self { kbps })
    }
}

impl fmt::Display for Bitrate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}k", self.kbps)
    }
}

/// Where the encoder sends its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Publish to the remote RTMP endpoint (requires a stream key).
    #[default]
    Stream,
    /// Write to a local file instead of the remote endpoint.
    Preview,
}

/// Launch parameters and supervision timings.
///
/// ## Field semantics
/// - `manage_display = false` is the `no-display` mode: no virtual display is
///   started and `display` must name one that already exists.
/// - `renderer` is the full command line of the dashboard program.
/// - `*_settle`: wait after spawning a stage before checking it is still alive.
/// - `encoder_cooldown`: wait before restarting a crashed encoder; its factor
///   must be finite and at least 1.
/// - `fps` is bounded by [`MAX_FPS`], `poll_interval` by [`MAX_POLL_INTERVAL`].
/// - `grace`: per-stage wait between SIGTERM and SIGKILL on shutdown.
#[derive(Clone, Debug)]
pub struct Config {
    /// X display identifier, e.g. `:99`.
    pub display: String,
    /// Display and capture size.
    pub resolution: Resolution,
    /// Capture frame rate.
    pub fps: u32,
    /// Video bitrate.
    pub bitrate: Bitrate,
    /// RTMP ingest base URL.
    pub rtmp_url: String,
    /// Stream credential appended to `rtmp_url`.
    pub stream_key: Option<String>,
    /// Renderer program and its arguments.
    pub renderer: Vec<String>,
    /// Remote stream or local preview.
    pub mode: RunMode,
    /// Start and own the virtual display.
    pub manage_display: bool,
    /// Output file in preview mode.
    pub preview_file: PathBuf,
    /// File the feed snapshot is exported to for the renderer, if any.
    pub feed_export: Option<PathBuf>,

    pub display_settle: Duration,
    pub renderer_settle: Duration,
    pub encoder_settle: Duration,
    /// Interval of the steady-state liveness check.
    pub poll_interval: Duration,
    /// Delay policy applied before restarting a crashed encoder.
    pub encoder_cooldown: BackoffPolicy,
    /// Grace period between termination request and force-kill.
    pub grace: Duration,
    /// Capacity of the lifecycle event bus.
    pub bus_capacity: usize,
}

impl Default for Config {
    /// Defaults:
    ///
    /// - display `:99`, `1280x720`, 30 fps, `2500k`
    /// - YouTube ingest `rtmp://a.rtmp.youtube.com/live2`, no key
    /// - renderer `python3 dashboard.py`
    /// - settle delays 1s / 2s / 3s, poll every 10s
    /// - encoder cooldown 5s constant, grace 5s
    fn default() -> Self {
        Self {
            display: ":99".to_string(),
            resolution: Resolution::default(),
            fps: 30,
            bitrate: Bitrate::default(),
            rtmp_url: "rtmp://a.rtmp.youtube.com/live2".to_string(),
            stream_key: None,
            renderer: vec!["python3".to_string(), "dashboard.py".to_string()],
            mode: RunMode::Stream,
            manage_display: true,
            preview_file: PathBuf::from("preview_output.flv"),
            feed_export: None,
            display_settle: Duration::from_secs(1),
            renderer_settle: Duration::from_secs(2),
            encoder_settle: Duration::from_secs(3),
            poll_interval: Duration::from_secs(10),
            encoder_cooldown: BackoffPolicy::constant(Duration::from_secs(5)),
            grace: Duration::from_secs(5),
            bus_capacity: 1024,
        }
    }
}

impl Config {
    /// Checks everything that must hold before the first process is spawned.
    pub fn validate(&self) -> Result<(), RuntimeError> {
        if self.mode == RunMode::Stream && self.stream_key().is_none() {
            return Err(RuntimeError::MissingStreamKey);
        }
        if self.renderer.first().is_none_or(|p| p.trim().is_empty()) {
            return Err(ConfigError::EmptyRendererCommand.into());
        }
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(ConfigError::FrameRateOutOfRange(self.fps).into());
        }
        if self.poll_interval < Duration::from_millis(1) || self.poll_interval > MAX_POLL_INTERVAL {
            return Err(ConfigError::PollIntervalOutOfRange(self.poll_interval).into());
        }
        let factor = self.encoder_cooldown.factor;
        if !factor.is_finite() || factor < 1.0 {
            return Err(ConfigError::InvalidBackoffFactor(factor).into());
        }
        Ok(())
    }

    /// Returns the stream key, treating an empty string as unset.
    #[inline]
    pub fn stream_key(&self) -> Option<&str> {
        self.stream_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Full publish URL `<rtmp_url>/<key>`.
    pub fn publish_url(&self) -> Option<String> {
        self.stream_key()
            .map(|key| format!("{}/{}", self.rtmp_url.trim_end_matches('/'), key))
    }

    /// Settle delay of the given stage.
    pub fn settle(&self, role: StageRole) -> Duration {
        match role {
            StageRole::Display => self.display_settle,
            StageRole::Renderer => self.renderer_settle,
            StageRole::Encoder => self.encoder_settle,
        }
    }

    /// Restart behavior of the given stage during steady-state monitoring.
    ///
    /// - display: never restarted
    /// - renderer: restarted immediately
    /// - encoder: restarted after `encoder_cooldown`
    pub fn restart_policy(&self, role: StageRole) -> RestartPolicy {
        match role {
            StageRole::Display => RestartPolicy::Never,
            StageRole::Renderer => RestartPolicy::Always { cooldown: None },
            StageRole::Encoder => RestartPolicy::Always {
                cooldown: Some(self.encoder_cooldown),
            },
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

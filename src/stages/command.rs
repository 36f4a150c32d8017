//! # Command lines of the three pipeline stages.
//!
//! [`CommandSpec`] is plain data (program, args, env) built from a
//! [`Config`]; the [`Launcher`](super::Launcher) turns it into a process.
//!
//! ```text
//! display   Xvfb :99 -screen 0 1280x720x24 -ac +extension GLX +render -noreset
//! renderer  <renderer cmd>   env DISPLAY, STREAM_WIDTH, STREAM_HEIGHT[, STREAM_FEED_PATH]
//! encoder   ffmpeg -f x11grab ... -f lavfi anullsrc ... libx264/aac ... -f flv <dest>
//! ```

use std::fmt;

use crate::config::{Config, RunMode};

use super::StageRole;

/// Program, arguments and extra environment of one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Variables added to the inherited environment.
    pub env: Vec<(String, String)>,
    /// Keep the stage's stderr for diagnostics (otherwise discarded).
    pub capture_stderr: bool,
    /// Substring masked when the command is displayed (stream key).
    secret: Option<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            capture_stderr: false,
            secret: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn capture_stderr(mut self) -> Self {
        self.capture_stderr = true;
        self
    }

    fn redact(mut self, secret: Option<&str>) -> Self {
        self.secret = secret.map(str::to_string);
        self
    }

    /// Value of an extra environment variable, if set.
    pub fn env_var(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Builds the command of `role` from `cfg`.
    pub fn for_role(role: StageRole, cfg: &Config) -> Self {
        match role {
            StageRole::Display => Self::display(cfg),
            StageRole::Renderer => Self::renderer(cfg),
            StageRole::Encoder => Self::encoder(cfg),
        }
    }

    /// Virtual framebuffer at the configured size, 24-bit depth.
    pub fn display(cfg: &Config) -> Self {
        Self::new("Xvfb")
            .arg(&cfg.display)
            .args(["-screen", "0"])
            .arg(format!("{}x24", cfg.resolution))
            .args(["-ac", "+extension", "GLX", "+render", "-noreset"])
    }

    /// Dashboard program pointed at the display.
    pub fn renderer(cfg: &Config) -> Self {
        let mut parts = cfg.renderer.iter();
        let program = parts.next().cloned().unwrap_or_default();
        let mut cmd = Self::new(program)
            .args(parts)
            .env("DISPLAY", &cfg.display)
            .env("STREAM_WIDTH", cfg.resolution.width.to_string())
            .env("STREAM_HEIGHT", cfg.resolution.height.to_string())
            .capture_stderr();
        if let Some(path) = &cfg.feed_export {
            cmd = cmd.env("STREAM_FEED_PATH", path.to_string_lossy());
        }
        cmd
    }

    /// Screen capture + silent stereo track, H.264/AAC in FLV.
    ///
    /// Keyframe every 2 seconds, rate-control buffer of twice the bitrate.
    pub fn encoder(cfg: &Config) -> Self {
        let fps = cfg.fps.to_string();
        let bitrate = cfg.bitrate.to_string();
        let dest = match cfg.mode {
            RunMode::Preview => cfg.preview_file.to_string_lossy().into_owned(),
            RunMode::Stream => cfg
                .publish_url()
                .unwrap_or_else(|| cfg.rtmp_url.clone()),
        };

        Self::new("ffmpeg")
            .arg("-y")
            .args(["-f", "x11grab", "-video_size"])
            .arg(cfg.resolution.to_string())
            .args(["-framerate", fps.as_str(), "-i", cfg.display.as_str()])
            .args(["-f", "lavfi", "-i", "anullsrc=channel_layout=stereo:sample_rate=44100"])
            .args(["-c:v", "libx264", "-preset", "veryfast"])
            .args(["-profile:v", "high", "-level", "4.1"])
            .args(["-b:v", bitrate.as_str(), "-maxrate", bitrate.as_str()])
            .arg("-bufsize")
            .arg(cfg.bitrate.bufsize().to_string())
            .arg("-g")
            .arg(cfg.fps.saturating_mul(2).to_string())
            .args(["-keyint_min", fps.as_str(), "-pix_fmt", "yuv420p"])
            .args(["-c:a", "aac", "-b:a", "128k", "-ar", "44100"])
            .args(["-f", "flv", "-flvflags", "no_duration_filesize"])
            .arg(dest)
            .capture_stderr()
            .redact(cfg.stream_key())
    }
}

impl fmt::Display for CommandSpec {
    /// Shell-like rendering with the secret masked.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |s: &str| match &self.secret {
            Some(secret) => s.replace(secret.as_str(), "****"),
            None => s.to_string(),
        };
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", mask(arg))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn value_after<'a>(cmd: &'a CommandSpec, flag: &str) -> &'a str {
        let i = cmd.args.iter().position(|a| a == flag).unwrap();
        &cmd.args[i + 1]
    }

    #[test]
    fn test_display_command() {
        let cmd = CommandSpec::display(&Config::default());
        assert_eq!(cmd.program, "Xvfb");
        assert_eq!(
            cmd.args,
            [":99", "-screen", "0", "1280x720x24", "-ac", "+extension", "GLX", "+render", "-noreset"]
        );
        assert!(!cmd.capture_stderr);
    }

    #[test]
    fn test_renderer_inherits_display_target() {
        let cfg = Config {
            display: ":7".into(),
            renderer: vec!["python3".into(), "dashboard.py".into(), "--fast".into()],
            feed_export: Some(PathBuf::from("/tmp/feed.json")),
            ..Config::default()
        };
        let cmd = CommandSpec::renderer(&cfg);
        assert_eq!(cmd.program, "python3");
        assert_eq!(cmd.args, ["dashboard.py", "--fast"]);
        assert_eq!(cmd.env_var("DISPLAY"), Some(":7"));
        assert_eq!(cmd.env_var("STREAM_WIDTH"), Some("1280"));
        assert_eq!(cmd.env_var("STREAM_HEIGHT"), Some("720"));
        assert_eq!(cmd.env_var("STREAM_FEED_PATH"), Some("/tmp/feed.json"));
    }

    #[test]
    fn test_encoder_stream_destination_and_rate_control() {
        let cfg = Config {
            stream_key: Some("sekret-key".into()),
            fps: 25,
            bitrate: "3000k".parse().unwrap(),
            ..Config::default()
        };
        let cmd = CommandSpec::encoder(&cfg);
        assert_eq!(cmd.program, "ffmpeg");
        assert_eq!(value_after(&cmd, "-video_size"), "1280x720");
        assert_eq!(value_after(&cmd, "-framerate"), "25");
        assert_eq!(value_after(&cmd, "-b:v"), "3000k");
        assert_eq!(value_after(&cmd, "-bufsize"), "6000k");
        assert_eq!(value_after(&cmd, "-g"), "50");
        assert_eq!(value_after(&cmd, "-keyint_min"), "25");
        assert_eq!(
            cmd.args.last().map(String::as_str),
            Some("rtmp://a.rtmp.youtube.com/live2/sekret-key")
        );
    }

    #[test]
    fn test_encoder_keyframe_interval_saturates() {
        let cfg = Config {
            mode: RunMode::Preview,
            fps: 3_000_000_000,
            ..Config::default()
        };
        let cmd = CommandSpec::encoder(&cfg);
        assert_eq!(value_after(&cmd, "-g"), u32::MAX.to_string());
        assert_eq!(value_after(&cmd, "-keyint_min"), "3000000000");
    }

    #[test]
    fn test_encoder_preview_writes_local_file() {
        let cfg = Config {
            mode: RunMode::Preview,
            ..Config::default()
        };
        let cmd = CommandSpec::encoder(&cfg);
        assert_eq!(cmd.args.last().map(String::as_str), Some("preview_output.flv"));
    }

    #[test]
    fn test_display_masks_stream_key() {
        let cfg = Config {
            stream_key: Some("sekret-key".into()),
            ..Config::default()
        };
        let shown = CommandSpec::encoder(&cfg).to_string();
        assert!(!shown.contains("sekret-key"));
        assert!(shown.ends_with("live2/****"));
    }
}

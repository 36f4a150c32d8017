use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use streamvisor::{BackoffPolicy, Bitrate, JitterPolicy, Resolution};

#[derive(Parser)]
#[command(
    name = "streamvisor",
    version,
    about = "Live-stream supervisor: virtual display, dashboard renderer and ffmpeg encoder",
    long_about = "Starts Xvfb, the dashboard renderer and ffmpeg in order, restarts them when they \
                  crash and stops all of them on SIGINT/SIGTERM.\n\
                  Settings are read from flags, the environment and a .env file."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the streaming pipeline until interrupted
    Stream(StreamArgs),
    /// Run the activity pollers only and print the feed every 5 seconds
    Feed(FeedArgs),
}

#[derive(Args)]
pub struct StreamArgs {
    /// Write to a local file instead of the RTMP ingest
    #[arg(long)]
    pub preview: bool,

    /// Use an existing display instead of starting Xvfb
    #[arg(long, visible_alias = "no-xvfb")]
    pub no_display: bool,

    /// X display identifier
    #[arg(long, env = "STREAM_DISPLAY", default_value = ":99")]
    pub display: String,

    /// Capture size as WIDTHxHEIGHT
    #[arg(long, env = "RESOLUTION", default_value = "1280x720")]
    pub resolution: Resolution,

    /// Capture frame rate
    #[arg(long, env = "FPS", default_value_t = 30)]
    pub fps: u32,

    /// Video bitrate, e.g. 2500k
    #[arg(long, env = "BITRATE", default_value = "2500k")]
    pub bitrate: Bitrate,

    /// RTMP ingest base URL
    #[arg(long, env = "YOUTUBE_RTMP_URL", default_value = "rtmp://a.rtmp.youtube.com/live2")]
    pub rtmp_url: String,

    /// Stream key appended to the ingest URL
    #[arg(long, env = "YOUTUBE_STREAM_KEY", hide_env_values = true)]
    pub stream_key: Option<String>,

    /// Renderer command line, split on whitespace
    ///
    /// The value is split on runs of whitespace into the program and its
    /// arguments. Quotes and escapes are not interpreted, so arguments or paths
    /// containing spaces cannot be passed; wrap such a renderer in a script.
    #[arg(long, env = "RENDERER_CMD", default_value = "python3 dashboard.py", verbatim_doc_comment)]
    pub renderer_cmd: String,

    /// Output file in preview mode
    #[arg(long, default_value = "preview_output.flv")]
    pub preview_file: PathBuf,

    /// Where the feed snapshot for the renderer is written
    #[arg(long, env = "STREAM_FEED_PATH")]
    pub feed_export: Option<PathBuf>,

    /// Seconds between liveness checks
    #[arg(long, default_value_t = 10)]
    pub poll_interval: u64,

    /// Seconds a stage gets to exit before it is killed
    #[arg(long, default_value_t = 5)]
    pub grace: u64,

    /// Seconds to wait before restarting a crashed encoder
    #[arg(long, env = "ENCODER_COOLDOWN", default_value_t = 5)]
    pub encoder_cooldown: u64,

    /// Growth of the encoder cooldown per consecutive crash (1.0 keeps it constant)
    #[arg(long, env = "ENCODER_BACKOFF_FACTOR", default_value_t = 1.0)]
    pub encoder_backoff_factor: f64,

    /// Upper bound of the encoder cooldown in seconds
    #[arg(long, default_value_t = 60)]
    pub encoder_cooldown_max: u64,

    /// Randomization of the encoder cooldown: none, full, equal or decorrelated
    #[arg(long, default_value = "none")]
    pub encoder_jitter: JitterPolicy,

    #[command(flatten)]
    pub sources: SourceArgs,
}

impl StreamArgs {
    /// Program and arguments of the renderer.
    pub fn renderer_argv(&self) -> Vec<String> {
        self.renderer_cmd.split_whitespace().map(String::from).collect()
    }

    /// Restart cooldown of the encoder.
    pub fn encoder_backoff(&self) -> BackoffPolicy {
        let first = Duration::from_secs(self.encoder_cooldown);
        BackoffPolicy {
            first,
            max: Duration::from_secs(self.encoder_cooldown_max).max(first),
            factor: self.encoder_backoff_factor,
            jitter: self.encoder_jitter,
        }
    }
}

#[derive(Args)]
pub struct FeedArgs {
    #[command(flatten)]
    pub sources: SourceArgs,
}

#[derive(Args)]
pub struct SourceArgs {
    /// Bearer credential of the posts API; the poller is off without it
    #[arg(long, env = "MOLTBOOK_API_KEY", hide_env_values = true)]
    pub posts_api_key: Option<String>,

    /// Seconds between posts polls [default: 300 for stream, 30 for feed]
    #[arg(long)]
    pub posts_interval: Option<u64>,

    /// Seconds between heartbeat events [default: 60 for stream, 5 for feed]
    #[arg(long)]
    pub heartbeat_interval: Option<u64>,

    /// Maximum number of events kept in the feed
    #[arg(long, default_value_t = streamvisor::DEFAULT_FEED_CAPACITY)]
    pub feed_capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_flags_parse() {
        let cli = Cli::try_parse_from([
            "streamvisor",
            "-vv",
            "stream",
            "--preview",
            "--no-xvfb",
            "--resolution",
            "1920x1080",
            "--bitrate",
            "4500k",
            "--posts-interval",
            "60",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Stream(args) = cli.command else {
            panic!("expected stream command");
        };
        assert!(args.preview);
        assert!(args.no_display);
        assert_eq!(args.resolution.width, 1920);
        assert_eq!(args.bitrate.to_string(), "4500k");
        assert_eq!(args.sources.posts_interval, Some(60));
    }

    fn stream_args(extra: &[&str]) -> StreamArgs {
        let argv = ["streamvisor", "stream"].iter().chain(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Stream(args) => args,
            Command::Feed(_) => panic!("expected stream command"),
        }
    }

    #[test]
    fn test_default_encoder_cooldown_is_constant() {
        let policy = stream_args(&[]).encoder_backoff();
        for crashes in 0..5 {
            assert_eq!(policy.next(crashes), Duration::from_secs(5));
        }
    }

    #[test]
    fn test_encoder_backoff_flags() {
        let policy = stream_args(&[
            "--encoder-cooldown",
            "2",
            "--encoder-backoff-factor",
            "2",
            "--encoder-cooldown-max",
            "10",
        ])
        .encoder_backoff();
        assert_eq!(policy.next(0), Duration::from_secs(2));
        assert_eq!(policy.next(1), Duration::from_secs(4));
        assert_eq!(policy.next(5), Duration::from_secs(10));
        assert_eq!(policy.jitter, JitterPolicy::None);

        let jittered = stream_args(&["--encoder-jitter", "equal"]).encoder_backoff();
        assert_eq!(jittered.jitter, JitterPolicy::Equal);
        assert!(Cli::try_parse_from(["streamvisor", "stream", "--encoder-jitter", "wild"]).is_err());
    }

    #[test]
    fn test_cooldown_max_never_below_cooldown() {
        let policy = stream_args(&["--encoder-cooldown", "30", "--encoder-cooldown-max", "10"])
            .encoder_backoff();
        assert_eq!(policy.next(0), Duration::from_secs(30));
    }

    #[test]
    fn test_renderer_cmd_splits_on_whitespace_only() {
        let args = stream_args(&["--renderer-cmd", "  node   dash.js --port 9000 "]);
        assert_eq!(args.renderer_argv(), ["node", "dash.js", "--port", "9000"]);

        let quoted = stream_args(&["--renderer-cmd", "python3 'my dash.py'"]);
        assert_eq!(quoted.renderer_argv(), ["python3", "'my", "dash.py'"]);
    }

    #[test]
    fn test_renderer_cmd_help_states_splitting_rule() {
        use clap::CommandFactory;

        let cmd = Cli::command();
        let stream = cmd.find_subcommand("stream").unwrap();
        let arg = stream
            .get_arguments()
            .find(|a| a.get_id() == "renderer_cmd")
            .unwrap();
        let help = arg.get_long_help().unwrap().to_string();
        assert!(help.contains("Quotes and escapes are not interpreted"), "{help}");
    }

    #[test]
    fn test_invalid_resolution_is_rejected() {
        assert!(Cli::try_parse_from(["streamvisor", "stream", "--resolution", "wide"]).is_err());
    }
}

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use streamvisor::{
    Config, EventFeed, FeedExporter, FeedRecorder, HeartbeatSource, LogWriter, PostsConfig,
    PostsSource, ProcessSupervisor, RunMode, ShutdownSignals, SourceWorker, spawn_workers,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use cli::{Cli, Command, FeedArgs, SourceArgs, StreamArgs};

#[tokio::main]
async fn main() -> ExitCode {
    // a missing .env is fine
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let res = match cli.command {
        Command::Stream(args) => stream(args).await,
        Command::Feed(args) => feed(args).await,
    };

    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("streamvisor={level},warn").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Builds the pollers that feed the dashboard.
fn source_workers(
    args: &SourceArgs,
    feed: &EventFeed,
    posts_every: u64,
    heartbeat_every: u64,
) -> anyhow::Result<Vec<SourceWorker>> {
    let mut workers = vec![SourceWorker::new(
        HeartbeatSource::new(),
        feed.clone(),
        Duration::from_secs(args.heartbeat_interval.unwrap_or(heartbeat_every).max(1)),
    )];

    match args.posts_api_key.as_deref().map(str::trim) {
        Some(key) if !key.is_empty() => {
            let posts = PostsSource::new(PostsConfig::moltbook(key))
                .context("building posts client")?;
            workers.push(SourceWorker::new(
                posts,
                feed.clone(),
                Duration::from_secs(args.posts_interval.unwrap_or(posts_every).max(1)),
            ));
        }
        _ => tracing::info!("MOLTBOOK_API_KEY not set, posts poller disabled"),
    }
    Ok(workers)
}

async fn stream(args: StreamArgs) -> anyhow::Result<()> {
    let renderer = args.renderer_argv();
    let encoder_cooldown = args.encoder_backoff();
    let cfg = Config {
        display: args.display,
        resolution: args.resolution,
        fps: args.fps,
        bitrate: args.bitrate,
        rtmp_url: args.rtmp_url,
        stream_key: args.stream_key,
        renderer,
        mode: if args.preview {
            RunMode::Preview
        } else {
            RunMode::Stream
        },
        manage_display: !args.no_display,
        preview_file: args.preview_file,
        feed_export: args.feed_export,
        poll_interval: Duration::from_secs(args.poll_interval.max(1)),
        grace: Duration::from_secs(args.grace),
        encoder_cooldown,
        ..Config::default()
    };
    cfg.validate()?;

    let feed = EventFeed::new(args.sources.feed_capacity);
    let token = CancellationToken::new();
    let mut workers = spawn_workers(source_workers(&args.sources, &feed, 300, 60)?, &token);
    let exporter = cfg
        .feed_export
        .as_ref()
        .map(|path| tokio::spawn(FeedExporter::new(feed.clone(), path).run(token.child_token())));

    tracing::info!(
        mode = ?cfg.mode,
        resolution = %cfg.resolution,
        fps = cfg.fps,
        bitrate = %cfg.bitrate,
        "starting stream pipeline"
    );
    let sup = ProcessSupervisor::new(
        cfg,
        vec![Arc::new(LogWriter), Arc::new(FeedRecorder::new(feed))],
    );
    let res = sup.run_until_signal().await;

    token.cancel();
    while workers.join_next().await.is_some() {}
    if let Some(exporter) = exporter {
        if let Err(e) = exporter.await {
            tracing::warn!(error = %e, "feed exporter task failed");
        }
    }
    res?;
    tracing::info!("all processes cleaned up");
    Ok(())
}

async fn feed(args: FeedArgs) -> anyhow::Result<()> {
    let mut signals = ShutdownSignals::register().context("registering signal handlers")?;
    let feed = EventFeed::new(args.sources.feed_capacity);
    let token = CancellationToken::new();
    let mut workers = spawn_workers(source_workers(&args.sources, &feed, 30, 5)?, &token);

    let mut ticker = tokio::time::interval(Duration::from_secs(5));
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = signals.recv() => break,
            _ = ticker.tick() => {
                println!("\n--- Recent events ---");
                for ev in feed.recent(5) {
                    println!(
                        "  [{}] {}: {}",
                        ev.source(),
                        ev.timestamp().format("%H:%M:%S"),
                        ev.message()
                    );
                }
            }
        }
    }

    token.cancel();
    while workers.join_next().await.is_some() {}
    Ok(())
}

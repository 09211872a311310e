//! CLI entry point for frame-appender
//!
//! With no subcommand this performs the reference run: 50 frames into
//! `piltest_11416.nxs:/data`, one per second, printing each iteration index.
//!
//! # Usage
//!
//! Reference run (config file and `FRAME_APPENDER_*` variables still apply):
//! ```bash
//! frame-appender
//! ```
//!
//! Short run somewhere else:
//! ```bash
//! frame-appender write --path /tmp/swmr.h5 --frames 10 --delay 200ms
//! ```
//!
//! Follow a running writer from another terminal:
//! ```bash
//! frame-appender watch --path /tmp/swmr.h5 --until 10
//! ```

// Global allocator (Microsoft Rust Guidelines: M-MIMALLOC-APPS)
#[cfg(not(test))]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{anyhow, bail, Result};
use clap::{Args, Parser, Subcommand};
use frame_appender::frame::FrameBuffer;
use frame_appender::logging::{self, LoggingConfig, OutputFormat};
use frame_appender::{
    AppendConfig, ConfigOverrides, FrameAppender, RunEvent, RunSummary, SwmrReader,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Parser)]
#[command(name = "frame-appender")]
#[command(about = "Append integer frames to a chunked HDF5 dataset in SWMR mode", long_about = None)]
struct Cli {
    /// Configuration file (TOML). Defaults to ./frame-appender.toml if present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log line format (pretty, compact, json)
    #[arg(long, global = true)]
    log_format: Option<OutputFormat>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the container and append frames (the default)
    Write(WriteArgs),

    /// Follow a container as a SWMR reader, printing its shape after each refresh
    Watch(WatchArgs),

    /// Print layout of a finished container and verify every frame
    Inspect(TargetArgs),
}

#[derive(Args, Default)]
struct TargetArgs {
    /// Container path
    #[arg(long)]
    path: Option<PathBuf>,

    /// Dataset name under the root group
    #[arg(long)]
    dataset: Option<String>,
}

#[derive(Args, Default)]
struct WriteArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Number of frames to append
    #[arg(long)]
    frames: Option<usize>,

    /// Pause after each flush, e.g. "1s" or "250ms"
    #[arg(long, value_parser = humantime::parse_duration)]
    delay: Option<Duration>,
}

#[derive(Args)]
struct WatchArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Refresh interval
    #[arg(long, default_value = "100ms", value_parser = humantime::parse_duration)]
    interval: Duration,

    /// Stop once this many frames are visible
    #[arg(long)]
    until: Option<usize>,

    /// Give up after this long, including time spent waiting for the file
    #[arg(long, default_value = "120s", value_parser = humantime::parse_duration)]
    timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_args = LogArgs {
        level: cli.log_level,
        format: cli.log_format,
    };
    let command = cli
        .command
        .unwrap_or_else(|| Commands::Write(WriteArgs::default()));

    match command {
        Commands::Write(args) => {
            let overrides = ConfigOverrides {
                frame_count: args.frames,
                delay: args.delay,
                ..target_overrides(&args.target, &log_args)
            };
            let config = load_config(cli.config, overrides)?;
            run_appender(config).await
        }
        Commands::Watch(args) => {
            let config = load_config(
                cli.config,
                target_overrides(&args.target, &log_args),
            )?;
            watch(&config, &args).await
        }
        Commands::Inspect(target) => {
            let config = load_config(cli.config, target_overrides(&target, &log_args))?;
            inspect(&config)
        }
    }
}

struct LogArgs {
    level: Option<String>,
    format: Option<OutputFormat>,
}

fn target_overrides(target: &TargetArgs, log_args: &LogArgs) -> ConfigOverrides {
    ConfigOverrides {
        path: target.path.clone(),
        dataset: target.dataset.clone(),
        log_level: log_args.level.clone(),
        log_format: log_args.format,
        ..Default::default()
    }
}

fn load_config(file: Option<PathBuf>, overrides: ConfigOverrides) -> Result<AppendConfig> {
    let config = AppendConfig::load_with(file.as_deref(), overrides)?;
    logging::init(LoggingConfig::from_append_config(&config).map_err(|e| anyhow!(e))?)
        .map_err(|e| anyhow!(e))?;
    Ok(config)
}

async fn run_appender(config: AppendConfig) -> Result<()> {
    tracing::info!(
        path = %config.path.display(),
        frames = config.frame_count,
        delay = ?config.delay,
        "starting appender"
    );

    // HDF5 calls block; keep them off the runtime's worker threads.
    let summary = tokio::task::spawn_blocking(move || -> frame_appender::AppResult<RunSummary> {
        FrameAppender::create(&config)?.run_with(|event| {
            if let RunEvent::Starting(index) = event {
                println!("{index}");
            }
        })
    })
    .await??;

    tracing::info!(
        path = %summary.path.display(),
        dataset = %summary.dataset,
        shape = ?summary.final_shape,
        "appender finished"
    );
    Ok(())
}

async fn open_reader(
    config: &AppendConfig,
    interval: Duration,
    deadline: Instant,
) -> Result<SwmrReader> {
    loop {
        match SwmrReader::open(&config.path, &config.dataset) {
            Ok(reader) => return Ok(reader),
            Err(err) if Instant::now() < deadline => {
                tracing::debug!(error = %err, "container not ready, retrying");
                tokio::time::sleep(interval).await;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

async fn watch(config: &AppendConfig, args: &WatchArgs) -> Result<()> {
    let deadline = Instant::now() + args.timeout;
    let reader = open_reader(config, args.interval, deadline).await?;

    let mut ticker = tokio::time::interval(args.interval);
    let mut last_extent = 0;
    loop {
        ticker.tick().await;
        reader.refresh()?;
        let shape = reader.shape();
        println!("{:?}", shape);

        let extent = reader.extent();
        if extent < last_extent {
            bail!("extent shrank from {} to {}", last_extent, extent);
        }
        last_extent = extent;

        if args.until.is_some_and(|target| extent >= target) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            match args.until {
                Some(target) => bail!(
                    "timed out after {:?} with {} of {} frames visible",
                    args.timeout,
                    extent,
                    target
                ),
                None => return Ok(()),
            }
        }
    }
}

fn inspect(config: &AppendConfig) -> Result<()> {
    let reader = SwmrReader::open(&config.path, &config.dataset)?;
    println!("path:  {}", config.path.display());
    println!("shape: {:?}", reader.shape());
    println!("chunk: {:?}", reader.chunk_shape());
    println!("i32:   {}", reader.is_i32()?);

    let initial = FrameBuffer::new(config.frame_shape, config.initial_frame.clone())?;
    let verified = reader.verify_frames(&initial)?;
    println!("verified {} frames", verified);
    Ok(())
}

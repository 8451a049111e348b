//! CLI entry point for the uploader tool.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uploader_core::{AreaOptions, Capabilities, QueueConfig, TransferOptions, Uploader};

mod app_config;
mod cli;
mod progress;
mod summary;

use app_config::{RunSettings, load_config};
use cli::Args;
use summary::RunSummary;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so `--json` output on stdout stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    if args.files.is_empty() {
        info!("No files given. Pass one or more paths to upload.");
        info!("Example: uploader --url https://example.com/upload report.pdf");
        return Ok(ExitCode::SUCCESS);
    }

    let loaded = load_config(args.config.as_deref())?;
    if loaded.config.is_some() {
        debug!(path = ?loaded.path, "Loaded config file");
    }
    let settings = RunSettings::resolve(&args, loaded.config.as_ref())?;

    run(&args, &settings).await
}

async fn run(args: &Args, settings: &RunSettings) -> Result<ExitCode> {
    let transfer = build_transfer_options(settings)?;
    let queue_config = QueueConfig::builder()
        .max_parallel_uploads(settings.max_parallel)
        .parallel_batch_offset_ms(settings.batch_offset_ms)
        .auto_start(true)
        .auto_remove(settings.auto_remove)
        .build();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let uploader = Uploader::new(queue_config, events_tx, Capabilities::detect())?;

    let mut area_options = AreaOptions::new(transfer)
        .accept(settings.accept.clone().unwrap_or_default())
        .validate_extension(settings.validate_extension);
    if let Some(max_file_size_mb) = settings.max_file_size_mb {
        area_options = area_options.max_file_size_mb(max_file_size_mb);
    }
    let area = uploader.register_area(area_options);

    let show_bars = !args.quiet && !args.json && io::stderr().is_terminal();
    let tracker = progress::spawn_progress_ui(show_bars, events_rx);

    info!(
        files = args.files.len(),
        url = %settings.url,
        max_parallel = settings.max_parallel,
        "Uploading"
    );
    area.select_paths(&args.files).await?;

    let files = tracker.await.context("Progress task failed")?;
    uploader.queue().shutdown().await?;

    let summary = RunSummary::from_files(&files);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if !args.quiet {
        println!("{}", summary.render_text());
    }

    Ok(if summary.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn build_transfer_options(settings: &RunSettings) -> Result<TransferOptions> {
    let mut builder = TransferOptions::builder(settings.url.clone())
        .with_credentials(settings.with_credentials);
    if let Some(method) = &settings.method {
        builder = builder.method(method.clone());
    }
    for (name, value) in &settings.headers {
        builder = builder.header(name.clone(), value);
    }
    for (name, value) in &settings.params {
        builder = builder.param(name.clone(), value);
    }
    builder.build().context("Invalid transfer settings")
}

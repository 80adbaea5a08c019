//! Intake CLI: upload a selection of files through the intake pipeline.
//!
//! Storage and compression settings come from the environment (or `.env`);
//! see `IntakeConfig::from_env`.

use anyhow::Context;
use clap::{Parser, Subcommand};
use intake_cli::{init_tracing, read_selection, ProgressBoard};
use intake_core::{IntakeConfig, UploadedFile};
use intake_processing::{CompressionOptions, ImageCompressor};
use intake_storage::create_storage;
use intake_uploader::{TracingNotifier, Uploader};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "intake", about = "Compress and upload files to the configured storage")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more files as a single selection
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Override INTAKE_MAX_FILES
        #[arg(long)]
        max_files: Option<usize>,
        /// Override INTAKE_STORAGE_PREFIX
        #[arg(long)]
        prefix: Option<String>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn upload(
    paths: Vec<PathBuf>,
    max_files: Option<usize>,
    prefix: Option<String>,
) -> anyhow::Result<()> {
    let mut config = IntakeConfig::from_env().context("Failed to load configuration")?;
    if let Some(max_files) = max_files {
        config.max_files = max_files;
    }
    if let Some(prefix) = prefix {
        config.storage_prefix = prefix;
    }
    config.validate().context("Invalid configuration")?;

    let storage = create_storage(&config)
        .await
        .context("Failed to initialise storage backend")?;
    let compressor = Arc::new(ImageCompressor::new(CompressionOptions::from(&config)));

    let (files_tx, files_rx) = watch::channel(Vec::<UploadedFile>::new());
    let on_files_uploaded = move |files: Vec<UploadedFile>| {
        files_tx.send_replace(files);
    };

    let uploader = Uploader::new(
        &config,
        storage,
        compressor,
        Arc::new(TracingNotifier),
        Arc::new(on_files_uploaded),
    );

    tracing::info!(
        files = paths.len(),
        max_files = uploader.max_files(),
        backend = %config.storage_backend,
        prefix = %config.storage_prefix,
        "Uploading selection"
    );
    let selection = read_selection(&paths).await?;
    let handle = uploader.select_files(selection)?;

    let mut board = ProgressBoard::new();
    let mut entries = uploader.subscribe();
    board.render(&entries.borrow_and_update());

    let wait = handle.wait();
    tokio::pin!(wait);
    let mut watching = true;
    let report = loop {
        tokio::select! {
            report = &mut wait => break report?,
            changed = entries.changed(), if watching => {
                if changed.is_err() {
                    watching = false;
                    continue;
                }
                board.render(&entries.borrow_and_update());
            }
        }
    };
    board.render(&uploader.entries());

    let files = files_rx.borrow().clone();
    print_json(&serde_json::json!({ "files": files, "report": report }))?;

    if !report.failed.is_empty() {
        anyhow::bail!("{} of {} file(s) failed to upload", report.failed.len(), report.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Upload {
            files,
            max_files,
            prefix,
        } => upload(files, max_files, prefix).await?,
    }

    Ok(())
}

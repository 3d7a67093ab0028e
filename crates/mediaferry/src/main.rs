// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! mediaferry - watch folders and ferry media files to Telegram.
//!
//! Binary entry point: multi-verb CLI over the pipeline crates.
//! Configuration and fatal I/O errors exit non-zero; per-item delivery
//! failures are recorded in the job log and never fail the process.

mod common;
mod inputs;
mod send;
mod watch;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use mediaferry_core::{FerryError, SendKind};
use tracing::error;

/// Watch folders and ferry media files to Telegram in paced batches.
#[derive(Parser, Debug)]
#[command(name = "mediaferry", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a text message.
    SendText(send::SendTextArgs),
    /// Send images, grouped into media batches.
    SendImages(send::SendArgs),
    /// Send files as documents.
    SendDocument(send::SendArgs),
    /// Send video files.
    SendVideo(send::SendArgs),
    /// Send audio files.
    SendAudio(send::SendArgs),
    /// Send mixed media, choosing the method per file.
    SendMixed(send::SendArgs),
    /// Watch folders and send discovered media continuously.
    Watch(watch::WatchArgs),
    /// Print the version.
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

impl Cli {
    fn log_level(&self) -> &str {
        match &self.command {
            Commands::SendText(args) => &args.common.log_level,
            Commands::SendImages(args)
            | Commands::SendDocument(args)
            | Commands::SendVideo(args)
            | Commands::SendAudio(args)
            | Commands::SendMixed(args) => &args.common.log_level,
            Commands::Watch(args) => &args.common.log_level,
            Commands::Version => "warn",
        }
    }
}

async fn run(cli: Cli) -> Result<(), FerryError> {
    match cli.command {
        Commands::SendText(args) => send::run_send_text(args).await,
        Commands::SendImages(args) => send::run_send(args, send::Mode::Fixed(SendKind::Image)).await,
        Commands::SendDocument(args) => {
            send::run_send(args, send::Mode::Fixed(SendKind::Document)).await
        }
        Commands::SendVideo(args) => send::run_send(args, send::Mode::Fixed(SendKind::Video)).await,
        Commands::SendAudio(args) => send::run_send(args, send::Mode::Fixed(SendKind::Audio)).await,
        Commands::SendMixed(args) => send::run_send(args, send::Mode::Mixed).await,
        Commands::Watch(args) => watch::run_watch(args).await,
        Commands::Version => {
            println!("mediaferry {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    const CRATES: &[&str] = &[
        "mediaferry",
        "mediaferry_config",
        "mediaferry_core",
        "mediaferry_media",
        "mediaferry_queue",
        "mediaferry_runtime",
        "mediaferry_sender",
        "mediaferry_telegram",
        "mediaferry_watcher",
    ];

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let directives: Vec<String> = std::iter::once("warn".to_string())
            .chain(CRATES.iter().map(|c| format!("{c}={log_level}")))
            .collect();
        EnvFilter::new(directives.join(","))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

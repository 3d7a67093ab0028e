// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot sending verbs: enqueue the requested inputs into a job log
//! (persistent with `--queue-file`, ephemeral otherwise) and drain it
//! once. Per-item failures stay in the log; the process still exits 0.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use mediaferry_core::{FerryError, ProgressStatus, ProgressUpdate, RemoteClient, SendKind};
use mediaferry_media::ImageLimits;
use mediaferry_queue::{JobLog, MetaParams, QueueMeta};
use mediaferry_runtime::{install_signal_handler, PauseGate};
use mediaferry_sender::{drain_once, emit_completed, DrainState, ProgressFn, SenderConfig};
use tracing::{info, warn};

use crate::common::{load_archive_passwords, CommonArgs};
use crate::inputs;
pub use crate::inputs::Mode;

/// Arguments of `send-text`.
#[derive(Args, Debug)]
pub struct SendTextArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Message text.
    pub text: String,
}

/// Shared arguments of the file-sending verbs.
#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Individual files to send (repeatable).
    #[arg(long = "file")]
    pub files: Vec<PathBuf>,

    /// Directories to collect matching files from (repeatable).
    #[arg(long = "dir")]
    pub dirs: Vec<PathBuf>,

    /// Archives whose entries are sent individually (repeatable).
    #[arg(long = "archive")]
    pub archives: Vec<PathBuf>,

    /// Glob patterns to include (empty means all).
    #[arg(long)]
    pub include: Vec<String>,

    /// Glob patterns to exclude (wins over include).
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Password for encrypted archive entries (repeatable).
    #[arg(long = "archive-password")]
    pub archive_passwords: Vec<String>,

    /// File with one archive password per line.
    #[arg(long = "archive-password-file")]
    pub archive_password_file: Option<PathBuf>,

    /// Persist the job log here; resumed runs skip already-sent items.
    #[arg(long = "queue-file")]
    pub queue_file: Option<PathBuf>,

    /// Retry budget per item.
    #[arg(long = "queue-retries", default_value_t = 3)]
    pub queue_retries: u32,

    /// Delay between batches, seconds.
    #[arg(long = "batch-delay", default_value_t = 3)]
    pub batch_delay: u64,

    /// Images per media batch.
    #[arg(long = "group-size", default_value_t = 4)]
    pub group_size: usize,

    /// Longest allowed image edge before downscaling.
    #[arg(long = "max-dimension", default_value_t = 2000)]
    pub max_dimension: u32,

    /// Image byte budget before PNG re-compression.
    #[arg(long = "max-bytes", default_value_t = 5_242_880)]
    pub max_bytes: usize,

    /// Starting PNG compression level (0-9).
    #[arg(long = "png-start-level", default_value_t = 8)]
    pub png_start_level: u8,
}

/// Runs `send-text`.
pub async fn run_send_text(args: SendTextArgs) -> Result<(), FerryError> {
    let target = args.common.target("")?;
    let credentials = args.common.resolve_credentials("")?;
    let client = args.common.build_client(credentials).await?;
    client
        .send_text(&target, &args.text, args.common.retry_policy())
        .await
}

fn command_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Fixed(SendKind::Image) => "send-images",
        Mode::Fixed(SendKind::Video) => "send-video",
        Mode::Fixed(SendKind::Audio) => "send-audio",
        Mode::Fixed(SendKind::Document) => "send-document",
        Mode::Mixed => "send-mixed",
    }
}

/// A reporter that turns progress events into log lines.
pub fn log_reporter() -> ProgressFn {
    Arc::new(|update: ProgressUpdate| match update.status {
        ProgressStatus::Idle => info!("queue idle"),
        ProgressStatus::Sending => info!(
            file = %update.current_file,
            completed = update.completed,
            total = update.total,
            per_file_ms = update.per_file_ms,
            eta_ms = update.eta_ms,
            "sending"
        ),
        ProgressStatus::Completed => info!(total = update.total, "completed"),
    })
}

/// Runs one of the file-sending verbs.
pub async fn run_send(args: SendArgs, mode: Mode) -> Result<(), FerryError> {
    if args.queue_retries < 1 {
        return Err(FerryError::Config("queue-retries must be >= 1".into()));
    }
    if args.files.is_empty() && args.dirs.is_empty() && args.archives.is_empty() {
        return Err(FerryError::Config(
            "at least one --file, --dir, or --archive is required".into(),
        ));
    }

    let target = args.common.target("")?;
    let credentials = args.common.resolve_credentials("")?;
    let client = args.common.build_client(credentials).await?;
    let passwords =
        load_archive_passwords(&args.archive_passwords, args.archive_password_file.as_ref())?;

    // A persistent queue file carries a meta header so a resumed run is
    // checked against the same parameters. Without one, the run uses an
    // ephemeral log purely for dedup and ordering.
    let (queue_path, declared_meta, ephemeral) = match &args.queue_file {
        Some(path) => {
            let meta = QueueMeta::new(MetaParams {
                command: command_name(mode).to_string(),
                chat_id: target.chat_id.clone(),
                topic_id: target.topic_id,
                include: args.include.clone(),
                exclude: args.exclude.clone(),
                ..MetaParams::default()
            });
            (path.clone(), Some(meta), false)
        }
        None => {
            let path = std::env::temp_dir().join(format!(
                "mediaferry-{}.jsonl",
                uuid::Uuid::new_v4().simple()
            ));
            (path, None, true)
        }
    };
    let job_log = Arc::new(JobLog::open(&queue_path, declared_meta).await?);

    let mut enqueued = 0;
    for file in &args.files {
        match inputs::enqueue_file(&job_log, file, mode).await {
            Ok(count) => enqueued += count,
            Err(e) => warn!(path = %file.display(), error = %e, "skipping file"),
        }
    }
    for dir in &args.dirs {
        enqueued += inputs::enqueue_dir(&job_log, dir, &args.include, &args.exclude, mode).await?;
    }
    for archive in &args.archives {
        match inputs::enqueue_archive(&job_log, archive, &args.include, &args.exclude, mode).await
        {
            Ok(count) => enqueued += count,
            Err(e) => warn!(path = %archive.display(), error = %e, "skipping archive"),
        }
    }
    info!(enqueued, "items enqueued");

    let config = SenderConfig {
        target,
        group_size: args.group_size,
        send_interval: Duration::ZERO,
        batch_delay: Duration::from_secs(args.batch_delay),
        pause_every: 0,
        pause_seconds: Duration::ZERO,
        retry_limit: args.queue_retries,
        retry: args.common.retry_policy(),
        archive_passwords: passwords,
        image_limits: ImageLimits {
            max_dimension: args.max_dimension,
            max_bytes: args.max_bytes,
            png_start_level: args.png_start_level,
        },
    };

    let cancel = install_signal_handler();
    let pause = PauseGate::new();
    let reporter = log_reporter();
    let mut state = DrainState::new();
    let processed = drain_once(
        &config,
        &job_log,
        &client,
        &pause,
        &cancel,
        Some(&reporter),
        &mut state,
    )
    .await;
    emit_completed(Some(&reporter), &state, processed);

    job_log.close().await;
    if ephemeral {
        let _ = std::fs::remove_file(&queue_path);
    }
    Ok(())
}

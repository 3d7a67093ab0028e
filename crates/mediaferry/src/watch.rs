// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `watch` verb: the long-running pipeline. Discovery, dispatch,
//! and the optional notifier run under one supervisor until a signal
//! cancels the run.
//!
//! Flags override values from the optional JSON settings file, which in
//! turn overrides compiled defaults.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use mediaferry_config::{load_settings, Settings};
use mediaferry_core::{FerryError, RemoteClient};
use mediaferry_media::{ImageLimits, MediaSelectors};
use mediaferry_queue::{JobLog, MetaParams, QueueMeta};
use mediaferry_runtime::{install_signal_handler, notify, NotifyConfig, Supervisor};
use mediaferry_sender::SenderConfig;
use mediaferry_watcher::WatcherConfig;
use tracing::info;

use crate::common::{load_archive_passwords, CommonArgs};
use crate::send::log_reporter;

/// Arguments of `watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// JSON settings file providing defaults for the flags below.
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Folder to watch (repeatable).
    #[arg(long = "watch-dir")]
    pub watch_dirs: Vec<PathBuf>,

    /// Path to the JSONL job log.
    #[arg(long = "queue-file")]
    pub queue_file: Option<PathBuf>,

    /// Scan subdirectories too.
    #[arg(long)]
    pub recursive: bool,

    /// Watch matching images (sent as media batches).
    #[arg(long = "with-image")]
    pub with_image: bool,

    /// Watch matching videos.
    #[arg(long = "with-video")]
    pub with_video: bool,

    /// Watch matching audio files.
    #[arg(long = "with-audio")]
    pub with_audio: bool,

    /// Watch every media category.
    #[arg(long = "all")]
    pub with_all: bool,

    /// Glob patterns to include (empty means all).
    #[arg(long)]
    pub include: Vec<String>,

    /// Glob patterns to exclude (wins over include).
    #[arg(long)]
    pub exclude: Vec<String>,

    /// Folder scan interval, seconds.
    #[arg(long = "scan-interval")]
    pub scan_interval: Option<u64>,

    /// Queue drain interval, seconds.
    #[arg(long = "send-interval")]
    pub send_interval: Option<u64>,

    /// Seconds a file's size/mtime must hold still before enqueue.
    #[arg(long = "settle-seconds")]
    pub settle_seconds: Option<u64>,

    /// Images per media batch.
    #[arg(long = "group-size")]
    pub group_size: Option<usize>,

    /// Delay between batches, seconds.
    #[arg(long = "batch-delay")]
    pub batch_delay: Option<u64>,

    /// Pause after sending this many images (0 disables).
    #[arg(long = "pause-every")]
    pub pause_every: Option<usize>,

    /// Pacing pause duration, seconds.
    #[arg(long = "pause-seconds")]
    pub pause_seconds: Option<u64>,

    /// Retry budget per item.
    #[arg(long = "queue-retries")]
    pub queue_retries: Option<u32>,

    /// Longest allowed image edge before downscaling.
    #[arg(long = "max-dimension")]
    pub max_dimension: Option<u32>,

    /// Image byte budget before PNG re-compression.
    #[arg(long = "max-bytes")]
    pub max_bytes: Option<usize>,

    /// Starting PNG compression level (0-9).
    #[arg(long = "png-start-level")]
    pub png_start_level: Option<u8>,

    /// Send periodic status notifications to the chat.
    #[arg(long)]
    pub notify: bool,

    /// Seconds between status notifications.
    #[arg(long = "notify-interval")]
    pub notify_interval: Option<u64>,

    /// Password for encrypted archive entries (repeatable).
    #[arg(long = "archive-password")]
    pub archive_passwords: Vec<String>,

    /// File with one archive password per line.
    #[arg(long = "archive-password-file")]
    pub archive_password_file: Option<PathBuf>,
}

fn merged_settings(args: &WatchArgs) -> Result<Settings, FerryError> {
    let mut settings = load_settings(args.settings.as_deref())?;

    if !args.watch_dirs.is_empty() {
        settings.watch_dirs = args
            .watch_dirs
            .iter()
            .map(|d| d.to_string_lossy().into_owned())
            .collect();
    }
    if let Some(queue_file) = &args.queue_file {
        settings.queue_file = queue_file.to_string_lossy().into_owned();
    }
    if args.recursive {
        settings.recursive = true;
    }
    if args.with_image {
        settings.with_image = true;
    }
    if args.with_video {
        settings.with_video = true;
    }
    if args.with_audio {
        settings.with_audio = true;
    }
    if args.with_all {
        settings.with_all = true;
    }
    if !args.include.is_empty() {
        settings.include = args.include.clone();
    }
    if !args.exclude.is_empty() {
        settings.exclude = args.exclude.clone();
    }
    if let Some(value) = args.scan_interval {
        settings.scan_interval_sec = value;
    }
    if let Some(value) = args.send_interval {
        settings.send_interval_sec = value;
    }
    if let Some(value) = args.settle_seconds {
        settings.settle_seconds = value;
    }
    if let Some(value) = args.group_size {
        settings.group_size = value;
    }
    if let Some(value) = args.batch_delay {
        settings.batch_delay_sec = value;
    }
    if let Some(value) = args.pause_every {
        settings.pause_every = value;
    }
    if let Some(value) = args.pause_seconds {
        settings.pause_seconds = value;
    }
    if let Some(value) = args.max_dimension {
        settings.max_dimension = value;
    }
    if let Some(value) = args.max_bytes {
        settings.max_bytes = value;
    }
    if let Some(value) = args.png_start_level {
        settings.png_start_level = value;
    }
    if args.notify {
        settings.notify_enabled = true;
    }
    if let Some(value) = args.notify_interval {
        settings.notify_interval_sec = value;
    }
    settings
        .archive_passwords
        .extend(args.archive_passwords.iter().cloned());
    if let Some(path) = &args.archive_password_file {
        settings.archive_password_file = path.to_string_lossy().into_owned();
    }

    settings.resolve_selectors();
    Ok(settings)
}

/// Runs `watch` until SIGINT/SIGTERM.
pub async fn run_watch(args: WatchArgs) -> Result<(), FerryError> {
    let settings = merged_settings(&args)?;
    if settings.watch_dirs.is_empty() {
        return Err(FerryError::Config("watch-dir is required".into()));
    }

    let target = args.common.target(&settings.chat_id)?;
    let credentials = args.common.resolve_credentials(&settings.config_path)?;
    let client: Arc<dyn RemoteClient> = Arc::new(args.common.build_client(credentials).await?);

    let password_file = (!settings.archive_password_file.is_empty())
        .then(|| PathBuf::from(&settings.archive_password_file));
    let passwords = load_archive_passwords(&settings.archive_passwords, password_file.as_ref())?;

    let mut roots = Vec::with_capacity(settings.watch_dirs.len());
    for dir in &settings.watch_dirs {
        let abs = std::path::absolute(dir).map_err(|e| {
            FerryError::Config(format!("cannot resolve watch dir {dir}: {e}"))
        })?;
        roots.push(abs);
    }

    let meta = QueueMeta::new(MetaParams {
        command: "watch".into(),
        watch_dirs: roots
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect(),
        recursive: settings.recursive,
        chat_id: target.chat_id.clone(),
        topic_id: target.topic_id,
        with_image: settings.with_image,
        with_video: settings.with_video,
        with_audio: settings.with_audio,
        with_all: settings.with_all,
        include: settings.include.clone(),
        exclude: settings.exclude.clone(),
    });
    let job_log = Arc::new(JobLog::open(&settings.queue_file, Some(meta)).await?);

    let watcher_config = WatcherConfig {
        roots,
        recursive: settings.recursive,
        include: settings.include.clone(),
        exclude: settings.exclude.clone(),
        selectors: MediaSelectors {
            image: settings.with_image,
            video: settings.with_video,
            audio: settings.with_audio,
        },
        scan_interval: Duration::from_secs(settings.scan_interval_sec),
        settle: Duration::from_secs(settings.settle_seconds),
    };

    let sender_config = SenderConfig {
        target: target.clone(),
        group_size: settings.group_size,
        send_interval: Duration::from_secs(settings.send_interval_sec),
        batch_delay: Duration::from_secs(settings.batch_delay_sec),
        pause_every: settings.pause_every,
        pause_seconds: Duration::from_secs(settings.pause_seconds),
        retry_limit: args.queue_retries.unwrap_or(3),
        retry: args.common.retry_policy(),
        archive_passwords: passwords,
        image_limits: ImageLimits {
            max_dimension: settings.max_dimension,
            max_bytes: settings.max_bytes,
            png_start_level: settings.png_start_level,
        },
    };

    let notify_config = NotifyConfig {
        enabled: settings.notify_enabled,
        interval: Duration::from_secs(settings.notify_interval_sec),
        notify_on_idle: true,
    };

    let signal = install_signal_handler();
    let mut supervisor = Supervisor::new(job_log.clone(), &signal);

    supervisor.spawn(mediaferry_watcher::run(
        watcher_config,
        supervisor.job_log(),
        supervisor.pause_gate(),
        supervisor.cancel_token(),
    ));
    supervisor.spawn(mediaferry_sender::run(
        sender_config,
        supervisor.job_log(),
        client.clone(),
        supervisor.pause_gate(),
        supervisor.cancel_token(),
        Some(log_reporter()),
    ));
    if notify_config.enabled {
        supervisor.spawn(notify::run(
            notify_config,
            supervisor.job_log(),
            client.clone(),
            target.clone(),
            supervisor.cancel_token(),
        ));
    }

    info!(
        roots = settings.watch_dirs.len(),
        queue_file = %settings.queue_file,
        "watch started"
    );
    supervisor.cancelled().await;
    supervisor.stop().await;
    Ok(())
}

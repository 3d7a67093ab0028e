// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatcher: drains pending snapshots of the job log in enqueue
//! order, grouping consecutive images into media batches and sending
//! everything else singly.
//!
//! The dispatcher is the only writer of item status after enqueue.
//! Per-item failures mark the item and continue; the loop only ends on
//! cancellation. Pacing comes from three knobs: `batch_delay` between
//! batches, the `pause_every`/`pause_seconds` cooperative pause, and
//! `send_interval` between drains.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use mediaferry_core::{
    ChatTarget, FerryError, Item, ItemStatus, MediaFile, ProgressStatus, ProgressUpdate,
    RemoteClient, RetryPolicy, SendKind, SourceKind,
};
use mediaferry_media::{prepare, ImageLimits};
use mediaferry_queue::JobLog;
use mediaferry_runtime::{sleep_or_cancel, PauseGate};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::progress::{ProgressFn, ProgressTracker};

/// Dispatcher settings for one run.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub target: ChatTarget,
    /// Images per media batch; clamped to at least 1.
    pub group_size: usize,
    /// Sleep between drains (and while idle).
    pub send_interval: Duration,
    /// Sleep between batches inside one drain.
    pub batch_delay: Duration,
    /// Pacing pause threshold; 0 disables.
    pub pause_every: usize,
    pub pause_seconds: Duration,
    /// Items with `attempts > retry_limit` drop out of snapshots.
    pub retry_limit: u32,
    /// Intra-call retry handed to the remote client.
    pub retry: RetryPolicy,
    pub archive_passwords: Vec<String>,
    pub image_limits: ImageLimits,
}

/// Dispatch state carried across drains.
pub struct DrainState {
    sent_since_pause: usize,
    progress: ProgressTracker,
}

impl DrainState {
    pub fn new() -> Self {
        Self {
            sent_since_pause: 0,
            progress: ProgressTracker::new(),
        }
    }
}

impl Default for DrainState {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the dispatcher until the token fires.
pub async fn run(
    config: SenderConfig,
    job_log: Arc<JobLog>,
    client: Arc<dyn RemoteClient>,
    pause: Arc<PauseGate>,
    cancel: CancellationToken,
    reporter: Option<ProgressFn>,
) {
    let mut state = DrainState::new();
    loop {
        if !pause.wait(&cancel).await {
            debug!("dispatcher cancelled");
            return;
        }
        drain_once(
            &config,
            &job_log,
            client.as_ref(),
            &pause,
            &cancel,
            reporter.as_ref(),
            &mut state,
        )
        .await;
        if !sleep_or_cancel(config.send_interval, &cancel).await {
            debug!("dispatcher cancelled");
            return;
        }
    }
}

/// Drains one pending snapshot. Returns the number of items processed
/// (sent or failed); an early return on cancellation reports progress
/// so far.
pub async fn drain_once(
    config: &SenderConfig,
    job_log: &JobLog,
    client: &dyn RemoteClient,
    pause: &PauseGate,
    cancel: &CancellationToken,
    reporter: Option<&ProgressFn>,
    state: &mut DrainState,
) -> usize {
    let pending = job_log.pending(None, config.retry_limit);
    if pending.is_empty() {
        emit(
            reporter,
            &state.progress,
            ProgressStatus::Idle,
            String::new(),
            0,
            0,
            0,
        );
        return 0;
    }

    let total = pending.len();
    let group_size = config.group_size.max(1);
    let mut completed = 0;
    let mut index = 0;

    while index < pending.len() {
        if !pause.wait(cancel).await {
            return completed;
        }

        // Greedily accumulate consecutive images; anything else breaks
        // the batch and goes out on its own.
        let mut batch: Vec<&Item> = Vec::new();
        if pending[index].send_kind == SendKind::Image {
            while index < pending.len() && batch.len() < group_size {
                if pending[index].send_kind != SendKind::Image {
                    break;
                }
                batch.push(&pending[index]);
                index += 1;
            }
        } else {
            batch.push(&pending[index]);
            index += 1;
        }

        let started = Instant::now();
        let last_display = batch[batch.len() - 1].display_name();
        let sent = if batch[0].send_kind == SendKind::Image {
            send_image_batch(config, job_log, client, &batch).await
        } else {
            usize::from(send_single(config, job_log, client, batch[0]).await)
        };
        completed += batch.len();
        state.sent_since_pause += sent;

        let per_file = started.elapsed().as_millis() as i64 / batch.len() as i64;
        state.progress.update(per_file);
        emit(
            reporter,
            &state.progress,
            ProgressStatus::Sending,
            last_display,
            total - completed,
            total,
            completed,
        );

        if !sleep_or_cancel(config.batch_delay, cancel).await {
            return completed;
        }

        if config.pause_every > 0
            && state.sent_since_pause >= config.pause_every
            && !config.pause_seconds.is_zero()
        {
            info!(
                seconds = config.pause_seconds.as_secs(),
                sent = state.sent_since_pause,
                "pacing pause"
            );
            if !sleep_or_cancel(config.pause_seconds, cancel).await {
                return completed;
            }
            state.sent_since_pause = 0;
        }
    }

    completed
}

fn emit(
    reporter: Option<&ProgressFn>,
    progress: &ProgressTracker,
    status: ProgressStatus,
    current_file: String,
    remaining: usize,
    total: usize,
    completed: usize,
) {
    let Some(reporter) = reporter else { return };
    reporter(ProgressUpdate {
        status,
        current_file,
        remaining,
        total,
        completed,
        per_file_ms: progress.average(),
        eta_ms: progress.eta_ms(remaining),
    });
}

/// Emits a final `completed` event after a one-shot drain.
pub fn emit_completed(reporter: Option<&ProgressFn>, state: &DrainState, total: usize) {
    let Some(reporter) = reporter else { return };
    reporter(ProgressUpdate {
        status: ProgressStatus::Completed,
        current_file: String::new(),
        remaining: 0,
        total,
        completed: total,
        per_file_ms: state.progress.average(),
        eta_ms: 0,
    });
}

/// Sends one image batch. Items that fail to load or prepare are marked
/// failed and dropped from the batch; the remaining members share the
/// outcome of the remote call. Returns the number of items sent.
async fn send_image_batch(
    config: &SenderConfig,
    job_log: &JobLog,
    client: &dyn RemoteClient,
    batch: &[&Item],
) -> usize {
    let mut media = Vec::with_capacity(batch.len());
    let mut members = Vec::with_capacity(batch.len());

    for item in batch {
        if let Err(e) = job_log
            .update_status(&item.id, ItemStatus::Sending, None)
            .await
        {
            warn!(id = %item.id, error = %e, "cannot mark item sending");
            continue;
        }
        let (data, filename) = match load_item(item, &config.archive_passwords).await {
            Ok(loaded) => loaded,
            Err(e) => {
                mark_failed(job_log, item, &e).await;
                continue;
            }
        };
        let limits = config.image_limits;
        let prepared = tokio::task::spawn_blocking(move || prepare(&data, &filename, &limits))
            .await
            .unwrap_or_else(|e| {
                Err(FerryError::Internal(format!("image task failed: {e}")))
            });
        match prepared {
            Ok(prepared) => {
                media.push(MediaFile {
                    filename: prepared.filename,
                    data: prepared.data,
                });
                members.push(*item);
            }
            Err(e) => mark_failed(job_log, item, &e).await,
        }
    }

    if media.is_empty() {
        return 0;
    }

    match client
        .send_media_batch(&config.target, &media, config.retry)
        .await
    {
        Ok(()) => {
            for item in &members {
                let _ = job_log
                    .update_status(&item.id, ItemStatus::Sent, None)
                    .await;
            }
            members.len()
        }
        Err(e) => {
            let message = e.to_string();
            warn!(error = %message, count = members.len(), "media batch failed");
            for item in &members {
                let _ = job_log
                    .update_status_with(&item.id, ItemStatus::Failed, Some(&message), 1)
                    .await;
            }
            0
        }
    }
}

/// Sends one non-image item through its kind-specific call. Returns
/// whether the item reached `sent`.
async fn send_single(
    config: &SenderConfig,
    job_log: &JobLog,
    client: &dyn RemoteClient,
    item: &Item,
) -> bool {
    if let Err(e) = job_log
        .update_status(&item.id, ItemStatus::Sending, None)
        .await
    {
        warn!(id = %item.id, error = %e, "cannot mark item sending");
        return false;
    }
    let (data, filename) = match load_item(item, &config.archive_passwords).await {
        Ok(loaded) => loaded,
        Err(e) => {
            mark_failed(job_log, item, &e).await;
            return false;
        }
    };

    let file = MediaFile { filename, data };
    let result = match item.send_kind {
        SendKind::Video => client.send_video(&config.target, &file, config.retry).await,
        SendKind::Audio => client.send_audio(&config.target, &file, config.retry).await,
        SendKind::Image | SendKind::Document => {
            client
                .send_document(&config.target, &file, config.retry)
                .await
        }
    };

    match result {
        Ok(()) => {
            let _ = job_log
                .update_status(&item.id, ItemStatus::Sent, None)
                .await;
            true
        }
        Err(e) => {
            mark_failed(job_log, item, &e).await;
            false
        }
    }
}

async fn mark_failed(job_log: &JobLog, item: &Item, error: &FerryError) {
    let message = error.to_string();
    if let Err(e) = job_log
        .update_status_with(&item.id, ItemStatus::Failed, Some(&message), 1)
        .await
    {
        warn!(id = %item.id, error = %e, "cannot mark item failed");
    }
}

/// Loads an item's bytes: the file itself, or the archive entry through
/// the password list.
async fn load_item(item: &Item, passwords: &[String]) -> Result<(Vec<u8>, String), FerryError> {
    match item.source_kind {
        SourceKind::File => {
            let data = tokio::fs::read(&item.source_path)
                .await
                .map_err(|e| FerryError::Media {
                    message: format!("cannot read {}", item.source_path),
                    source: Some(Box::new(e)),
                })?;
            Ok((data, basename(&item.source_path)))
        }
        SourceKind::Archive => {
            let inner = item.inner_path.clone().ok_or_else(|| FerryError::Archive {
                message: format!("{}: archive item without inner path", item.source_path),
                source: None,
            })?;
            let data = mediaferry_media::read_entry(
                item.source_path.clone().into(),
                inner.clone(),
                passwords.to_vec(),
            )
            .await?;
            Ok((data, basename(&inner)))
        }
    }
}

fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The discovery loop: walk the configured roots, classify by extension,
//! enforce the stability window, and enqueue items into the job log.
//!
//! Per-file errors never stop a scan; the loop only terminates on
//! cancellation. Duplicate enqueues are silent no-ops, which is what
//! makes dispatch at-most-once across restarts.

use std::collections::HashSet;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, UNIX_EPOCH};

use mediaferry_core::{build_fingerprint, build_source_fingerprint, Item, SourceKind};
use mediaferry_media::{categories, MediaSelectors};
use mediaferry_queue::JobLog;
use mediaferry_runtime::{sleep_or_cancel, PauseGate};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::filter::{matches_exclude, matches_include};
use crate::tracker::StabilityTracker;

/// Discovery settings for one run.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub roots: Vec<PathBuf>,
    pub recursive: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub selectors: MediaSelectors,
    pub scan_interval: Duration,
    pub settle: Duration,
}

/// Mutable state carried across scan iterations.
pub struct ScanState {
    tracker: StabilityTracker,
    /// Source fingerprints of archives already expanded, so a container
    /// with zero matching entries is not re-opened every scan.
    expanded: HashSet<String>,
}

impl ScanState {
    pub fn new(settle: Duration) -> Self {
        Self {
            tracker: StabilityTracker::new(settle),
            expanded: HashSet::new(),
        }
    }

    /// Whether an archive container has already been expanded.
    pub fn remembers_archive(&self, source_fingerprint: &str) -> bool {
        self.expanded.contains(source_fingerprint)
    }
}

/// Runs discovery until the token fires.
pub async fn run(
    config: WatcherConfig,
    job_log: Arc<JobLog>,
    pause: Arc<PauseGate>,
    cancel: CancellationToken,
) {
    let mut state = ScanState::new(config.settle);
    loop {
        if !pause.wait(&cancel).await {
            debug!("discovery cancelled");
            return;
        }
        let enqueued = scan_once(&config, &job_log, &mut state).await;
        if enqueued > 0 {
            info!(count = enqueued, "enqueued discovered files");
        }
        if !sleep_or_cancel(config.scan_interval, &cancel).await {
            debug!("discovery cancelled");
            return;
        }
    }
}

/// One scan pass over every root. Returns the number of items enqueued.
pub async fn scan_once(
    config: &WatcherConfig,
    job_log: &JobLog,
    state: &mut ScanState,
) -> usize {
    let now = Instant::now();
    let mut enqueued = 0;
    let mut seen: HashSet<PathBuf> = HashSet::new();

    for root in &config.roots {
        for (path, rel, size, mtime_ns) in collect_files(root, config.recursive, &config.exclude) {
            seen.insert(path.clone());

            if !matches_include(&rel, &config.include) || matches_exclude(&rel, &config.exclude) {
                continue;
            }

            let name = path.to_string_lossy();
            if categories::is_archive(&name) {
                enqueued += handle_archive(config, job_log, state, &path, size, mtime_ns, now).await;
                continue;
            }

            let Some(send_kind) = config.selectors.classify(&name) else {
                continue;
            };
            let path_str = path.to_string_lossy().into_owned();
            let fingerprint =
                build_fingerprint(SourceKind::File, &path_str, None, size, Some(mtime_ns), None);
            if job_log.has_fingerprint(&fingerprint) {
                continue;
            }
            if !state.tracker.observe(&path, size, mtime_ns, now) {
                continue;
            }

            match job_log.enqueue(Item::file(&path_str, size, mtime_ns, send_kind)).await {
                Ok(true) => enqueued += 1,
                Ok(false) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "enqueue failed"),
            }
        }
    }

    state.tracker.prune(&seen);
    enqueued
}

async fn handle_archive(
    config: &WatcherConfig,
    job_log: &JobLog,
    state: &mut ScanState,
    path: &Path,
    size: u64,
    mtime_ns: i64,
    now: Instant,
) -> usize {
    let path_str = path.to_string_lossy().into_owned();
    let source_fingerprint = build_source_fingerprint(&path_str, size, Some(mtime_ns));

    if state.remembers_archive(&source_fingerprint)
        || job_log.has_source_fingerprint(SourceKind::Archive, &source_fingerprint)
    {
        return 0;
    }
    if !state.tracker.observe(path, size, mtime_ns, now) {
        return 0;
    }

    let entries = match mediaferry_media::list_entries(path.to_path_buf()).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable archive");
            return 0;
        }
    };

    let mut enqueued = 0;
    for entry in entries {
        if !matches_include(&entry.name, &config.include)
            || matches_exclude(&entry.name, &config.exclude)
        {
            continue;
        }
        let Some(send_kind) = config.selectors.classify(&entry.name) else {
            continue;
        };
        let item = Item::archive_entry(
            &path_str,
            &source_fingerprint,
            &entry.name,
            entry.size,
            entry.crc,
            send_kind,
        );
        match job_log.enqueue(item).await {
            Ok(true) => enqueued += 1,
            Ok(false) => {}
            Err(e) => {
                warn!(path = %path.display(), entry = %entry.name, error = %e, "enqueue failed")
            }
        }
    }

    // Remembered even with zero matching entries.
    state.expanded.insert(source_fingerprint);
    enqueued
}

fn mtime_nanos(metadata: &Metadata) -> Option<i64> {
    let modified = metadata.modified().ok()?;
    let nanos = modified.duration_since(UNIX_EPOCH).ok()?.as_nanos();
    i64::try_from(nanos).ok()
}

/// Collects regular files under `root` with their relative paths and
/// stat tuples. Excluded directories are pruned from recursive walks;
/// per-entry errors are skipped.
fn collect_files(
    root: &Path,
    recursive: bool,
    exclude: &[String],
) -> Vec<(PathBuf, String, u64, i64)> {
    let mut files = Vec::new();

    if recursive {
        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            if entry.depth() == 0 {
                return true;
            }
            let rel = entry
                .path()
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            !(entry.file_type().is_dir() && matches_exclude(&rel, exclude))
        });
        for entry in walker {
            let Ok(entry) = entry else { continue };
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(root) else {
                continue;
            };
            let rel = rel.to_string_lossy().into_owned();
            let Ok(metadata) = entry.metadata() else { continue };
            let Some(mtime_ns) = mtime_nanos(&metadata) else {
                continue;
            };
            files.push((entry.into_path(), rel, metadata.len(), mtime_ns));
        }
    } else {
        let Ok(entries) = std::fs::read_dir(root) else {
            return files;
        };
        for entry in entries.flatten() {
            let Ok(metadata) = entry.metadata() else { continue };
            if !metadata.is_file() {
                continue;
            }
            let rel = entry.file_name().to_string_lossy().into_owned();
            let Some(mtime_ns) = mtime_nanos(&metadata) else {
                continue;
            };
            files.push((entry.path(), rel, metadata.len(), mtime_ns));
        }
        // Directory listing order is filesystem-dependent; keep scans
        // deterministic so enqueue order follows name order.
        files.sort_by(|a, b| a.0.cmp(&b.0));
    }

    files
}

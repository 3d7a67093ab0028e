// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input collection for the sending verbs: explicit files, directory
//! walks, and archive expansion, classified per verb.

use std::path::{Path, PathBuf};

use mediaferry_core::{build_source_fingerprint, FerryError, Item, SendKind};
use mediaferry_media::{categories, matches_ext, MediaSelectors};
use mediaferry_queue::JobLog;
use mediaferry_watcher::{matches_exclude, matches_include};
use tracing::warn;
use walkdir::WalkDir;

/// How a verb assigns send kinds.
#[derive(Debug, Clone, Copy)]
pub enum Mode {
    /// Every item gets this kind; names outside the kind's extension
    /// table are skipped (documents have no table and accept all).
    Fixed(SendKind),
    /// Classify per name: image/video/audio by extension, document
    /// otherwise.
    Mixed,
}

impl Mode {
    fn kind_for(&self, name: &str) -> Option<SendKind> {
        match self {
            Mode::Fixed(kind) => match categories::extensions_for(*kind) {
                Some(extensions) => matches_ext(name, extensions).then_some(*kind),
                None => Some(*kind),
            },
            Mode::Mixed => {
                let all = MediaSelectors {
                    image: true,
                    video: true,
                    audio: true,
                };
                Some(all.classify(name).unwrap_or(SendKind::Document))
            }
        }
    }
}

fn stat_tuple(path: &Path) -> Result<(u64, i64), FerryError> {
    let metadata = std::fs::metadata(path).map_err(|e| {
        FerryError::Config(format!("cannot stat {}: {e}", path.display()))
    })?;
    let mtime_ns = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .and_then(|d| i64::try_from(d.as_nanos()).ok())
        .ok_or_else(|| {
            FerryError::Config(format!("cannot read mtime of {}", path.display()))
        })?;
    Ok((metadata.len(), mtime_ns))
}

/// Enqueues one explicitly-named file. Unknown extensions are skipped
/// for fixed non-document kinds.
pub async fn enqueue_file(
    job_log: &JobLog,
    path: &Path,
    mode: Mode,
) -> Result<usize, FerryError> {
    let name = path.to_string_lossy();
    let Some(kind) = mode.kind_for(&name) else {
        warn!(path = %path.display(), "skipping file outside the verb's categories");
        return Ok(0);
    };
    let (size, mtime_ns) = stat_tuple(path)?;
    let added = job_log
        .enqueue(Item::file(&name, size, mtime_ns, kind))
        .await?;
    Ok(usize::from(added))
}

/// Walks a directory and enqueues every matching file. Archives found
/// during the walk are not expanded; pass them with `--archive`.
pub async fn enqueue_dir(
    job_log: &JobLog,
    dir: &Path,
    include: &[String],
    exclude: &[String],
    mode: Mode,
) -> Result<usize, FerryError> {
    let mut paths = Vec::new();
    for entry in WalkDir::new(dir) {
        let Ok(entry) = entry else { continue };
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dir) else {
            continue;
        };
        let rel = rel.to_string_lossy().replace('\\', "/");
        if !matches_include(&rel, include) || matches_exclude(&rel, exclude) {
            continue;
        }
        paths.push(entry.into_path());
    }
    paths.sort();

    let mut enqueued = 0;
    for path in paths {
        match enqueue_file(job_log, &path, mode).await {
            Ok(count) => enqueued += count,
            Err(e) => warn!(path = %path.display(), error = %e, "skipping file"),
        }
    }
    Ok(enqueued)
}

/// Expands an archive into one item per matching entry.
pub async fn enqueue_archive(
    job_log: &JobLog,
    path: &Path,
    include: &[String],
    exclude: &[String],
    mode: Mode,
) -> Result<usize, FerryError> {
    let (size, mtime_ns) = stat_tuple(path)?;
    let path_str = path.to_string_lossy().into_owned();
    let source_fingerprint = build_source_fingerprint(&path_str, size, Some(mtime_ns));

    let entries = mediaferry_media::list_entries(path.to_path_buf()).await?;
    let mut enqueued = 0;
    for entry in entries {
        if !matches_include(&entry.name, include) || matches_exclude(&entry.name, exclude) {
            continue;
        }
        let Some(kind) = mode.kind_for(&entry.name) else {
            continue;
        };
        let item = Item::archive_entry(
            &path_str,
            &source_fingerprint,
            &entry.name,
            entry.size,
            entry.crc,
            kind,
        );
        if job_log.enqueue(item).await? {
            enqueued += 1;
        }
    }
    Ok(enqueued)
}

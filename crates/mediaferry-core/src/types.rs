// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The item data model and common value types shared across the workspace.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Separator joining fingerprint components. Never appears inside a
/// component that participates in dedup decisions (sizes, timestamps, CRCs).
const FINGERPRINT_SEP: &str = "|";

/// Where an item's bytes come from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SourceKind {
    /// A plain filesystem file.
    File,
    /// One entry inside a compressed archive.
    Archive,
}

/// Which remote call delivers an item.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SendKind {
    /// Sent in media-group batches. Records written before the kind field
    /// existed replay as images, hence the default.
    #[default]
    Image,
    Video,
    Audio,
    Document,
}

/// Delivery state of an item. Transitions only move forward:
/// `queued -> sending -> sent`, or `queued -> sending -> failed -> sending -> ...`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemStatus {
    #[default]
    Queued,
    Sending,
    Sent,
    Failed,
}

impl ItemStatus {
    /// Whether an item in this status is eligible for dispatch.
    pub fn is_pending(self) -> bool {
        matches!(self, ItemStatus::Queued | ItemStatus::Failed)
    }
}

/// One logical artifact to deliver: a file, or an entry inside an archive.
///
/// Persisted as one JSON object per job-log line. Unknown fields are
/// ignored on replay so newer logs stay readable by older builds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Opaque unique identifier, assigned at enqueue. Never changes.
    #[serde(default)]
    pub id: String,
    pub source_kind: SourceKind,
    /// Absolute path of the filesystem object (the archive itself for
    /// archive entries).
    pub source_path: String,
    /// Identifies the container regardless of the entries inside it.
    pub source_fingerprint: String,
    /// Entry name inside the archive. Present iff `source_kind` is archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_path: Option<String>,
    /// Byte length of the logical content.
    pub size: u64,
    /// Modification timestamp in nanoseconds, present for plain files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime_ns: Option<i64>,
    /// CRC-32 of the archive entry, present for archive entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crc: Option<u32>,
    #[serde(default)]
    pub send_kind: SendKind,
    /// Canonical dedup key; unique across all items in one job log.
    pub fingerprint: String,
    #[serde(default)]
    pub status: ItemStatus,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// RFC-3339 nanosecond UTC timestamps.
    #[serde(default)]
    pub enqueued_at: String,
    #[serde(default)]
    pub updated_at: String,
}

impl Item {
    /// Builds a draft item for a plain file. The job log assigns `id`,
    /// `status`, and timestamps at enqueue.
    pub fn file(path: &str, size: u64, mtime_ns: i64, send_kind: SendKind) -> Self {
        Item {
            id: String::new(),
            source_kind: SourceKind::File,
            source_path: path.to_string(),
            source_fingerprint: build_source_fingerprint(path, size, Some(mtime_ns)),
            inner_path: None,
            size,
            mtime_ns: Some(mtime_ns),
            crc: None,
            send_kind,
            fingerprint: build_fingerprint(
                SourceKind::File,
                path,
                None,
                size,
                Some(mtime_ns),
                None,
            ),
            status: ItemStatus::Queued,
            attempts: 0,
            last_error: None,
            enqueued_at: String::new(),
            updated_at: String::new(),
        }
    }

    /// Builds a draft item for one archive entry. `source_fingerprint` is
    /// computed once per archive by the caller and shared by its entries.
    pub fn archive_entry(
        archive_path: &str,
        source_fingerprint: &str,
        inner_path: &str,
        size: u64,
        crc: u32,
        send_kind: SendKind,
    ) -> Self {
        Item {
            id: String::new(),
            source_kind: SourceKind::Archive,
            source_path: archive_path.to_string(),
            source_fingerprint: source_fingerprint.to_string(),
            inner_path: Some(inner_path.to_string()),
            size,
            mtime_ns: None,
            crc: Some(crc),
            send_kind,
            fingerprint: build_fingerprint(
                SourceKind::Archive,
                archive_path,
                Some(inner_path),
                size,
                None,
                Some(crc),
            ),
            status: ItemStatus::Queued,
            attempts: 0,
            last_error: None,
            enqueued_at: String::new(),
            updated_at: String::new(),
        }
    }

    /// Human-readable name shown in progress events: the basename for
    /// files, `archive.zip:inner/path` for archive entries.
    pub fn display_name(&self) -> String {
        let base = Path::new(&self.source_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.source_path.clone());
        match &self.inner_path {
            Some(inner) => format!("{base}:{inner}"),
            None => base,
        }
    }
}

/// Canonical string identifying an artifact for deduplication.
///
/// Joins `{kind, path, size, inner_path?, mtime_ns?, crc?}` with a fixed
/// separator; stable across re-runs for the same bytes at the same path.
pub fn build_fingerprint(
    kind: SourceKind,
    path: &str,
    inner_path: Option<&str>,
    size: u64,
    mtime_ns: Option<i64>,
    crc: Option<u32>,
) -> String {
    let mut parts = vec![kind.to_string(), path.to_string(), size.to_string()];
    if let Some(inner) = inner_path {
        if !inner.is_empty() {
            parts.push(inner.to_string());
        }
    }
    if let Some(mtime) = mtime_ns {
        parts.push(mtime.to_string());
    }
    if let Some(crc) = crc {
        parts.push(crc.to_string());
    }
    parts.join(FINGERPRINT_SEP)
}

/// Canonical string identifying a container (file or archive) regardless
/// of the entries inside it.
pub fn build_source_fingerprint(path: &str, size: u64, mtime_ns: Option<i64>) -> String {
    let mut parts = vec![path.to_string(), size.to_string()];
    if let Some(mtime) = mtime_ns {
        parts.push(mtime.to_string());
    }
    parts.join(FINGERPRINT_SEP)
}

/// A file payload handed to the remote client.
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub filename: String,
    pub data: Vec<u8>,
}

/// The destination chat and optional topic thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTarget {
    pub chat_id: String,
    pub topic_id: Option<i64>,
}

impl ChatTarget {
    pub fn new(chat_id: impl Into<String>, topic_id: Option<i64>) -> Self {
        Self {
            chat_id: chat_id.into(),
            topic_id,
        }
    }
}

/// Intra-call retry budget for one remote operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per call (not retries after the first).
    pub max_retries: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(3),
        }
    }
}

/// Dispatcher state carried by progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProgressStatus {
    Idle,
    Sending,
    Completed,
}

/// A progress event emitted after each batch (and once when idle).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub status: ProgressStatus,
    pub current_file: String,
    pub remaining: usize,
    pub total: usize,
    pub completed: usize,
    /// Exponential moving average of per-file latency, milliseconds.
    pub per_file_ms: i64,
    /// `remaining * per_file_ms`.
    pub eta_ms: i64,
}

/// Per-status item counts reported by the job log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub queued: usize,
    pub sending: usize,
    pub sent: usize,
    pub failed: usize,
}

impl QueueStats {
    /// Items still eligible for dispatch (before the retry cap is applied).
    pub fn pending(&self) -> usize {
        self.queued + self.failed
    }
}

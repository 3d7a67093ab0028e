// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The durable job log: an append-only JSONL file plus in-memory indices.
//!
//! All mutations go through one mutex over the indices. Persistence is
//! handled by a background writer task that receives value copies of
//! updated items over a bounded channel and flushes them in batches; a
//! full channel blocks producers, which is the pipeline's primary
//! backpressure lever. The file is never rewritten: updates append a new
//! record for the same id and replay keeps the latest occurrence.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use mediaferry_core::{FerryError, Item, ItemStatus, QueueStats, SourceKind};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::meta::QueueMeta;

/// Capacity of the writer channel; producers block when it fills.
const WRITER_CHANNEL_CAPACITY: usize = 4096;
/// Flush as soon as this many records accumulate.
const FLUSH_BATCH_SIZE: usize = 128;
/// Flush whatever accumulated at least this often.
const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

enum WriterMsg {
    Record(Item),
    Shutdown,
}

#[derive(Default)]
struct LogIndex {
    items: HashMap<String, Item>,
    by_fingerprint: HashMap<String, String>,
    by_source: HashSet<String>,
}

impl LogIndex {
    fn rebuild(&mut self) {
        self.by_fingerprint.clear();
        self.by_source.clear();
        for (id, item) in &self.items {
            self.by_fingerprint
                .insert(item.fingerprint.clone(), id.clone());
            self.by_source
                .insert(source_key(item.source_kind, &item.source_fingerprint));
        }
    }
}

fn source_key(kind: SourceKind, source_fingerprint: &str) -> String {
    format!("{kind}:{source_fingerprint}")
}

fn now_utc() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Durable append-only store of work items with O(1) dedup lookups.
pub struct JobLog {
    index: Mutex<LogIndex>,
    writer_tx: mpsc::Sender<WriterMsg>,
    writer: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    path: PathBuf,
}

impl JobLog {
    /// Opens (or creates) a job log at `path`.
    ///
    /// The first non-empty record is parsed as the meta header. When
    /// `declared_meta` is provided, a stored header that differs after
    /// normalization fails with [`FerryError::MetaMismatch`]; a log with
    /// no parseable header is rewritten to carry the declared one (the
    /// file is empty in that case). Malformed item records are skipped
    /// and logged; records repeating an id replay as updates.
    pub async fn open(
        path: impl AsRef<Path>,
        declared_meta: Option<QueueMeta>,
    ) -> Result<Self, FerryError> {
        let path = path.as_ref().to_path_buf();
        let declared = declared_meta.map(|m| m.normalized());

        let mut index = LogIndex::default();
        let mut meta_found = false;

        if path.exists() {
            let file = File::open(&path).await.map_err(|e| FerryError::Queue {
                message: format!("cannot open job log {}", path.display()),
                source: Some(Box::new(e)),
            })?;
            let mut lines = BufReader::new(file).lines();
            let mut meta_checked = false;

            while let Some(line) = lines.next_line().await.map_err(|e| FerryError::Queue {
                message: format!("cannot read job log {}", path.display()),
                source: Some(Box::new(e)),
            })? {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if !meta_checked {
                    meta_checked = true;
                    match serde_json::from_str::<QueueMeta>(line) {
                        Ok(stored) if stored.is_meta_record() => {
                            meta_found = true;
                            if let Some(declared) = &declared {
                                if !declared.matches(&stored) {
                                    return Err(FerryError::MetaMismatch);
                                }
                            }
                            continue;
                        }
                        Ok(_) if declared.is_some() => {
                            return Err(FerryError::Config(format!(
                                "job log {} has no meta header; use a different --queue-file",
                                path.display()
                            )));
                        }
                        Err(_) if declared.is_some() => {
                            return Err(FerryError::Config(format!(
                                "job log {} meta header is missing or invalid; \
                                 use a different --queue-file",
                                path.display()
                            )));
                        }
                        // Headerless log opened without declared meta: the
                        // first line is an ordinary record.
                        _ => {}
                    }
                }

                match serde_json::from_str::<Item>(line) {
                    Ok(item) if !item.id.is_empty() => {
                        index.items.insert(item.id.clone(), item);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "skipping malformed job log record");
                    }
                }
            }
            index.rebuild();
        }

        if let Some(declared) = &declared {
            if !meta_found {
                write_meta(&path, declared).await?;
            }
        }

        let (writer_tx, writer_rx) = mpsc::channel(WRITER_CHANNEL_CAPACITY);
        let writer = tokio::spawn(writer_loop(path.clone(), writer_rx));

        debug!(
            path = %path.display(),
            items = index.items.len(),
            "job log opened"
        );

        Ok(Self {
            index: Mutex::new(index),
            writer_tx,
            writer: tokio::sync::Mutex::new(Some(writer)),
            path,
        })
    }

    /// The file this log persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Adds an item unless its fingerprint is already indexed.
    ///
    /// Returns `Ok(false)` for duplicates without touching the log.
    /// Assigns a fresh id, stamps timestamps and `queued` status, and
    /// hands a value copy to the writer. The channel send happens outside
    /// the index lock; a full channel blocks here.
    pub async fn enqueue(&self, mut item: Item) -> Result<bool, FerryError> {
        if item.fingerprint.is_empty() {
            return Err(FerryError::Queue {
                message: "enqueue requires a fingerprint".into(),
                source: None,
            });
        }

        let record = {
            let mut index = self.index.lock().expect("job log index poisoned");
            if index.by_fingerprint.contains_key(&item.fingerprint) {
                return Ok(false);
            }

            let now = now_utc();
            item.id = new_id();
            item.status = ItemStatus::Queued;
            item.attempts = 0;
            item.enqueued_at = now.clone();
            item.updated_at = now;

            index
                .by_fingerprint
                .insert(item.fingerprint.clone(), item.id.clone());
            index
                .by_source
                .insert(source_key(item.source_kind, &item.source_fingerprint));
            index.items.insert(item.id.clone(), item.clone());
            item
        };

        self.send_record(record).await?;
        Ok(true)
    }

    /// O(1) lookup of an artifact fingerprint.
    pub fn has_fingerprint(&self, fingerprint: &str) -> bool {
        self.index
            .lock()
            .expect("job log index poisoned")
            .by_fingerprint
            .contains_key(fingerprint)
    }

    /// O(1) lookup of a container fingerprint.
    pub fn has_source_fingerprint(&self, kind: SourceKind, source_fingerprint: &str) -> bool {
        self.index
            .lock()
            .expect("job log index poisoned")
            .by_source
            .contains(&source_key(kind, source_fingerprint))
    }

    /// Updates an item's status and error without touching `attempts`.
    pub async fn update_status(
        &self,
        id: &str,
        status: ItemStatus,
        last_error: Option<&str>,
    ) -> Result<(), FerryError> {
        self.update_status_with(id, status, last_error, 0).await
    }

    /// Updates an item's status, error, and attempt count.
    ///
    /// `attempts_delta` is added to the current count, keeping it
    /// monotonically non-decreasing. Unknown ids are an error.
    pub async fn update_status_with(
        &self,
        id: &str,
        status: ItemStatus,
        last_error: Option<&str>,
        attempts_delta: u32,
    ) -> Result<(), FerryError> {
        let record = {
            let mut index = self.index.lock().expect("job log index poisoned");
            let item = index
                .items
                .get_mut(id)
                .ok_or_else(|| FerryError::ItemNotFound { id: id.to_string() })?;
            item.status = status;
            item.updated_at = now_utc();
            item.last_error = last_error.map(|e| e.to_string());
            item.attempts += attempts_delta;
            item.clone()
        };

        self.send_record(record).await
    }

    /// Snapshot of dispatchable items: `status` in `{queued, failed}` and
    /// `attempts <= max_attempts`, sorted ascending by enqueue time,
    /// truncated to `limit` when given.
    pub fn pending(&self, limit: Option<usize>, max_attempts: u32) -> Vec<Item> {
        let index = self.index.lock().expect("job log index poisoned");
        let mut pending: Vec<Item> = index
            .items
            .values()
            .filter(|item| item.status.is_pending() && item.attempts <= max_attempts)
            .cloned()
            .collect();
        drop(index);

        pending.sort_by(|a, b| {
            a.enqueued_at
                .cmp(&b.enqueued_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        if let Some(limit) = limit {
            pending.truncate(limit);
        }
        pending
    }

    /// Item counts per status.
    pub fn stats(&self) -> QueueStats {
        let index = self.index.lock().expect("job log index poisoned");
        let mut stats = QueueStats::default();
        for item in index.items.values() {
            match item.status {
                ItemStatus::Queued => stats.queued += 1,
                ItemStatus::Sending => stats.sending += 1,
                ItemStatus::Sent => stats.sent += 1,
                ItemStatus::Failed => stats.failed += 1,
            }
        }
        stats
    }

    /// Signals the writer to flush outstanding records and stop, then
    /// waits for it. Idempotent.
    pub async fn close(&self) {
        let _ = self.writer_tx.send(WriterMsg::Shutdown).await;
        let handle = self.writer.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(error = %e, "job log writer task panicked");
            }
        }
    }

    async fn send_record(&self, record: Item) -> Result<(), FerryError> {
        self.writer_tx
            .send(WriterMsg::Record(record))
            .await
            .map_err(|_| FerryError::Queue {
                message: "job log is closed".into(),
                source: None,
            })
    }
}

async fn write_meta(path: &Path, meta: &QueueMeta) -> Result<(), FerryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FerryError::Queue {
                    message: format!("cannot create job log directory {}", parent.display()),
                    source: Some(Box::new(e)),
                })?;
        }
    }
    let mut line = serde_json::to_vec(meta).map_err(|e| FerryError::Queue {
        message: "cannot serialize job log meta".into(),
        source: Some(Box::new(e)),
    })?;
    line.push(b'\n');
    tokio::fs::write(path, line)
        .await
        .map_err(|e| FerryError::Queue {
            message: format!("cannot write job log meta to {}", path.display()),
            source: Some(Box::new(e)),
        })
}

/// The single writer task. Owns the file handle; never contends with
/// readers. Individual write failures are logged and skipped — replay
/// sees the most recent record that did persist.
async fn writer_loop(path: PathBuf, mut rx: mpsc::Receiver<WriterMsg>) {
    let file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            error!(path = %path.display(), error = %e, "cannot open job log for append");
            // Keep draining so producers are never wedged on a dead log.
            while let Some(msg) = rx.recv().await {
                if matches!(msg, WriterMsg::Shutdown) {
                    break;
                }
            }
            return;
        }
    };
    let mut writer = BufWriter::new(file);
    let mut ticker = tokio::time::interval(FLUSH_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut batch: Vec<Item> = Vec::new();

    loop {
        tokio::select! {
            msg = rx.recv() => match msg {
                Some(WriterMsg::Record(item)) => {
                    batch.push(item);
                    if batch.len() >= FLUSH_BATCH_SIZE {
                        flush_batch(&mut writer, &mut batch).await;
                    }
                }
                Some(WriterMsg::Shutdown) | None => {
                    flush_batch(&mut writer, &mut batch).await;
                    break;
                }
            },
            _ = ticker.tick() => {
                flush_batch(&mut writer, &mut batch).await;
            }
        }
    }
}

async fn flush_batch(writer: &mut BufWriter<File>, batch: &mut Vec<Item>) {
    if batch.is_empty() {
        return;
    }
    for item in batch.drain(..) {
        let mut line = match serde_json::to_vec(&item) {
            Ok(line) => line,
            Err(e) => {
                error!(id = %item.id, error = %e, "cannot serialize job log record");
                continue;
            }
        };
        line.push(b'\n');
        if let Err(e) = writer.write_all(&line).await {
            error!(id = %item.id, error = %e, "job log write failed");
        }
    }
    if let Err(e) = writer.flush().await {
        error!(error = %e, "job log flush failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaParams;
    use mediaferry_core::SendKind;
    use tempfile::tempdir;

    fn watch_meta(dirs: &[&str]) -> QueueMeta {
        QueueMeta::new(MetaParams {
            command: "watch".into(),
            watch_dirs: dirs.iter().map(|d| d.to_string()).collect(),
            chat_id: "@chat".into(),
            with_image: true,
            ..MetaParams::default()
        })
    }

    fn image_item(path: &str) -> Item {
        Item::file(path, 100, 5, SendKind::Image)
    }

    #[tokio::test]
    async fn enqueue_assigns_id_and_indexes_fingerprints() {
        let dir = tempdir().unwrap();
        let log = JobLog::open(dir.path().join("q.jsonl"), None).await.unwrap();

        let item = image_item("/w/a.jpg");
        let fingerprint = item.fingerprint.clone();
        let source_fp = item.source_fingerprint.clone();

        assert!(log.enqueue(item).await.unwrap());
        assert!(log.has_fingerprint(&fingerprint));
        assert!(log.has_source_fingerprint(SourceKind::File, &source_fp));
        assert!(!log.has_source_fingerprint(SourceKind::Archive, &source_fp));

        let pending = log.pending(None, 3);
        assert_eq!(pending.len(), 1);
        assert!(!pending[0].id.is_empty());
        assert_eq!(pending[0].status, ItemStatus::Queued);

        log.close().await;
    }

    #[tokio::test]
    async fn duplicate_enqueue_is_silently_ignored() {
        let dir = tempdir().unwrap();
        let log = JobLog::open(dir.path().join("q.jsonl"), None).await.unwrap();

        assert!(log.enqueue(image_item("/w/a.jpg")).await.unwrap());
        assert!(!log.enqueue(image_item("/w/a.jpg")).await.unwrap());

        assert_eq!(log.pending(None, 3).len(), 1);
        assert_eq!(log.stats().queued, 1);
        log.close().await;
    }

    #[tokio::test]
    async fn enqueue_without_fingerprint_errors() {
        let dir = tempdir().unwrap();
        let log = JobLog::open(dir.path().join("q.jsonl"), None).await.unwrap();

        let mut item = image_item("/w/a.jpg");
        item.fingerprint = String::new();
        assert!(log.enqueue(item).await.is_err());
        log.close().await;
    }

    #[tokio::test]
    async fn reopen_replays_the_same_item_set() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.jsonl");
        let meta = watch_meta(&["/w"]);

        let log = JobLog::open(&path, Some(meta.clone())).await.unwrap();
        log.enqueue(image_item("/w/a.jpg")).await.unwrap();
        log.enqueue(image_item("/w/b.jpg")).await.unwrap();
        log.close().await;

        let reopened = JobLog::open(&path, Some(meta)).await.unwrap();
        let pending = reopened.pending(None, 3);
        assert_eq!(pending.len(), 2);
        assert!(reopened.has_fingerprint(&image_item("/w/a.jpg").fingerprint));
        assert!(reopened.has_fingerprint(&image_item("/w/b.jpg").fingerprint));
        reopened.close().await;
    }

    #[tokio::test]
    async fn replay_keeps_the_latest_record_per_id() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.jsonl");

        let log = JobLog::open(&path, None).await.unwrap();
        log.enqueue(image_item("/w/a.jpg")).await.unwrap();
        let id = log.pending(None, 3)[0].id.clone();
        log.update_status(&id, ItemStatus::Sending, None).await.unwrap();
        log.update_status_with(&id, ItemStatus::Failed, Some("rate limited"), 1)
            .await
            .unwrap();
        log.close().await;

        let reopened = JobLog::open(&path, None).await.unwrap();
        let pending = reopened.pending(None, 3);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, ItemStatus::Failed);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("rate limited"));
        reopened.close().await;
    }

    #[tokio::test]
    async fn replay_twice_produces_identical_indices() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.jsonl");

        let log = JobLog::open(&path, None).await.unwrap();
        log.enqueue(image_item("/w/a.jpg")).await.unwrap();
        log.enqueue(image_item("/w/b.jpg")).await.unwrap();
        let id = log.pending(None, 3)[0].id.clone();
        log.update_status(&id, ItemStatus::Sent, None).await.unwrap();
        log.close().await;

        let first = JobLog::open(&path, None).await.unwrap();
        let second = JobLog::open(&path, None).await.unwrap();
        assert_eq!(first.stats(), second.stats());
        let first_ids: Vec<String> =
            first.pending(None, 9).into_iter().map(|i| i.id).collect();
        let second_ids: Vec<String> =
            second.pending(None, 9).into_iter().map(|i| i.id).collect();
        assert_eq!(first_ids, second_ids);
        first.close().await;
        second.close().await;
    }

    #[tokio::test]
    async fn meta_mismatch_fails_open_and_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.jsonl");

        let log = JobLog::open(&path, Some(watch_meta(&["/x"]))).await.unwrap();
        log.enqueue(image_item("/x/a.jpg")).await.unwrap();
        log.close().await;
        let before = std::fs::read_to_string(&path).unwrap();

        let result = JobLog::open(&path, Some(watch_meta(&["/y"]))).await;
        assert!(matches!(result, Err(FerryError::MetaMismatch)));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn meta_equal_after_normalization_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.jsonl");

        let log = JobLog::open(&path, Some(watch_meta(&["/a ", "/b", "/a "])))
            .await
            .unwrap();
        log.close().await;

        let reopened = JobLog::open(&path, Some(watch_meta(&["/b", "/a"]))).await;
        assert!(reopened.is_ok());
        reopened.unwrap().close().await;
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.jsonl");

        let log = JobLog::open(&path, Some(watch_meta(&["/w"]))).await.unwrap();
        log.enqueue(image_item("/w/a.jpg")).await.unwrap();
        log.close().await;

        // Corrupt the log with a torn write and a bogus line.
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"id\":\"truncated\n");
        content.push_str("not json at all\n");
        std::fs::write(&path, content).unwrap();

        let reopened = JobLog::open(&path, Some(watch_meta(&["/w"]))).await.unwrap();
        assert_eq!(reopened.pending(None, 3).len(), 1);
        reopened.close().await;
    }

    #[tokio::test]
    async fn pending_is_sorted_by_enqueue_time_and_respects_limit() {
        let dir = tempdir().unwrap();
        let log = JobLog::open(dir.path().join("q.jsonl"), None).await.unwrap();

        log.enqueue(image_item("/w/1.jpg")).await.unwrap();
        log.enqueue(image_item("/w/2.jpg")).await.unwrap();
        log.enqueue(image_item("/w/3.jpg")).await.unwrap();

        let pending = log.pending(None, 3);
        let paths: Vec<&str> = pending.iter().map(|i| i.source_path.as_str()).collect();
        assert_eq!(paths, vec!["/w/1.jpg", "/w/2.jpg", "/w/3.jpg"]);
        for pair in pending.windows(2) {
            assert!(pair[0].enqueued_at <= pair[1].enqueued_at);
        }

        assert_eq!(log.pending(Some(2), 3).len(), 2);
        log.close().await;
    }

    #[tokio::test]
    async fn pending_excludes_items_over_the_attempt_cap() {
        let dir = tempdir().unwrap();
        let log = JobLog::open(dir.path().join("q.jsonl"), None).await.unwrap();

        log.enqueue(image_item("/w/a.jpg")).await.unwrap();
        let id = log.pending(None, 3)[0].id.clone();

        for _ in 0..3 {
            log.update_status_with(&id, ItemStatus::Failed, Some("boom"), 1)
                .await
                .unwrap();
        }
        // attempts == 3 is still within a cap of 3.
        assert_eq!(log.pending(None, 3).len(), 1);

        log.update_status_with(&id, ItemStatus::Failed, Some("boom"), 1)
            .await
            .unwrap();
        // attempts == 4 is out.
        assert!(log.pending(None, 3).is_empty());
        log.close().await;
    }

    #[tokio::test]
    async fn update_status_of_unknown_id_errors() {
        let dir = tempdir().unwrap();
        let log = JobLog::open(dir.path().join("q.jsonl"), None).await.unwrap();
        let result = log.update_status("missing", ItemStatus::Sent, None).await;
        assert!(matches!(result, Err(FerryError::ItemNotFound { .. })));
        log.close().await;
    }

    #[tokio::test]
    async fn stats_counts_each_status() {
        let dir = tempdir().unwrap();
        let log = JobLog::open(dir.path().join("q.jsonl"), None).await.unwrap();

        log.enqueue(image_item("/w/a.jpg")).await.unwrap();
        log.enqueue(image_item("/w/b.jpg")).await.unwrap();
        log.enqueue(image_item("/w/c.jpg")).await.unwrap();
        let pending = log.pending(None, 3);
        log.update_status(&pending[0].id, ItemStatus::Sent, None).await.unwrap();
        log.update_status_with(&pending[1].id, ItemStatus::Failed, Some("x"), 1)
            .await
            .unwrap();

        let stats = log.stats();
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.sending, 0);
        assert_eq!(stats.pending(), 2);
        log.close().await;
    }

    #[tokio::test]
    async fn writer_flushes_on_tick_without_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("q.jsonl");
        let log = JobLog::open(&path, None).await.unwrap();

        log.enqueue(image_item("/w/a.jpg")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1300)).await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("/w/a.jpg"));
        log.close().await;
    }

    #[tokio::test]
    async fn operations_after_close_error_instead_of_hanging() {
        let dir = tempdir().unwrap();
        let log = JobLog::open(dir.path().join("q.jsonl"), None).await.unwrap();
        log.close().await;
        assert!(log.enqueue(image_item("/w/a.jpg")).await.is_err());
    }
}

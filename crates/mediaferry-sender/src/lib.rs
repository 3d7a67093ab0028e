// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The dispatcher side of the mediaferry pipeline: drains the job log in
//! enqueue order, batches images, paces sends, and reports progress.

pub mod dispatch;
pub mod progress;

pub use dispatch::{drain_once, emit_completed, run, DrainState, SenderConfig};
pub use progress::{ProgressFn, ProgressTracker};

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, UNIX_EPOCH};

    use mediaferry_core::{
        ChatTarget, Item, ItemStatus, ProgressStatus, ProgressUpdate, RetryPolicy, SendKind,
    };
    use mediaferry_media::ImageLimits;
    use mediaferry_queue::JobLog;
    use mediaferry_runtime::PauseGate;
    use mediaferry_test_utils::{MockRemote, RemoteCall};
    use tokio_util::sync::CancellationToken;

    use super::*;

    fn test_config() -> SenderConfig {
        SenderConfig {
            target: ChatTarget::new("@chat", None),
            group_size: 4,
            send_interval: Duration::ZERO,
            batch_delay: Duration::ZERO,
            pause_every: 0,
            pause_seconds: Duration::ZERO,
            retry_limit: 3,
            retry: RetryPolicy {
                max_retries: 1,
                delay: Duration::from_millis(10),
            },
            archive_passwords: Vec::new(),
            image_limits: ImageLimits::default(),
        }
    }

    async fn open_log(dir: &tempfile::TempDir) -> JobLog {
        JobLog::open(dir.path().join("q.jsonl"), None).await.unwrap()
    }

    fn write_png(dir: &Path, name: &str) -> PathBuf {
        let img = image::DynamicImage::ImageRgb8(image::ImageBuffer::from_pixel(
            4,
            4,
            image::Rgb([120u8, 40, 40]),
        ));
        let path = dir.join(name);
        img.save_with_format(&path, image::ImageFormat::Png).unwrap();
        path
    }

    fn write_raw(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"payload").unwrap();
        path
    }

    async fn enqueue_file(log: &JobLog, path: &Path, kind: SendKind) {
        let metadata = std::fs::metadata(path).unwrap();
        let mtime_ns = metadata
            .modified()
            .unwrap()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as i64;
        let added = log
            .enqueue(Item::file(
                &path.to_string_lossy(),
                metadata.len(),
                mtime_ns,
                kind,
            ))
            .await
            .unwrap();
        assert!(added);
    }

    async fn drain(
        config: &SenderConfig,
        log: &JobLog,
        remote: &MockRemote,
        reporter: Option<&ProgressFn>,
        state: &mut DrainState,
    ) -> usize {
        let pause = PauseGate::new();
        let cancel = CancellationToken::new();
        drain_once(config, log, remote, &pause, &cancel, reporter, state).await
    }

    fn capture_events() -> (Arc<Mutex<Vec<ProgressUpdate>>>, ProgressFn) {
        let events: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter: ProgressFn = Arc::new(move |update| sink.lock().unwrap().push(update));
        (events, reporter)
    }

    #[tokio::test]
    async fn consecutive_images_go_out_as_one_batch() {
        let work = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();

        for name in ["a.png", "b.png", "c.png"] {
            let path = write_png(work.path(), name);
            enqueue_file(&log, &path, SendKind::Image).await;
        }

        let mut state = DrainState::new();
        let processed = drain(&test_config(), &log, &remote, None, &mut state).await;
        assert_eq!(processed, 3);

        let calls = remote.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            RemoteCall::MediaBatch { filenames, .. } => {
                assert_eq!(filenames, &["a.png", "b.png", "c.png"]);
            }
            other => panic!("unexpected call: {other:?}"),
        }
        assert_eq!(log.stats().sent, 3);
        log.close().await;
    }

    #[tokio::test]
    async fn non_image_items_terminate_the_batch() {
        let work = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();

        enqueue_file(&log, &write_png(work.path(), "a.png"), SendKind::Image).await;
        enqueue_file(&log, &write_png(work.path(), "b.png"), SendKind::Image).await;
        enqueue_file(&log, &write_raw(work.path(), "paper.pdf"), SendKind::Document).await;
        enqueue_file(&log, &write_png(work.path(), "c.png"), SendKind::Image).await;

        let mut state = DrainState::new();
        drain(&test_config(), &log, &remote, None, &mut state).await;

        let calls = remote.calls();
        assert_eq!(calls.len(), 3, "got: {calls:?}");
        assert!(matches!(&calls[0], RemoteCall::MediaBatch { filenames, .. }
            if filenames == &["a.png", "b.png"]));
        assert!(matches!(&calls[1], RemoteCall::Document { filename, .. }
            if filename == "paper.pdf"));
        assert!(matches!(&calls[2], RemoteCall::MediaBatch { filenames, .. }
            if filenames == &["c.png"]));
        assert_eq!(log.stats().sent, 4);
        log.close().await;
    }

    #[tokio::test]
    async fn group_size_one_dispatches_images_singly() {
        let work = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();

        enqueue_file(&log, &write_png(work.path(), "a.png"), SendKind::Image).await;
        enqueue_file(&log, &write_png(work.path(), "b.png"), SendKind::Image).await;

        let config = SenderConfig {
            group_size: 1,
            ..test_config()
        };
        let mut state = DrainState::new();
        drain(&config, &log, &remote, None, &mut state).await;

        let calls = remote.calls();
        assert_eq!(calls.len(), 2);
        for call in &calls {
            assert!(matches!(call, RemoteCall::MediaBatch { filenames, .. }
                if filenames.len() == 1));
        }
        log.close().await;
    }

    #[tokio::test]
    async fn batch_failure_marks_every_member_and_retry_succeeds_in_order() {
        let work = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();
        remote.fail_always("rate limited");

        for name in ["a.png", "b.png", "c.png"] {
            enqueue_file(&log, &write_png(work.path(), name), SendKind::Image).await;
        }

        let config = test_config();
        let mut state = DrainState::new();
        drain(&config, &log, &remote, None, &mut state).await;

        for item in log.pending(None, 3) {
            assert_eq!(item.status, ItemStatus::Failed);
            assert_eq!(item.attempts, 1);
            assert_eq!(item.last_error.as_deref(), Some("remote error: rate limited"));
        }

        remote.succeed();
        drain(&config, &log, &remote, None, &mut state).await;

        let calls = remote.calls();
        assert_eq!(calls.len(), 2);
        // The retry preserves the original enqueue order.
        assert!(matches!(&calls[1], RemoteCall::MediaBatch { filenames, .. }
            if filenames == &["a.png", "b.png", "c.png"]));
        assert_eq!(log.stats().sent, 3);
        log.close().await;
    }

    #[tokio::test]
    async fn items_drop_out_of_snapshots_once_over_the_retry_budget() {
        let work = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();
        remote.fail_always("permanent outage");

        enqueue_file(&log, &write_png(work.path(), "a.png"), SendKind::Image).await;

        let config = test_config(); // retry_limit = 3
        let mut state = DrainState::new();

        // Four drains: attempts climb 1..=4; the fourth drain still sees
        // the item because attempts == 3 <= retry_limit going in.
        for _ in 0..4 {
            assert_eq!(drain(&config, &log, &remote, None, &mut state).await, 1);
        }
        assert_eq!(drain(&config, &log, &remote, None, &mut state).await, 0);
        assert!(log.pending(None, config.retry_limit).is_empty());
        assert_eq!(remote.call_count(), 4);
        log.close().await;
    }

    #[tokio::test]
    async fn missing_file_fails_locally_without_a_remote_call() {
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();

        log.enqueue(Item::file("/nonexistent/gone.png", 10, 1, SendKind::Image))
            .await
            .unwrap();

        let mut state = DrainState::new();
        drain(&test_config(), &log, &remote, None, &mut state).await;

        assert_eq!(remote.call_count(), 0);
        let item = &log.pending(None, 3)[0];
        assert_eq!(item.status, ItemStatus::Failed);
        assert_eq!(item.attempts, 1);
        assert!(item.last_error.as_deref().unwrap().contains("cannot read"));
        log.close().await;
    }

    #[tokio::test]
    async fn undecodable_image_fails_only_that_item() {
        let work = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();

        enqueue_file(&log, &write_raw(work.path(), "broken.png"), SendKind::Image).await;
        enqueue_file(&log, &write_png(work.path(), "good.png"), SendKind::Image).await;

        let mut state = DrainState::new();
        drain(&test_config(), &log, &remote, None, &mut state).await;

        let stats = log.stats();
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.failed, 1);
        let calls = remote.calls();
        assert!(matches!(&calls[0], RemoteCall::MediaBatch { filenames, .. }
            if filenames == &["good.png"]));
        log.close().await;
    }

    #[tokio::test]
    async fn single_sends_use_the_kind_specific_call() {
        let work = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();

        enqueue_file(&log, &write_raw(work.path(), "v.mp4"), SendKind::Video).await;
        enqueue_file(&log, &write_raw(work.path(), "a.mp3"), SendKind::Audio).await;
        enqueue_file(&log, &write_raw(work.path(), "d.bin"), SendKind::Document).await;

        let mut state = DrainState::new();
        drain(&test_config(), &log, &remote, None, &mut state).await;

        let calls = remote.calls();
        assert!(matches!(&calls[0], RemoteCall::Video { filename, .. } if filename == "v.mp4"));
        assert!(matches!(&calls[1], RemoteCall::Audio { filename, .. } if filename == "a.mp3"));
        assert!(matches!(&calls[2], RemoteCall::Document { filename, .. } if filename == "d.bin"));
        log.close().await;
    }

    #[tokio::test]
    async fn empty_snapshot_emits_an_idle_event() {
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();
        let (events, reporter) = capture_events();

        let mut state = DrainState::new();
        drain(&test_config(), &log, &remote, Some(&reporter), &mut state).await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, ProgressStatus::Idle);
        log.close().await;
    }

    #[tokio::test]
    async fn progress_counts_down_remaining() {
        let work = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();
        let (events, reporter) = capture_events();

        enqueue_file(&log, &write_png(work.path(), "a.png"), SendKind::Image).await;
        enqueue_file(&log, &write_raw(work.path(), "d.bin"), SendKind::Document).await;

        let mut state = DrainState::new();
        drain(&test_config(), &log, &remote, Some(&reporter), &mut state).await;

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, ProgressStatus::Sending);
        assert_eq!(events[0].total, 2);
        assert_eq!(events[0].completed, 1);
        assert_eq!(events[0].remaining, 1);
        assert_eq!(events[1].completed, 2);
        assert_eq!(events[1].remaining, 0);
        log.close().await;
    }

    #[tokio::test]
    async fn pacing_pause_still_drains_everything() {
        let work = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();

        enqueue_file(&log, &write_png(work.path(), "a.png"), SendKind::Image).await;
        enqueue_file(&log, &write_png(work.path(), "b.png"), SendKind::Image).await;

        let config = SenderConfig {
            group_size: 1,
            pause_every: 1,
            pause_seconds: Duration::from_millis(20),
            ..test_config()
        };
        let mut state = DrainState::new();
        let processed = drain(&config, &log, &remote, None, &mut state).await;
        assert_eq!(processed, 2);
        assert_eq!(log.stats().sent, 2);
        log.close().await;
    }

    #[tokio::test]
    async fn cancellation_stops_the_drain_between_batches() {
        let work = tempfile::tempdir().unwrap();
        let state_dir = tempfile::tempdir().unwrap();
        let log = open_log(&state_dir).await;
        let remote = MockRemote::new();

        enqueue_file(&log, &write_png(work.path(), "a.png"), SendKind::Image).await;
        enqueue_file(&log, &write_raw(work.path(), "d.bin"), SendKind::Document).await;

        let pause = PauseGate::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let mut state = DrainState::new();
        let processed = drain_once(
            &test_config(),
            &log,
            &remote,
            &pause,
            &cancel,
            None,
            &mut state,
        )
        .await;
        // The gate wait observes the token before any work happens.
        assert_eq!(processed, 0);
        assert_eq!(remote.call_count(), 0);
        log.close().await;
    }
}

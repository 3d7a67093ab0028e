// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording remote-client double for deterministic tests.
//!
//! `MockRemote` implements `RemoteClient`, captures every call, and can
//! be scripted to fail: either the next N calls or every call.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use mediaferry_core::{ChatTarget, FerryError, MediaFile, RemoteClient, RetryPolicy};

/// One captured remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteCall {
    Text {
        chat_id: String,
        text: String,
    },
    MediaBatch {
        chat_id: String,
        filenames: Vec<String>,
    },
    Document {
        chat_id: String,
        filename: String,
    },
    Video {
        chat_id: String,
        filename: String,
    },
    Audio {
        chat_id: String,
        filename: String,
    },
}

#[derive(Default)]
struct MockState {
    calls: Vec<RemoteCall>,
    /// Error messages returned by upcoming calls, in order.
    scripted_failures: VecDeque<String>,
    /// When set, every call fails with this message.
    always_fail: Option<String>,
}

/// A `RemoteClient` that records calls instead of talking to a network.
#[derive(Default)]
pub struct MockRemote {
    state: Mutex<MockState>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a failure for the next call (FIFO across all methods).
    pub fn fail_next(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .scripted_failures
            .push_back(message.to_string());
    }

    /// Makes every subsequent call fail until [`Self::succeed`] is called.
    pub fn fail_always(&self, message: &str) {
        self.state.lock().unwrap().always_fail = Some(message.to_string());
    }

    /// Clears the always-fail script.
    pub fn succeed(&self) {
        self.state.lock().unwrap().always_fail = None;
    }

    /// All captured calls so far.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    fn record(&self, call: RemoteCall) -> Result<(), FerryError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        if let Some(message) = &state.always_fail {
            return Err(FerryError::Remote {
                message: message.clone(),
                source: None,
            });
        }
        if let Some(message) = state.scripted_failures.pop_front() {
            return Err(FerryError::Remote {
                message,
                source: None,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for MockRemote {
    async fn send_text(
        &self,
        target: &ChatTarget,
        text: &str,
        _retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        self.record(RemoteCall::Text {
            chat_id: target.chat_id.clone(),
            text: text.to_string(),
        })
    }

    async fn send_media_batch(
        &self,
        target: &ChatTarget,
        batch: &[MediaFile],
        _retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        self.record(RemoteCall::MediaBatch {
            chat_id: target.chat_id.clone(),
            filenames: batch.iter().map(|f| f.filename.clone()).collect(),
        })
    }

    async fn send_document(
        &self,
        target: &ChatTarget,
        file: &MediaFile,
        _retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        self.record(RemoteCall::Document {
            chat_id: target.chat_id.clone(),
            filename: file.filename.clone(),
        })
    }

    async fn send_video(
        &self,
        target: &ChatTarget,
        file: &MediaFile,
        _retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        self.record(RemoteCall::Video {
            chat_id: target.chat_id.clone(),
            filename: file.filename.clone(),
        })
    }

    async fn send_audio(
        &self,
        target: &ChatTarget,
        file: &MediaFile,
        _retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        self.record(RemoteCall::Audio {
            chat_id: target.chat_id.clone(),
            filename: file.filename.clone(),
        })
    }
}

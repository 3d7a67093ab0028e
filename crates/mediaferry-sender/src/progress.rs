// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-file latency smoothing for progress events.

use std::sync::Arc;

use mediaferry_core::ProgressUpdate;

/// Callback receiving progress events (UI, logs, tests).
pub type ProgressFn = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

/// Exponential moving average of per-file latency in milliseconds.
///
/// The first positive sample seeds the average; later samples fold in
/// as `avg = (avg*7 + sample) / 8`. Non-positive samples are ignored.
#[derive(Debug, Default)]
pub struct ProgressTracker {
    avg_per_file_ms: i64,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one sample in and returns the current average.
    pub fn update(&mut self, per_file_ms: i64) -> i64 {
        if per_file_ms > 0 {
            if self.avg_per_file_ms == 0 {
                self.avg_per_file_ms = per_file_ms;
            } else {
                self.avg_per_file_ms = (self.avg_per_file_ms * 7 + per_file_ms) / 8;
            }
        }
        self.avg_per_file_ms
    }

    pub fn average(&self) -> i64 {
        self.avg_per_file_ms
    }

    /// Estimated time to drain `remaining` items, in milliseconds.
    pub fn eta_ms(&self, remaining: usize) -> i64 {
        remaining as i64 * self.avg_per_file_ms
    }
}

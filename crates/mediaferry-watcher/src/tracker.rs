// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The stability window: a file is enqueue-eligible only after its
//! `(size, mtime)` tuple has been unchanged for the settle duration.
//!
//! Callers pass the observation instant explicitly so scans and tests
//! share one code path.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

struct Observation {
    size: u64,
    mtime_ns: i64,
    last_change: Instant,
}

/// Tracks `(size, mtime)` tuples per path across scan iterations.
pub struct StabilityTracker {
    settle: Duration,
    state: HashMap<PathBuf, Observation>,
}

impl StabilityTracker {
    pub fn new(settle: Duration) -> Self {
        Self {
            settle,
            state: HashMap::new(),
        }
    }

    /// Records one observation and reports whether the file is stable.
    ///
    /// First sight or any change to the tuple resets the timer. A zero
    /// settle duration makes a file stable on first sight. A stable
    /// path is dropped from the tracker; the caller's fingerprint index
    /// keeps it from re-entering.
    pub fn observe(&mut self, path: &Path, size: u64, mtime_ns: i64, now: Instant) -> bool {
        match self.state.get_mut(path) {
            None => {
                self.state.insert(
                    path.to_path_buf(),
                    Observation {
                        size,
                        mtime_ns,
                        last_change: now,
                    },
                );
            }
            Some(observation)
                if observation.size != size || observation.mtime_ns != mtime_ns =>
            {
                observation.size = size;
                observation.mtime_ns = mtime_ns;
                observation.last_change = now;
            }
            Some(_) => {}
        }

        let last_change = self.state[path].last_change;
        if now.duration_since(last_change) >= self.settle {
            self.state.remove(path);
            true
        } else {
            false
        }
    }

    /// Drops paths not seen in the current iteration.
    pub fn prune(&mut self, seen: &HashSet<PathBuf>) {
        self.state.retain(|path, _| seen.contains(path));
    }

    /// Number of paths currently inside the window.
    pub fn len(&self) -> usize {
        self.state.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.is_empty()
    }
}

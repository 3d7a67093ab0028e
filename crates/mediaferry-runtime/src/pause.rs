// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The pause gate shared by discovery and dispatch.
//!
//! A latch with two states. Closing is idempotent; opening broadcasts to
//! every parked waiter. Built on a `watch` channel: a manual-reset event
//! whose wait also observes the cancellation token.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Open/closed latch with cancel-aware waiting.
pub struct PauseGate {
    // true = open.
    state: watch::Sender<bool>,
}

impl PauseGate {
    /// Creates an open gate.
    pub fn new() -> Self {
        let (state, _) = watch::channel(true);
        Self { state }
    }

    /// Closes the gate. Waiters park until [`Self::resume`].
    pub fn pause(&self) {
        self.state.send_replace(false);
    }

    /// Opens the gate and wakes all waiters.
    pub fn resume(&self) {
        self.state.send_replace(true);
    }

    pub fn is_paused(&self) -> bool {
        !*self.state.borrow()
    }

    /// Parks until the gate is open.
    ///
    /// Returns `true` iff the gate is open at the moment of unblocking,
    /// `false` iff the token fired first.
    pub async fn wait(&self, cancel: &CancellationToken) -> bool {
        let mut rx = self.state.subscribe();
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            if *rx.borrow_and_update() {
                return true;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}

// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The "timer or cancel, whichever first" idiom.
//!
//! Every sleep in the pipeline goes through this so that cancellation is
//! observed within one suspension point.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Sleeps for `duration` unless the token fires first.
///
/// Returns `true` iff the timer fired. A zero duration returns `true`
/// immediately without consulting the token.
pub async fn sleep_or_cancel(duration: Duration, cancel: &CancellationToken) -> bool {
    if duration.is_zero() {
        return true;
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

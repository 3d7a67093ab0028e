// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic status summaries delivered to the target chat.
//!
//! Optional fourth long-lived task of a watch run: announces the start,
//! then reports queue counts every interval, plus an idle notice when
//! the pending count drains to zero.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mediaferry_core::{ChatTarget, RemoteClient, RetryPolicy};
use mediaferry_queue::JobLog;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::time::sleep_or_cancel;

/// Notifier settings.
#[derive(Debug, Clone)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub interval: Duration,
    pub notify_on_idle: bool,
}

/// Formats a duration as `hh:mm:ss`.
pub fn format_elapsed(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Runs the notifier loop until the token fires.
///
/// Delivery failures are logged by the client and otherwise ignored;
/// status messages are best-effort.
pub async fn run(
    config: NotifyConfig,
    job_log: Arc<JobLog>,
    client: Arc<dyn RemoteClient>,
    target: ChatTarget,
    cancel: CancellationToken,
) {
    if !config.enabled {
        return;
    }

    let start = Instant::now();
    let retry = RetryPolicy::default();
    let _ = client
        .send_text(
            &target,
            &format!("Watch started (elapsed {})", format_elapsed(Duration::ZERO)),
            retry,
        )
        .await;

    let mut last_pending: Option<usize> = None;
    loop {
        if !sleep_or_cancel(config.interval, &cancel).await {
            debug!("notifier cancelled");
            return;
        }

        let elapsed = format_elapsed(start.elapsed());
        let stats = job_log.stats();
        let pending = stats.pending();
        let _ = client
            .send_text(
                &target,
                &format!(
                    "Watch status: elapsed {elapsed}, queued {}, sending {}, sent {}, failed {}",
                    stats.queued, stats.sending, stats.sent, stats.failed
                ),
                retry,
            )
            .await;

        if config.notify_on_idle {
            if last_pending.is_some_and(|previous| previous > 0) && pending == 0 {
                let _ = client
                    .send_text(&target, &format!("Watch idle (elapsed {elapsed})"), retry)
                    .await;
            }
            last_pending = Some(pending);
        }
    }
}

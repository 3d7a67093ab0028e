// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ownership of one run: the cancellation token, the pause gate, the job
//! log, and the long-lived task handles.
//!
//! The binary wires discovery, dispatch, and the notifier into a
//! supervisor; pause/resume toggle the shared gate, and `stop` performs
//! the ordered teardown: open the gate so parked tasks can observe the
//! token, cancel, flush and close the job log, then join every task.

use std::future::Future;
use std::sync::Arc;

use mediaferry_queue::JobLog;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::pause::PauseGate;

/// Owns the shared control state of one run.
pub struct Supervisor {
    cancel: CancellationToken,
    pause: Arc<PauseGate>,
    job_log: Arc<JobLog>,
    handles: Vec<JoinHandle<()>>,
}

impl Supervisor {
    /// Creates a supervisor around an opened job log. The gate starts
    /// open; the token is a child of `parent` so an external Ctrl+C
    /// cancels the run too.
    pub fn new(job_log: Arc<JobLog>, parent: &CancellationToken) -> Self {
        Self {
            cancel: parent.child_token(),
            pause: Arc::new(PauseGate::new()),
            job_log,
            handles: Vec::new(),
        }
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn pause_gate(&self) -> Arc<PauseGate> {
        self.pause.clone()
    }

    pub fn job_log(&self) -> Arc<JobLog> {
        self.job_log.clone()
    }

    /// Spawns one long-lived task under this supervisor.
    pub fn spawn(&mut self, task: impl Future<Output = ()> + Send + 'static) {
        self.handles.push(tokio::spawn(task));
    }

    /// Closes the gate; discovery and dispatch park at their next wait.
    /// In-flight work (one batch, one HTTP call) completes first.
    pub fn pause(&self) {
        self.pause.pause();
        info!("run paused");
    }

    /// Opens the gate and wakes all parked tasks.
    pub fn resume(&self) {
        self.pause.resume();
        info!("run resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.pause.is_paused()
    }

    /// Waits for the cancellation token without consuming the supervisor.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    /// Stops the run: resume so parked tasks can observe the token,
    /// cancel, join every task, then flush and close the job log.
    pub async fn stop(self) {
        self.pause.resume();
        self.cancel.cancel();
        for handle in self.handles {
            if let Err(e) = handle.await {
                error!(error = %e, "supervised task panicked");
            }
        }
        self.job_log.close().await;
        info!("run stopped");
    }
}

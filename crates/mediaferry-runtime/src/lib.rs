// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Run control for the mediaferry pipeline: the pause gate, the
//! cancellable-sleep idiom, signal handling, the periodic notifier, and
//! the supervisor that ties a run's tasks together.

pub mod notify;
pub mod pause;
pub mod shutdown;
pub mod supervisor;
pub mod time;

pub use notify::{format_elapsed, NotifyConfig};
pub use pause::PauseGate;
pub use shutdown::install_signal_handler;
pub use supervisor::Supervisor;
pub use time::sleep_or_cancel;

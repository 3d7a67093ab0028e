// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable append-only job log for the mediaferry pipeline.
//!
//! One JSON object per line: a meta header first, then item records.
//! Replay is last-writer-wins per item id. Enqueue deduplicates on the
//! item fingerprint, which is what gives the pipeline at-most-once local
//! dispatch across process restarts.

pub mod log;
pub mod meta;

pub use log::JobLog;
pub use meta::{MetaParams, QueueMeta, META_TYPE, META_VERSION};

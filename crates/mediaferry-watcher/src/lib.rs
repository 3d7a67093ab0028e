// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory discovery for mediaferry: periodic scans over the watch
//! roots, a stability window before enqueue, and archive expansion.

pub mod filter;
pub mod scan;
pub mod tracker;

pub use filter::{matches_exclude, matches_include};
pub use scan::{run, scan_once, ScanState, WatcherConfig};
pub use tracker::StabilityTracker;

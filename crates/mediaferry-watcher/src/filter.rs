// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Include/exclude glob matching over slash-normalized relative paths.
//!
//! An empty include list admits everything; exclude always wins over
//! include. Patterns that fail to parse never match.

use glob::Pattern;

fn normalize(rel: &str) -> String {
    rel.replace('\\', "/")
}

fn matches_any(rel: &str, patterns: &[String]) -> bool {
    let rel = normalize(rel);
    patterns
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .any(|p| Pattern::new(p).map(|pattern| pattern.matches(&rel)).unwrap_or(false))
}

/// Whether `rel` passes the include list (empty list admits all).
pub fn matches_include(rel: &str, patterns: &[String]) -> bool {
    if patterns.iter().all(|p| p.trim().is_empty()) {
        return true;
    }
    matches_any(rel, patterns)
}

/// Whether `rel` is excluded.
pub fn matches_exclude(rel: &str, patterns: &[String]) -> bool {
    matches_any(rel, patterns)
}

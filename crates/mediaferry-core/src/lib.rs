// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the mediaferry workspace.
//!
//! Provides the shared error type, the item data model persisted in the
//! job log, common value types, and the [`RemoteClient`] capability trait
//! the dispatcher is written against.

pub mod error;
pub mod remote;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::FerryError;
pub use remote::RemoteClient;
pub use types::{
    build_fingerprint, build_source_fingerprint, ChatTarget, Item, ItemStatus, MediaFile,
    ProgressStatus, ProgressUpdate, QueueStats, RetryPolicy, SendKind, SourceKind,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_variants_render_messages() {
        let config = FerryError::Config("chat-id is required".into());
        assert_eq!(config.to_string(), "configuration error: chat-id is required");

        let mismatch = FerryError::MetaMismatch;
        assert!(mismatch.to_string().contains("does not match"));

        let not_found = FerryError::ItemNotFound { id: "abc".into() };
        assert!(not_found.to_string().contains("abc"));
    }

    #[test]
    fn kinds_parse_from_lowercase_strings() {
        use std::str::FromStr;

        assert_eq!(SendKind::from_str("image").unwrap(), SendKind::Image);
        assert_eq!(SendKind::from_str("document").unwrap(), SendKind::Document);
        assert_eq!(SourceKind::from_str("archive").unwrap(), SourceKind::Archive);
        assert_eq!(ItemStatus::from_str("failed").unwrap(), ItemStatus::Failed);
        assert_eq!(ItemStatus::Sent.to_string(), "sent");
    }

    #[test]
    fn queue_stats_pending_sums_queued_and_failed() {
        let stats = QueueStats {
            queued: 2,
            sending: 1,
            sent: 5,
            failed: 3,
        };
        assert_eq!(stats.pending(), 5);
    }
}

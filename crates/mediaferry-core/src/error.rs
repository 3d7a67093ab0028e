// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types shared across the mediaferry workspace.

use thiserror::Error;

/// The primary error type used across all mediaferry crates.
#[derive(Debug, Error)]
pub enum FerryError {
    /// Configuration errors (missing chat target, unreadable credentials,
    /// invalid flag values). Fatal at startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// The job log's stored meta header does not match the parameters of
    /// the current run. Fatal at startup; the file is left untouched.
    #[error("queue metadata does not match current run parameters")]
    MetaMismatch,

    /// Job log errors (unreadable file, serialization failure).
    #[error("queue error: {message}")]
    Queue {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A status update referenced an id the job log does not know.
    #[error("queue item not found: {id}")]
    ItemNotFound { id: String },

    /// Remote API errors (network failure, non-ok response, retries
    /// exhausted, no endpoint or credential available).
    #[error("remote error: {message}")]
    Remote {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Image preparation errors (undecodable bytes, encode failure).
    #[error("media error: {message}")]
    Media {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Archive errors (unreadable archive, missing entry, password
    /// attempts exhausted).
    #[error("archive error: {message}")]
    Archive {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

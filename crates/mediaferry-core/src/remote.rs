// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The remote delivery capability the dispatcher depends on.

use async_trait::async_trait;

use crate::error::FerryError;
use crate::types::{ChatTarget, MediaFile, RetryPolicy};

/// Capability set for delivering content to the remote chat API.
///
/// The production implementation selects a base URL and a credential per
/// attempt and handles intra-call retry; tests substitute an in-memory
/// recording double. Every method is at-most-once from the caller's view:
/// a returned error means the call's whole retry budget is spent.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Sends a plain text message.
    async fn send_text(
        &self,
        target: &ChatTarget,
        text: &str,
        retry: RetryPolicy,
    ) -> Result<(), FerryError>;

    /// Sends a batch of images as one media group. Every item is
    /// classified as an image on the wire; callers group accordingly.
    async fn send_media_batch(
        &self,
        target: &ChatTarget,
        batch: &[MediaFile],
        retry: RetryPolicy,
    ) -> Result<(), FerryError>;

    /// Sends one file as a document.
    async fn send_document(
        &self,
        target: &ChatTarget,
        file: &MediaFile,
        retry: RetryPolicy,
    ) -> Result<(), FerryError>;

    /// Sends one file as a video.
    async fn send_video(
        &self,
        target: &ChatTarget,
        file: &MediaFile,
        retry: RetryPolicy,
    ) -> Result<(), FerryError>;

    /// Sends one file as an audio track.
    async fn send_audio(
        &self,
        target: &ChatTarget,
        file: &MediaFile,
        retry: RetryPolicy,
    ) -> Result<(), FerryError>;
}

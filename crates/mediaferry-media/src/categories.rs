// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Static file-extension category tables and classification helpers.

use mediaferry_core::SendKind;

/// Supported image file suffixes (lowercase).
pub const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp"];

/// Supported video file suffixes (lowercase).
pub const VIDEO_EXTENSIONS: &[&str] = &[".mp4", ".mkv", ".mov", ".avi", ".webm"];

/// Supported audio file suffixes (lowercase).
pub const AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".flac", ".wav", ".m4a", ".ogg", ".opus"];

/// Suffix marking a container the watcher expands entry-by-entry.
pub const ARCHIVE_SUFFIX: &str = ".zip";

/// Case-insensitive suffix match against one extension table.
pub fn matches_ext(name: &str, extensions: &[&str]) -> bool {
    let name = name.to_lowercase();
    extensions.iter().any(|ext| name.ends_with(ext))
}

pub fn is_image(name: &str) -> bool {
    matches_ext(name, IMAGE_EXTENSIONS)
}

pub fn is_video(name: &str) -> bool {
    matches_ext(name, VIDEO_EXTENSIONS)
}

pub fn is_audio(name: &str) -> bool {
    matches_ext(name, AUDIO_EXTENSIONS)
}

pub fn is_archive(name: &str) -> bool {
    name.to_lowercase().ends_with(ARCHIVE_SUFFIX)
}

/// Extension table for a send kind; `None` for documents (any extension).
pub fn extensions_for(kind: SendKind) -> Option<&'static [&'static str]> {
    match kind {
        SendKind::Image => Some(IMAGE_EXTENSIONS),
        SendKind::Video => Some(VIDEO_EXTENSIONS),
        SendKind::Audio => Some(AUDIO_EXTENSIONS),
        SendKind::Document => None,
    }
}

/// Which media categories a run watches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaSelectors {
    pub image: bool,
    pub video: bool,
    pub audio: bool,
}

impl MediaSelectors {
    /// Classifies a name against the active categories only.
    ///
    /// Returns `None` for names outside every active category — such
    /// files are ignored by discovery rather than sent as documents.
    pub fn classify(&self, name: &str) -> Option<SendKind> {
        if self.image && is_image(name) {
            return Some(SendKind::Image);
        }
        if self.video && is_video(name) {
            return Some(SendKind::Video);
        }
        if self.audio && is_audio(name) {
            return Some(SendKind::Audio);
        }
        None
    }

    /// Whether any category is active.
    pub fn any(&self) -> bool {
        self.image || self.video || self.audio
    }
}

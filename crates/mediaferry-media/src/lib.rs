// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media handling for mediaferry: file-extension categories, the image
//! preparation pipeline, and archive entry access.

pub mod archive;
pub mod categories;
pub mod image;

pub use archive::{list_entries, list_entries_sync, read_entry, read_entry_sync, ArchiveEntry};
pub use categories::{
    extensions_for, is_archive, is_audio, is_image, is_video, matches_ext, MediaSelectors,
    ARCHIVE_SUFFIX, AUDIO_EXTENSIONS, IMAGE_EXTENSIONS, VIDEO_EXTENSIONS,
};
pub use image::{prepare, ImageLimits, PreparedImage};

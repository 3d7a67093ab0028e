// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The meta header written as the first record of a job log file.
//!
//! The header captures the normalized parameters of the run that created
//! the log. Reopening a log under different parameters is a fatal startup
//! error so that two differently-configured runs never interleave items
//! in one file.

use serde::{Deserialize, Serialize};

/// The `type` discriminator of a meta record.
pub const META_TYPE: &str = "queue_meta";
/// The current meta schema version.
pub const META_VERSION: u32 = 1;

/// First record of a job log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMeta {
    #[serde(rename = "type", default)]
    pub record_type: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub params: MetaParams,
}

/// Normalized run configuration recorded in the meta header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaParams {
    /// The CLI verb that created the log (e.g. "watch", "send-images").
    #[serde(default)]
    pub command: String,
    #[serde(default)]
    pub watch_dirs: Vec<String>,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_id: Option<i64>,
    #[serde(default)]
    pub with_image: bool,
    #[serde(default)]
    pub with_video: bool,
    #[serde(default)]
    pub with_audio: bool,
    #[serde(default)]
    pub with_all: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

impl QueueMeta {
    /// Builds a normalized meta header for the given parameters.
    pub fn new(params: MetaParams) -> Self {
        QueueMeta {
            record_type: META_TYPE.to_string(),
            version: META_VERSION,
            params,
        }
        .normalized()
    }

    /// Returns a copy with type/version filled in and parameter lists
    /// trimmed, sorted, and deduplicated. Comparisons always go through
    /// this form.
    pub fn normalized(&self) -> QueueMeta {
        let mut meta = self.clone();
        if meta.record_type.is_empty() {
            meta.record_type = META_TYPE.to_string();
        }
        if meta.version == 0 {
            meta.version = META_VERSION;
        }
        meta.params.watch_dirs = normalize_list(&self.params.watch_dirs);
        meta.params.include = normalize_list(&self.params.include);
        meta.params.exclude = normalize_list(&self.params.exclude);
        meta
    }

    /// Whether this record carries the expected type and version.
    pub fn is_meta_record(&self) -> bool {
        self.record_type == META_TYPE && self.version == META_VERSION
    }

    /// Whether two headers describe the same run after normalization.
    pub fn matches(&self, other: &QueueMeta) -> bool {
        self.normalized() == other.normalized()
    }
}

fn normalize_list(values: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = values
        .iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect();
    cleaned.sort();
    cleaned.dedup();
    cleaned
}

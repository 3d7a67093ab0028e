// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The persisted settings model, loaded through Figment.
//!
//! Merge order (later overrides earlier): compiled defaults, the JSON
//! settings file, then `MEDIAFERRY_*` environment variables. Missing
//! numeric fields adopt the documented defaults; all numbers are finite
//! non-negative integers.

use std::path::Path;

use figment::providers::{Env, Format, Json, Serialized};
use figment::Figment;
use mediaferry_core::FerryError;
use serde::{Deserialize, Serialize};

/// Settings for a watch/send run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to the INI credentials file.
    #[serde(default)]
    pub config_path: String,
    /// Target chat id (channel/group/user).
    #[serde(default)]
    pub chat_id: String,
    /// Topic/thread id inside a group or channel.
    #[serde(default)]
    pub topic_id: Option<i64>,
    /// Directories to watch.
    #[serde(default)]
    pub watch_dirs: Vec<String>,
    #[serde(default = "default_queue_file")]
    pub queue_file: String,
    #[serde(default)]
    pub recursive: bool,
    #[serde(default)]
    pub with_image: bool,
    #[serde(default)]
    pub with_video: bool,
    #[serde(default)]
    pub with_audio: bool,
    #[serde(default)]
    pub with_all: bool,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub archive_passwords: Vec<String>,
    #[serde(default)]
    pub archive_password_file: String,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_sec: u64,
    #[serde(default = "default_send_interval")]
    pub send_interval_sec: u64,
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: u64,
    #[serde(default = "default_group_size")]
    pub group_size: usize,
    #[serde(default = "default_batch_delay")]
    pub batch_delay_sec: u64,
    /// Pause after sending this many images; 0 disables the pacing pause.
    #[serde(default)]
    pub pause_every: usize,
    #[serde(default)]
    pub pause_seconds: u64,
    #[serde(default)]
    pub notify_enabled: bool,
    #[serde(default = "default_notify_interval")]
    pub notify_interval_sec: u64,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u32,
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
    #[serde(default = "default_png_start_level")]
    pub png_start_level: u8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            config_path: String::new(),
            chat_id: String::new(),
            topic_id: None,
            watch_dirs: Vec::new(),
            queue_file: default_queue_file(),
            recursive: false,
            with_image: false,
            with_video: false,
            with_audio: false,
            with_all: false,
            include: Vec::new(),
            exclude: Vec::new(),
            archive_passwords: Vec::new(),
            archive_password_file: String::new(),
            scan_interval_sec: default_scan_interval(),
            send_interval_sec: default_send_interval(),
            settle_seconds: default_settle_seconds(),
            group_size: default_group_size(),
            batch_delay_sec: default_batch_delay(),
            pause_every: 0,
            pause_seconds: 0,
            notify_enabled: false,
            notify_interval_sec: default_notify_interval(),
            max_dimension: default_max_dimension(),
            max_bytes: default_max_bytes(),
            png_start_level: default_png_start_level(),
        }
    }
}

fn default_queue_file() -> String {
    "queue.jsonl".to_string()
}

fn default_scan_interval() -> u64 {
    30
}

fn default_send_interval() -> u64 {
    30
}

fn default_settle_seconds() -> u64 {
    5
}

fn default_group_size() -> usize {
    4
}

fn default_batch_delay() -> u64 {
    3
}

fn default_notify_interval() -> u64 {
    300
}

fn default_max_dimension() -> u32 {
    2000
}

fn default_max_bytes() -> usize {
    5 * 1024 * 1024
}

fn default_png_start_level() -> u8 {
    8
}

impl Settings {
    /// Applies the media-selector defaulting rule: `with_all` turns every
    /// selector on, and a run with no selector at all watches images.
    pub fn resolve_selectors(&mut self) {
        if self.with_all {
            self.with_image = true;
            self.with_video = true;
            self.with_audio = true;
        }
        if !self.with_image && !self.with_video && !self.with_audio {
            self.with_image = true;
        }
    }
}

/// Loads settings from compiled defaults, an optional JSON file, and
/// `MEDIAFERRY_*` environment variables, in that override order.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, FerryError> {
    let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));
    if let Some(path) = path {
        figment = figment.merge(Json::file(path));
    }
    figment
        .merge(Env::prefixed("MEDIAFERRY_"))
        .extract()
        .map_err(|e| FerryError::Config(format!("cannot load settings: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.scan_interval_sec, 30);
        assert_eq!(settings.send_interval_sec, 30);
        assert_eq!(settings.settle_seconds, 5);
        assert_eq!(settings.group_size, 4);
        assert_eq!(settings.batch_delay_sec, 3);
        assert_eq!(settings.pause_every, 0);
        assert_eq!(settings.notify_interval_sec, 300);
        assert_eq!(settings.max_dimension, 2000);
        assert_eq!(settings.max_bytes, 5_242_880);
        assert_eq!(settings.png_start_level, 8);
        assert_eq!(settings.queue_file, "queue.jsonl");
    }

    #[test]
    fn missing_file_keeps_defaults() {
        let settings = load_settings(None).unwrap();
        assert_eq!(settings.group_size, 4);
        assert!(settings.watch_dirs.is_empty());
    }

    #[test]
    fn file_overrides_defaults_and_keeps_the_rest() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"chat_id":"@target","group_size":2,"watch_dirs":["/w"]}}"#
        )
        .unwrap();

        let settings = load_settings(Some(file.path())).unwrap();
        assert_eq!(settings.chat_id, "@target");
        assert_eq!(settings.group_size, 2);
        assert_eq!(settings.watch_dirs, vec!["/w"]);
        // Untouched fields keep their defaults.
        assert_eq!(settings.scan_interval_sec, 30);
        assert_eq!(settings.max_bytes, 5_242_880);
    }

    #[test]
    fn selector_defaulting_turns_images_on() {
        let mut settings = Settings::default();
        settings.resolve_selectors();
        assert!(settings.with_image);
        assert!(!settings.with_video);

        let mut all = Settings {
            with_all: true,
            ..Settings::default()
        };
        all.resolve_selectors();
        assert!(all.with_image && all.with_video && all.with_audio);

        let mut video_only = Settings {
            with_video: true,
            ..Settings::default()
        };
        video_only.resolve_selectors();
        assert!(video_only.with_video);
        assert!(!video_only.with_image);
    }

    #[test]
    fn settings_survive_a_json_round_trip() {
        let settings = Settings {
            chat_id: "@c".into(),
            topic_id: Some(7),
            watch_dirs: vec!["/a".into(), "/b".into()],
            ..Settings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back.chat_id, "@c");
        assert_eq!(back.topic_id, Some(7));
        assert_eq!(back.watch_dirs, vec!["/a", "/b"]);
    }
}

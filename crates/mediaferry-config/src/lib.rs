// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loading for mediaferry: the JSON settings file (merged
//! through Figment with env overrides) and the INI credentials file.

pub mod credentials;
pub mod settings;

pub use credentials::{load_credentials, normalize_api_url, parse_api_urls, Credentials, DEFAULT_API_URL};
pub use settings::{load_settings, Settings};

// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The INI credentials file: API base URLs and bot tokens.
//!
//! Format: a `[Telegram]` section whose `api_url` key holds a
//! comma-separated list of base URLs, and zero or more `[Token*]`
//! sections each carrying a `token` key.

use std::path::Path;

use ini::Ini;
use mediaferry_core::FerryError;

/// The default Bot API endpoint used when no URL is configured.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Base URLs and tokens loaded from a credentials file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub api_urls: Vec<String>,
    pub tokens: Vec<String>,
}

/// Normalizes one API base URL: trim whitespace, prepend `https://` when
/// no scheme is present, trim trailing slashes. Returns an empty string
/// for blank input.
pub fn normalize_api_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    let url = if url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    };
    url.trim_end_matches('/').to_string()
}

/// Splits a comma-separated URL list and normalizes each entry.
pub fn parse_api_urls(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(normalize_api_url)
        .filter(|u| !u.is_empty())
        .collect()
}

/// Loads a credentials file.
///
/// A missing `api_url` key falls back to the public endpoint; token
/// sections with a blank `token` key are skipped.
pub fn load_credentials(path: impl AsRef<Path>) -> Result<Credentials, FerryError> {
    let path = path.as_ref();
    let ini = Ini::load_from_file(path).map_err(|e| {
        FerryError::Config(format!("cannot read credentials file {}: {e}", path.display()))
    })?;

    let api_url_value = ini
        .section(Some("Telegram"))
        .and_then(|section| section.get("api_url"))
        .unwrap_or(DEFAULT_API_URL);
    let api_urls = parse_api_urls(api_url_value);

    let mut tokens = Vec::new();
    for (section, properties) in ini.iter() {
        let Some(name) = section else { continue };
        if !name.starts_with("Token") {
            continue;
        }
        if let Some(token) = properties.get("token") {
            let token = token.trim();
            if !token.is_empty() {
                tokens.push(token.to_string());
            }
        }
    }

    Ok(Credentials { api_urls, tokens })
}

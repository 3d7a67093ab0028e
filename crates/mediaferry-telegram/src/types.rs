// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bot API response envelope.

use std::time::Duration;

use serde::Deserialize;

/// The envelope every Bot API method returns.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiResponse {
    #[serde(default)]
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub parameters: Option<ResponseParameters>,
}

/// Optional metadata attached to error responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponseParameters {
    #[serde(default)]
    pub retry_after: Option<u64>,
}

impl ApiResponse {
    /// The cool-off the API asked for, when one was declared.
    pub fn retry_after(&self) -> Option<Duration> {
        self.parameters
            .as_ref()
            .and_then(|p| p.retry_after)
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs)
    }

    /// Whether the response marks the credential itself as invalid.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.error_code, Some(401) | Some(403))
    }

    /// The human-readable failure description, or a placeholder.
    pub fn describe(&self) -> &str {
        self.description.as_deref().unwrap_or("unknown error")
    }
}

// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flags and resolution steps shared by every verb: credentials, the
//! remote client, the chat target, and archive passwords.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use mediaferry_config::{load_credentials, parse_api_urls, Credentials, DEFAULT_API_URL};
use mediaferry_core::{ChatTarget, FerryError, RetryPolicy};
use mediaferry_telegram::{LeastUsedPool, TelegramClient};
use tracing::info;

/// Flags every verb accepts.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    /// Path to the INI credentials file.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Bot token(s), comma-separated. Appended to the credentials file's.
    #[arg(long = "bot-token")]
    pub bot_token: Option<String>,

    /// API base URL(s), comma-separated. Appended to the credentials file's.
    #[arg(long = "api-url")]
    pub api_url: Option<String>,

    /// Target chat id (channel/group/user).
    #[arg(long = "chat-id")]
    pub chat_id: Option<String>,

    /// Topic/thread id inside a group or channel.
    #[arg(long = "topic-id")]
    pub topic_id: Option<i64>,

    /// Probe each token with getMe before sending and drop failures.
    #[arg(long = "validate-tokens")]
    pub validate_tokens: bool,

    /// Attempts per remote call.
    #[arg(long = "max-retries", default_value_t = 3)]
    pub max_retries: u32,

    /// Delay between attempts, seconds.
    #[arg(long = "retry-delay", default_value_t = 3)]
    pub retry_delay: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long = "log-level", default_value = "info")]
    pub log_level: String,
}

impl CommonArgs {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries.max(1),
            delay: Duration::from_secs(self.retry_delay),
        }
    }

    /// The chat target, requiring a chat id from flags or settings.
    pub fn target(&self, fallback_chat_id: &str) -> Result<ChatTarget, FerryError> {
        let chat_id = self
            .chat_id
            .clone()
            .unwrap_or_else(|| fallback_chat_id.to_string());
        if chat_id.is_empty() {
            return Err(FerryError::Config("chat-id is required".into()));
        }
        Ok(ChatTarget::new(chat_id, self.topic_id))
    }

    /// Merges the credentials file with the CSV flags.
    pub fn resolve_credentials(
        &self,
        fallback_config: &str,
    ) -> Result<Credentials, FerryError> {
        let mut credentials = Credentials::default();

        let config_path = self
            .config
            .clone()
            .or_else(|| (!fallback_config.is_empty()).then(|| PathBuf::from(fallback_config)));
        if let Some(path) = config_path {
            let loaded = load_credentials(&path)?;
            credentials.api_urls.extend(loaded.api_urls);
            credentials.tokens.extend(loaded.tokens);
        }

        if let Some(api_url) = &self.api_url {
            credentials.api_urls.extend(parse_api_urls(api_url));
        }
        if let Some(bot_token) = &self.bot_token {
            credentials.tokens.extend(
                bot_token
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
            );
        }

        if credentials.api_urls.is_empty() {
            credentials.api_urls.push(DEFAULT_API_URL.to_string());
        }
        if credentials.tokens.is_empty() {
            return Err(FerryError::Config("no bot token provided".into()));
        }
        Ok(credentials)
    }

    /// Builds the client, optionally filtering tokens through getMe.
    pub async fn build_client(
        &self,
        credentials: Credentials,
    ) -> Result<TelegramClient, FerryError> {
        let client = TelegramClient::new(
            LeastUsedPool::new(credentials.api_urls.clone()),
            LeastUsedPool::new(credentials.tokens.clone()),
        )?;

        if !self.validate_tokens {
            return Ok(client);
        }

        let valid = client.filter_valid_tokens(&credentials.tokens).await;
        if valid.is_empty() {
            return Err(FerryError::Config("no valid tokens after validation".into()));
        }
        info!(valid = valid.len(), total = credentials.tokens.len(), "tokens validated");
        TelegramClient::new(
            LeastUsedPool::new(credentials.api_urls),
            LeastUsedPool::new(valid),
        )
    }
}

/// Merges password flags with a one-per-line password file.
pub fn load_archive_passwords(
    passwords: &[String],
    password_file: Option<&PathBuf>,
) -> Result<Vec<String>, FerryError> {
    let mut merged: Vec<String> = passwords
        .iter()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    if let Some(path) = password_file {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FerryError::Config(format!(
                "cannot read archive password file {}: {e}",
                path.display()
            ))
        })?;
        merged.extend(
            content
                .lines()
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty()),
        );
    }
    Ok(merged)
}

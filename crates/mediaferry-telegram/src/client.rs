// SPDX-FileCopyrightText: 2026 Mediaferry Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Telegram Bot API.
//!
//! Every attempt selects a base URL and a bot token from the least-used
//! pools. The URL counter is bumped on every attempt; the token counter
//! only on an `ok` response. A response marking the credential invalid
//! evicts it from the pool, and a declared `retry_after` cool-off is
//! honoured before the next attempt. Outbound HTTPS follows
//! `HTTPS_PROXY`/`https_proxy` through reqwest's system-proxy support.

use std::time::Duration;

use async_trait::async_trait;
use mediaferry_core::{ChatTarget, FerryError, MediaFile, RemoteClient, RetryPolicy};
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use crate::pool::LeastUsedPool;
use crate::types::ApiResponse;

/// Request timeout for one attempt; uploads can be large.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

enum Payload<'a> {
    Form(Vec<(&'static str, String)>),
    Multipart {
        fields: Vec<(&'static str, String)>,
        files: Vec<(String, &'a MediaFile)>,
    },
}

/// Bot API client with URL and token pools.
pub struct TelegramClient {
    http: reqwest::Client,
    urls: LeastUsedPool,
    tokens: LeastUsedPool,
}

impl TelegramClient {
    pub fn new(urls: LeastUsedPool, tokens: LeastUsedPool) -> Result<Self, FerryError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FerryError::Remote {
                message: format!("cannot build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self { http, urls, tokens })
    }

    /// The base-URL pool (exposed for startup validation).
    pub fn url_pool(&self) -> &LeastUsedPool {
        &self.urls
    }

    /// The token pool.
    pub fn token_pool(&self) -> &LeastUsedPool {
        &self.tokens
    }

    /// Checks one token against `getMe`.
    pub async fn test_token(&self, api_url: &str, token: &str) -> bool {
        if api_url.is_empty() || token.is_empty() {
            return false;
        }
        let url = format!("{api_url}/bot{token}/getMe");
        match self.http.get(url).send().await {
            Ok(response) => response
                .json::<ApiResponse>()
                .await
                .map(|body| body.ok)
                .unwrap_or(false),
            Err(e) => {
                debug!(error = %e, "getMe probe failed");
                false
            }
        }
    }

    /// Returns the subset of `tokens` that pass a `getMe` probe, using
    /// the URL pool for the probes.
    pub async fn filter_valid_tokens(&self, tokens: &[String]) -> Vec<String> {
        let mut valid = Vec::new();
        for token in tokens {
            let Some(api_url) = self.urls.get() else { break };
            let ok = self.test_token(&api_url, token).await;
            self.urls.increment(&api_url);
            if ok {
                valid.push(token.clone());
            } else {
                warn!("dropping token that failed getMe validation");
            }
        }
        valid
    }

    async fn do_request(
        &self,
        path: &str,
        payload: Payload<'_>,
        retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        let max_retries = retry.max_retries.max(1);
        let mut last_error = None;

        for attempt in 1..=max_retries {
            if attempt > 1 {
                tokio::time::sleep(retry.delay).await;
            }
            match self.attempt_once(path, &payload).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(attempt, path, error = %e, "telegram request failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| FerryError::Remote {
            message: "telegram request failed".into(),
            source: None,
        }))
    }

    async fn attempt_once(&self, path: &str, payload: &Payload<'_>) -> Result<(), FerryError> {
        let api_url = self.urls.get().ok_or_else(|| FerryError::Remote {
            message: "no api url available".into(),
            source: None,
        })?;
        let token = self.tokens.get().ok_or_else(|| FerryError::Remote {
            message: "no credential available".into(),
            source: None,
        })?;
        self.urls.increment(&api_url);

        let url = format!("{api_url}/bot{token}{path}");
        let request = match payload {
            Payload::Form(params) => self.http.post(&url).form(params),
            Payload::Multipart { fields, files } => {
                let mut form = Form::new();
                for (name, value) in fields {
                    form = form.text(*name, value.clone());
                }
                for (field, file) in files {
                    let part =
                        Part::bytes(file.data.clone()).file_name(file.filename.clone());
                    form = form.part(field.clone(), part);
                }
                self.http.post(&url).multipart(form)
            }
        };

        let response = request.send().await.map_err(|e| FerryError::Remote {
            message: format!("request to {path} failed: {e}"),
            source: Some(Box::new(e)),
        })?;
        let body: ApiResponse = response.json().await.map_err(|e| FerryError::Remote {
            message: format!("cannot parse response from {path}: {e}"),
            source: Some(Box::new(e)),
        })?;

        if body.ok {
            self.tokens.increment(&token);
            return Ok(());
        }

        if let Some(cool_off) = body.retry_after() {
            warn!(seconds = cool_off.as_secs(), "honouring api cool-off");
            tokio::time::sleep(cool_off).await;
        }
        if body.is_auth_failure() {
            warn!("credential rejected by the api, evicting from pool");
            self.tokens.remove(&token);
        }

        Err(FerryError::Remote {
            message: format!("telegram request failed: {}", body.describe()),
            source: None,
        })
    }

    fn target_fields(target: &ChatTarget) -> Vec<(&'static str, String)> {
        let mut fields = vec![("chat_id", target.chat_id.clone())];
        if let Some(topic_id) = target.topic_id {
            fields.push(("message_thread_id", topic_id.to_string()));
        }
        fields
    }
}

#[async_trait]
impl RemoteClient for TelegramClient {
    async fn send_text(
        &self,
        target: &ChatTarget,
        text: &str,
        retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        let mut params = Self::target_fields(target);
        params.push(("text", text.to_string()));
        self.do_request("/sendMessage", Payload::Form(params), retry)
            .await
    }

    async fn send_media_batch(
        &self,
        target: &ChatTarget,
        batch: &[MediaFile],
        retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        let mut fields = Self::target_fields(target);
        let mut files = Vec::with_capacity(batch.len());
        let mut descriptors = Vec::with_capacity(batch.len());
        for (index, file) in batch.iter().enumerate() {
            let field = format!("file{index}");
            descriptors.push(serde_json::json!({
                "type": "photo",
                "media": format!("attach://{field}"),
            }));
            files.push((field, file));
        }
        let media = serde_json::to_string(&descriptors).map_err(|e| FerryError::Remote {
            message: format!("cannot encode media descriptors: {e}"),
            source: Some(Box::new(e)),
        })?;
        fields.push(("media", media));

        self.do_request("/sendMediaGroup", Payload::Multipart { fields, files }, retry)
            .await
    }

    async fn send_document(
        &self,
        target: &ChatTarget,
        file: &MediaFile,
        retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        self.send_single("/sendDocument", "document", target, file, retry)
            .await
    }

    async fn send_video(
        &self,
        target: &ChatTarget,
        file: &MediaFile,
        retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        self.send_single("/sendVideo", "video", target, file, retry)
            .await
    }

    async fn send_audio(
        &self,
        target: &ChatTarget,
        file: &MediaFile,
        retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        self.send_single("/sendAudio", "audio", target, file, retry)
            .await
    }
}

impl TelegramClient {
    async fn send_single(
        &self,
        path: &str,
        field: &str,
        target: &ChatTarget,
        file: &MediaFile,
        retry: RetryPolicy,
    ) -> Result<(), FerryError> {
        let fields = Self::target_fields(target);
        let files = vec![(field.to_string(), file)];
        self.do_request(path, Payload::Multipart { fields, files }, retry)
            .await
    }
}

// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible chat completion endpoints.
//!
//! Provides [`ChatClient`], which handles request construction, bearer
//! authentication, error-status mapping, and streaming SSE decode. It is the
//! production implementation of [`CompletionBackend`].

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use quill_core::{ChatConfig, CompletionBackend, FragmentStream, QuillError, Turn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, warn};

use crate::sse::SseDecoder;
use crate::types::{ApiErrorResponse, CompletionRequest, CompletionResponse};

/// Bounded wait for the buffered (non-streaming) path.
const BUFFERED_TIMEOUT: Duration = Duration::from_secs(30);

/// Liveness deadline per chunk read on the streaming path. The stream as a
/// whole has no overall deadline.
const CHUNK_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// HTTP client for one configured endpoint, model, and credential.
///
/// Cheap to construct; the pipeline rebuilds it whenever the configuration
/// changes.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    buffered_timeout: Duration,
}

impl ChatClient {
    /// Creates a client from the current configuration.
    pub fn new(config: &ChatConfig) -> Result<Self, QuillError> {
        let mut headers = HeaderMap::new();
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.api_key))
            .map_err(|e| QuillError::Internal(format!("invalid API key header value: {e}")))?;
        bearer.set_sensitive(true);
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| QuillError::TransportFailure {
                source: Box::new(e),
            })?;

        Ok(Self {
            http,
            endpoint: format!(
                "{}/v1/chat/completions",
                config.api_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            buffered_timeout: BUFFERED_TIMEOUT,
        })
    }

    /// Overrides the buffered-path timeout (for testing slow endpoints).
    #[cfg(test)]
    fn with_buffered_timeout(mut self, timeout: Duration) -> Self {
        self.buffered_timeout = timeout;
        self
    }

    fn request(&self, turns: &[Turn], stream: bool) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: turns.to_vec(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        }
    }

    /// Buffered mode: single call, full reply text.
    async fn complete_inner(&self, turns: &[Turn]) -> Result<String, QuillError> {
        let response = self
            .http
            .post(&self.endpoint)
            .timeout(self.buffered_timeout)
            .json(&self.request(turns, false))
            .send()
            .await
            .map_err(|e| map_transport(e, self.buffered_timeout))?;

        let status = response.status();
        debug!(status = %status, "completion response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &body));
        }

        let parsed: CompletionResponse =
            response
                .json()
                .await
                .map_err(|e| QuillError::TransportFailure {
                    source: Box::new(e),
                })?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default())
    }

    /// Streaming mode: opens a new connection and decodes fragments lazily.
    async fn open_stream_inner(&self, turns: &[Turn]) -> Result<FragmentStream, QuillError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&self.request(turns, true))
            .send()
            .await
            .map_err(|e| map_transport(e, self.buffered_timeout))?;

        let status = response.status();
        debug!(status = %status, "streaming response received");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, &body));
        }

        struct DecodeState {
            body: BoxStream<'static, reqwest::Result<bytes::Bytes>>,
            decoder: SseDecoder,
            queue: VecDeque<String>,
        }

        let state = DecodeState {
            body: response.bytes_stream().boxed(),
            decoder: SseDecoder::new(),
            queue: VecDeque::new(),
        };

        let fragments = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(fragment) = state.queue.pop_front() {
                    return Some((Ok(fragment), state));
                }
                if state.decoder.is_done() {
                    return None;
                }
                match tokio::time::timeout(CHUNK_READ_TIMEOUT, state.body.next()).await {
                    Err(_) => {
                        warn!("stream chunk read exceeded liveness deadline");
                        return Some((
                            Err(QuillError::Timeout {
                                duration: CHUNK_READ_TIMEOUT,
                            }),
                            state,
                        ));
                    }
                    Ok(None) => return None,
                    Ok(Some(Err(error))) => {
                        return Some((Err(map_transport(error, CHUNK_READ_TIMEOUT)), state));
                    }
                    Ok(Some(Ok(bytes))) => {
                        state.queue.extend(state.decoder.feed(&bytes));
                    }
                }
            }
        });

        Ok(FragmentStream::new(Box::pin(fragments)))
    }
}

#[async_trait]
impl CompletionBackend for ChatClient {
    async fn complete(&self, turns: &[Turn]) -> Result<String, QuillError> {
        self.complete_inner(turns).await
    }

    async fn open_stream(&self, turns: &[Turn]) -> Result<FragmentStream, QuillError> {
        self.open_stream_inner(turns).await
    }
}

/// Maps a non-2xx status (plus its body) to the error taxonomy.
fn map_status(status: reqwest::StatusCode, body: &str) -> QuillError {
    match status.as_u16() {
        401 => QuillError::InvalidCredential,
        429 => QuillError::RateLimited,
        _ => {
            let message = serde_json::from_str::<ApiErrorResponse>(body)
                .map(|parsed| parsed.error.message)
                .unwrap_or_else(|_| status.to_string());
            QuillError::RequestFailed { message }
        }
    }
}

/// Maps a reqwest transport-level failure to the error taxonomy.
fn map_transport(error: reqwest::Error, deadline: Duration) -> QuillError {
    if error.is_timeout() {
        QuillError::Timeout { duration: deadline }
    } else {
        QuillError::TransportFailure {
            source: Box::new(error),
        }
    }
}

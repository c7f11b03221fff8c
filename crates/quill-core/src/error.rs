// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Quill chat client.

use thiserror::Error;

/// The primary error type used across the Quill workspace.
///
/// Display strings are for logs and diagnostics; the strings shown to the
/// user (and baked into a failed assistant message) come from
/// [`QuillError::user_message`].
#[derive(Debug, Error)]
pub enum QuillError {
    /// No API key is configured; nothing was sent.
    #[error("no API key configured")]
    MissingCredential,

    /// The API rejected the configured credential (HTTP 401).
    #[error("API rejected the configured credential")]
    InvalidCredential,

    /// The API rate-limited the request (HTTP 429).
    #[error("request was rate limited")]
    RateLimited,

    /// The request or a stream chunk read exceeded its deadline.
    #[error("request timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// The API returned a non-2xx status not covered above.
    #[error("API request failed: {message}")]
    RequestFailed { message: String },

    /// Network or transport-layer failure below the HTTP status level.
    #[error("transport failure: {source}")]
    TransportFailure {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A second send was issued for a session whose turn is still in flight.
    #[error("a turn is already in flight for this session")]
    TurnInFlight,

    /// Persistent store errors (I/O, serialization). Non-fatal: recovered
    /// locally with logging, never surfaced to the user.
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl QuillError {
    /// The user-facing message for this error, as shown in the chat UI and
    /// written into a failed assistant message.
    pub fn user_message(&self) -> String {
        match self {
            QuillError::MissingCredential => "请先配置API密钥".to_string(),
            QuillError::InvalidCredential => "API密钥无效，请检查配置".to_string(),
            QuillError::RateLimited => "请求过于频繁，请稍后再试".to_string(),
            QuillError::Timeout { .. } => "请求超时，请检查网络连接".to_string(),
            QuillError::RequestFailed { message } => format!("API请求失败: {message}"),
            QuillError::TurnInFlight => "当前会话正在回复中，请稍候".to_string(),
            QuillError::TransportFailure { .. }
            | QuillError::Storage { .. }
            | QuillError::Internal(_) => "发送消息失败，请重试".to_string(),
        }
    }
}

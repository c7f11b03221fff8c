// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Request/response wire types for OpenAI-compatible chat completion APIs.

use quill_core::Turn;
use serde::{Deserialize, Serialize};

// --- Request types ---

/// A request to `POST {api_url}/v1/chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    /// Model identifier (e.g., "gpt-4o-mini").
    pub model: String,

    /// Conversation history, oldest first, ending with the user turn.
    pub messages: Vec<Turn>,

    /// Sampling temperature in `[0, 1]`.
    pub temperature: f32,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Whether to stream the response as SSE.
    pub stream: bool,
}

// --- Non-streaming response types ---

/// A full (buffered) completion response.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
}

/// One choice in a buffered response.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    pub message: ChoiceMessage,
}

/// The assistant message inside a buffered choice.
#[derive(Debug, Clone, Deserialize)]
pub struct ChoiceMessage {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub role: Option<String>,
}

// --- Streaming response types ---

/// One `data: <json>` payload from the streaming response.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamPayload {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

/// One choice in a stream payload.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
}

/// Incremental content fragment within a stream choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

impl StreamPayload {
    /// The content fragment of this payload, if any.
    pub fn fragment(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }
}

// --- Error response types ---

/// Error body returned by the API on non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorDetail,
}

/// Detail object within an API error body.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::Role;

    #[test]
    fn request_serializes_the_documented_shape() {
        let request = CompletionRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Turn {
                role: Role::User,
                content: "Hello".into(),
            }],
            temperature: 0.7,
            max_tokens: 2000,
            stream: true,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 2000);
        assert_eq!(json["stream"], true);
    }

    #[test]
    fn stream_payload_extracts_the_fragment() {
        let payload: StreamPayload =
            serde_json::from_str(r#"{"choices":[{"delta":{"content":"Hi"}}]}"#).unwrap();
        assert_eq!(payload.fragment(), Some("Hi"));
    }

    #[test]
    fn role_only_delta_has_no_fragment() {
        let payload: StreamPayload =
            serde_json::from_str(r#"{"choices":[{"delta":{"role":"assistant"}}]}"#).unwrap();
        assert_eq!(payload.fragment(), None);
    }

    #[test]
    fn empty_choices_has_no_fragment() {
        let payload: StreamPayload = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(payload.fragment(), None);
    }
}

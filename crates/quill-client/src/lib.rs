// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for OpenAI-compatible `/v1/chat/completions` endpoints.
//!
//! [`ChatClient`] implements [`quill_core::CompletionBackend`] with a
//! buffered path and a streaming path; the streaming path decodes
//! `data: <json>` SSE lines incrementally via [`sse::SseDecoder`].

pub mod client;
pub mod sse;
pub mod types;

pub use client::ChatClient;
pub use sse::SseDecoder;

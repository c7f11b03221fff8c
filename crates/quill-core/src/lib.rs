// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Quill chat client.
//!
//! This crate provides the error taxonomy, domain types (sessions, messages,
//! configuration), and the [`CompletionBackend`] trait that the message
//! pipeline drives. Concrete backends (HTTP client, test mocks) live in
//! sibling crates.

pub mod backend;
pub mod config;
pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use backend::{CompletionBackend, FragmentStream};
pub use config::{ChatConfig, ConfigPatch};
pub use error::QuillError;
pub use types::{
    FileAttachment, Message, MessageDraft, MessageId, MessagePatch, Role, Session, SessionId,
    Theme, Turn,
};

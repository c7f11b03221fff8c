// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session repository and streaming message pipeline.
//!
//! [`SessionRepository`] is the in-memory authoritative owner of sessions
//! and messages. [`ChatStore`] wraps it with the send pipeline (credential
//! guard, placeholder management, incremental stream application, debounced
//! persistence) and is the surface every UI consumes.

pub mod chat_store;
pub mod repository;

pub use chat_store::{ChatEvent, ChatStore};
pub use repository::SessionRepository;

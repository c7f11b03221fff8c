// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared across the Quill workspace.
//!
//! Sessions and messages serialize with camelCase field names and ISO-8601
//! timestamps; this is the shape the persistent store writes and reads back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a message within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The author of a message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// UI color theme, persisted as a bare scalar slot.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    #[default]
    Dark,
}

/// A single chat message, owned by its parent [`Session`].
///
/// Immutable once `is_streaming` is false, with one exception: a failed
/// assistant message has its content overwritten with the error text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    /// True while the assistant reply is still accumulating fragments.
    #[serde(default)]
    pub is_streaming: bool,
}

/// A titled, ordered conversation thread.
///
/// Message order is insertion order and insertion order is chronological.
/// `updated_at` is refreshed on every mutation to the title or messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: SessionId,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller supplies when appending a message; id and timestamp are
/// assigned by the repository.
#[derive(Debug, Clone)]
pub struct MessageDraft {
    pub content: String,
    pub role: Role,
    pub is_streaming: bool,
}

impl MessageDraft {
    /// A user message with the given content.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: Role::User,
            is_streaming: false,
        }
    }

    /// An empty assistant placeholder, reserving its position in the
    /// sequence before any content has streamed in.
    pub fn assistant_placeholder() -> Self {
        Self {
            content: String::new(),
            role: Role::Assistant,
            is_streaming: true,
        }
    }
}

/// Partial update merged into an existing message; unset fields are kept.
#[derive(Debug, Clone, Default)]
pub struct MessagePatch {
    pub content: Option<String>,
    pub is_streaming: Option<bool>,
}

/// The role+content projection of a message sent to the completion API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for Turn {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role,
            content: msg.content.clone(),
        }
    }
}

/// Descriptive metadata for a file attached to a send.
///
/// Attachments are rendered as manifest lines in the message text; no
/// binary content is uploaded.
#[derive(Debug, Clone, PartialEq)]
pub struct FileAttachment {
    pub name: String,
    pub size: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn role_round_trips_through_display() {
        for role in [Role::User, Role::Assistant] {
            let s = role.to_string();
            assert_eq!(Role::from_str(&s).unwrap(), role);
        }
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn theme_defaults_to_dark() {
        assert_eq!(Theme::default(), Theme::Dark);
        assert_eq!(Theme::Light.to_string(), "light");
    }

    #[test]
    fn message_serializes_camel_case_with_iso_timestamp() {
        let msg = Message {
            id: MessageId("m-1".into()),
            content: "hi".into(),
            role: Role::User,
            timestamp: DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z")
                .unwrap()
                .with_timezone(&Utc),
            is_streaming: false,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["isStreaming"], false);
        assert!(json["timestamp"].as_str().unwrap().starts_with("2026-01-02T03:04:05"));
    }

    #[test]
    fn message_missing_streaming_flag_defaults_false() {
        let json = r#"{"id":"m-1","content":"hi","role":"assistant","timestamp":"2026-01-02T03:04:05Z"}"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert!(!msg.is_streaming);
        assert_eq!(msg.role, Role::Assistant);
    }

    #[test]
    fn session_round_trips_through_json() {
        let now = Utc::now();
        let session = Session {
            id: SessionId::generate(),
            title: "测试会话".into(),
            messages: vec![Message {
                id: MessageId::generate(),
                content: "hello".into(),
                role: Role::User,
                timestamp: now,
                is_streaming: false,
            }],
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_string(&session).unwrap();
        let restored: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, session);
    }

    #[test]
    fn turn_projects_role_and_content_only() {
        let msg = Message {
            id: MessageId("m-1".into()),
            content: "hello".into(),
            role: Role::Assistant,
            timestamp: Utc::now(),
            is_streaming: true,
        };
        let turn = Turn::from(&msg);
        assert_eq!(turn.role, Role::Assistant);
        assert_eq!(turn.content, "hello");
        let json = serde_json::to_value(&turn).unwrap();
        assert_eq!(json, serde_json::json!({"role": "assistant", "content": "hello"}));
    }
}

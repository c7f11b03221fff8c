// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory authoritative collection of sessions and messages.
//!
//! The repository is the single writer for session state: every other
//! component holds read-only snapshots. Each mutation bumps a revision
//! counter so observers and the persistence scheduler can detect change
//! without diffing the collection.

use chrono::Utc;
use quill_core::{Message, MessageDraft, MessageId, MessagePatch, Session, SessionId};
use tracing::debug;

/// Title given to a session before its first message derives one.
pub const DEFAULT_TITLE: &str = "新对话";

/// Owner of the session collection and the current-session pointer.
///
/// Invariants upheld here:
/// - the pointer, when set, references an existing session (self-healing on
///   delete and on restore from persisted state);
/// - message order within a session is append order;
/// - message ids are unique within a session.
#[derive(Debug, Default)]
pub struct SessionRepository {
    sessions: Vec<Session>,
    current: Option<SessionId>,
    revision: u64,
}

impl SessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores persisted state, validating the pointer: an id that no
    /// longer resolves falls back to the head session, or to none.
    pub fn from_parts(sessions: Vec<Session>, current: Option<SessionId>) -> Self {
        let current = current
            .filter(|id| sessions.iter().any(|s| &s.id == id))
            .or_else(|| sessions.first().map(|s| s.id.clone()));
        Self {
            sessions,
            current,
            revision: 0,
        }
    }

    // --- Reads ---

    /// All sessions, newest first.
    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.current.clone()
    }

    pub fn current_session(&self) -> Option<&Session> {
        let id = self.current.as_ref()?;
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    /// Monotonic mutation counter; unequal revisions imply changed state.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Clones the collection for the persistence scheduler.
    pub fn snapshot(&self) -> Vec<Session> {
        self.sessions.clone()
    }

    // --- Mutations ---

    /// Creates an empty session at the head of the collection and makes it
    /// current. Returns a copy of the new session.
    pub fn create_session(&mut self) -> Session {
        let now = Utc::now();
        let session = Session {
            id: SessionId::generate(),
            title: DEFAULT_TITLE.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        debug!(session_id = %session.id, "created session");
        self.sessions.insert(0, session.clone());
        self.current = Some(session.id.clone());
        self.revision += 1;
        session
    }

    /// Removes a session and cascades its messages. Idempotent: deleting an
    /// unknown id is a no-op. If the deleted session was current, the
    /// pointer moves to the new head of the remaining collection, or to
    /// none. Returns whether a session was removed.
    pub fn delete_session(&mut self, id: &SessionId) -> bool {
        let before = self.sessions.len();
        self.sessions.retain(|s| &s.id != id);
        if self.sessions.len() == before {
            return false;
        }
        if self.current.as_ref() == Some(id) {
            self.current = self.sessions.first().map(|s| s.id.clone());
        }
        self.revision += 1;
        true
    }

    /// Sets a session's title. No-op on an unknown id, and a rename to the
    /// identical title neither bumps `updated_at` nor counts as a change.
    /// Returns whether anything changed.
    pub fn rename_session(&mut self, id: &SessionId, title: &str) -> bool {
        let Some(session) = self.sessions.iter_mut().find(|s| &s.id == id) else {
            return false;
        };
        if session.title == title {
            return false;
        }
        session.title = title.to_string();
        session.updated_at = Utc::now();
        self.revision += 1;
        true
    }

    /// Points the current-session pointer at an existing session. Returns
    /// false (leaving the pointer untouched) for an unknown id.
    pub fn select_session(&mut self, id: &SessionId) -> bool {
        if self.sessions.iter().any(|s| &s.id == id) {
            self.current = Some(id.clone());
            true
        } else {
            false
        }
    }

    /// Assigns an id and timestamp to the draft and appends it to the
    /// target session, bumping `updated_at`. Returns `None` when the
    /// session id does not resolve; callers re-resolve the current session
    /// before appending.
    pub fn append_message(&mut self, session_id: &SessionId, draft: MessageDraft) -> Option<Message> {
        let session = self.sessions.iter_mut().find(|s| &s.id == session_id)?;
        let message = Message {
            id: MessageId::generate(),
            content: draft.content,
            role: draft.role,
            timestamp: Utc::now(),
            is_streaming: draft.is_streaming,
        };
        session.messages.push(message.clone());
        session.updated_at = Utc::now();
        self.revision += 1;
        Some(message)
    }

    /// Merges the patch into the matching message and bumps the session's
    /// `updated_at`. No-op when either id is absent. Returns whether a
    /// message was updated.
    pub fn update_message(
        &mut self,
        session_id: &SessionId,
        message_id: &MessageId,
        patch: MessagePatch,
    ) -> bool {
        let Some(session) = self.sessions.iter_mut().find(|s| &s.id == session_id) else {
            return false;
        };
        let Some(message) = session.messages.iter_mut().find(|m| &m.id == message_id) else {
            return false;
        };
        if let Some(content) = patch.content {
            message.content = content;
        }
        if let Some(is_streaming) = patch.is_streaming {
            message.is_streaming = is_streaming;
        }
        session.updated_at = Utc::now();
        self.revision += 1;
        true
    }
}

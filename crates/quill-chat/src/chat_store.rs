// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The chat store: message pipeline and UI-facing surface.
//!
//! One `ChatStore` is constructed at process start (restoring persisted
//! state) and passed by reference to every consumer; teardown goes through
//! [`ChatStore::shutdown`], which force-flushes pending writes.
//!
//! A send operation moves through the states:
//! guard -> session resolution -> user message appended -> assistant
//! placeholder appended -> streaming -> finalized (or failed). Exactly one
//! turn may be in flight per session; repository mutations happen inside a
//! short-lived lock that is never held across an await, so observers always
//! see complete mutations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use quill_client::ChatClient;
use quill_core::{
    ChatConfig, CompletionBackend, ConfigPatch, FileAttachment, MessageDraft, MessageId,
    MessagePatch, QuillError, Session, SessionId, Theme, Turn,
};
use quill_store::{FileStore, PersistScheduler};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::repository::SessionRepository;

/// Longest auto-derived session title, in characters.
const TITLE_LIMIT: usize = 30;

/// Change notifications for observers (UI re-render path).
#[derive(Debug, Clone)]
pub enum ChatEvent {
    /// The session collection or a session's metadata changed.
    SessionsChanged,
    /// The streaming assistant message grew; `content` is the full
    /// accumulated text so far.
    AssistantDelta {
        session_id: SessionId,
        message_id: MessageId,
        content: String,
    },
    /// A turn finished (including user-initiated cancellation).
    TurnCompleted { session_id: SessionId },
    /// A turn failed; `message` is the user-facing error string.
    TurnFailed {
        session_id: SessionId,
        message: String,
    },
}

struct StoreState {
    repo: SessionRepository,
    config: ChatConfig,
    theme: Theme,
    error: Option<String>,
    /// Cancellation token per session with a turn in flight; doubles as the
    /// busy guard.
    turns: HashMap<SessionId, CancellationToken>,
}

/// Owner of all chat state and the pipeline that mutates it.
pub struct ChatStore {
    state: Mutex<StoreState>,
    file_store: Arc<FileStore>,
    scheduler: Arc<PersistScheduler>,
    events: broadcast::Sender<ChatEvent>,
    backend_override: Option<Arc<dyn CompletionBackend>>,
}

impl ChatStore {
    /// Restores persisted state and wires up the persistence scheduler.
    pub fn open(file_store: Arc<FileStore>) -> Self {
        let sessions = file_store.load_sessions();
        let mut config = ChatConfig::default();
        file_store.load_config().apply_to(&mut config);
        let repo = SessionRepository::from_parts(sessions, file_store.current_session_id());
        let theme = file_store.theme();
        info!(
            dir = %file_store.dir().display(),
            sessions = repo.sessions().len(),
            has_credential = config.has_credential(),
            "chat store restored"
        );

        let store = Self {
            state: Mutex::new(StoreState {
                repo,
                config,
                theme,
                error: None,
                turns: HashMap::new(),
            }),
            scheduler: PersistScheduler::new(Arc::clone(&file_store)),
            file_store,
            events: broadcast::channel(64).0,
            backend_override: None,
        };
        // The restore may have healed a dangling pointer; persist the result.
        store.persist_pointer();
        store
    }

    /// Like [`open`](Self::open), but drives the given backend instead of
    /// building an HTTP client from the config. Used by tests and embedders.
    pub fn open_with_backend(
        file_store: Arc<FileStore>,
        backend: Arc<dyn CompletionBackend>,
    ) -> Self {
        let mut store = Self::open(file_store);
        store.backend_override = Some(backend);
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().expect("chat store lock poisoned")
    }

    fn emit(&self, event: ChatEvent) {
        // No receivers is fine; observers are optional.
        let _ = self.events.send(event);
    }

    /// Immediate scalar write; storage failures are logged, not surfaced.
    fn persist_pointer(&self) {
        let id = self.lock().repo.current_session_id();
        if let Err(e) = self.file_store.set_current_session_id(id.as_ref()) {
            warn!(error = %e, "failed to persist current-session pointer");
        }
    }

    fn schedule_snapshot(&self) {
        let snapshot = self.lock().repo.snapshot();
        self.scheduler.schedule_sessions(snapshot);
    }

    fn backend_for(&self, config: &ChatConfig) -> Result<Arc<dyn CompletionBackend>, QuillError> {
        if let Some(backend) = &self.backend_override {
            return Ok(Arc::clone(backend));
        }
        Ok(Arc::new(ChatClient::new(config)?))
    }

    // --- Read surface ---

    pub fn sessions(&self) -> Vec<Session> {
        self.lock().repo.snapshot()
    }

    pub fn current_session(&self) -> Option<Session> {
        self.lock().repo.current_session().cloned()
    }

    pub fn current_session_id(&self) -> Option<SessionId> {
        self.lock().repo.current_session_id()
    }

    /// Whether any turn is in flight.
    pub fn is_loading(&self) -> bool {
        !self.lock().turns.is_empty()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn config(&self) -> ChatConfig {
        self.lock().config.clone()
    }

    pub fn theme(&self) -> Theme {
        self.lock().theme
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    // --- Session management ---

    pub fn create_session(&self) -> Session {
        let session = self.lock().repo.create_session();
        self.persist_pointer();
        self.schedule_snapshot();
        self.emit(ChatEvent::SessionsChanged);
        session
    }

    /// Deletes a session (no-op on unknown ids). An in-flight turn for the
    /// session is cancelled first.
    pub fn delete_session(&self, id: &SessionId) {
        let removed = {
            let mut state = self.lock();
            if let Some(token) = state.turns.get(id) {
                token.cancel();
            }
            state.repo.delete_session(id)
        };
        if removed {
            self.persist_pointer();
            self.schedule_snapshot();
            self.emit(ChatEvent::SessionsChanged);
        }
    }

    pub fn rename_session(&self, id: &SessionId, title: &str) {
        if self.lock().repo.rename_session(id, title) {
            self.schedule_snapshot();
            self.emit(ChatEvent::SessionsChanged);
        }
    }

    pub fn select_session(&self, id: &SessionId) -> bool {
        let selected = self.lock().repo.select_session(id);
        if selected {
            self.persist_pointer();
        }
        selected
    }

    // --- Config and theme ---

    /// Merges a partial update into the config; a debounced write follows.
    pub fn update_config(&self, patch: ConfigPatch) {
        let snapshot = {
            let mut state = self.lock();
            patch.apply_to(&mut state.config);
            // Keep the documented parameter ranges.
            state.config.temperature = state.config.temperature.clamp(0.0, 1.0);
            if state.config.max_tokens == 0 {
                warn!("ignoring max_tokens of 0, keeping 1");
                state.config.max_tokens = 1;
            }
            state.config.clone()
        };
        self.scheduler.schedule_config(snapshot);
    }

    /// Sets the theme and persists it immediately (cheap scalar write).
    pub fn set_theme(&self, theme: Theme) {
        self.lock().theme = theme;
        if let Err(e) = self.file_store.set_theme(theme) {
            warn!(error = %e, "failed to persist theme");
        }
    }

    pub fn clear_error(&self) {
        self.lock().error = None;
    }

    // --- Pipeline ---

    /// Sends a user message in the current session (creating one if none is
    /// current) and streams the assistant reply into a placeholder message.
    ///
    /// On failure the placeholder is overwritten with the user-facing error
    /// text and the typed error propagates; the user's message is never
    /// rolled back. A cancelled turn finalizes with its partial content and
    /// returns `Ok`.
    pub async fn send(
        &self,
        content: &str,
        files: &[FileAttachment],
    ) -> Result<(), QuillError> {
        let config = {
            let mut state = self.lock();
            if !state.config.has_credential() {
                let err = QuillError::MissingCredential;
                state.error = Some(err.user_message());
                return Err(err);
            }
            state.config.clone()
        };
        let backend = match self.backend_for(&config) {
            Ok(backend) => backend,
            Err(err) => {
                self.lock().error = Some(err.user_message());
                return Err(err);
            }
        };

        let (session_id, placeholder_id, history, token, created) = {
            let mut state = self.lock();
            let (session_id, created) = match state.repo.current_session_id() {
                Some(id) => (id, false),
                None => (state.repo.create_session().id, true),
            };
            if state.turns.contains_key(&session_id) {
                let err = QuillError::TurnInFlight;
                state.error = Some(err.user_message());
                return Err(err);
            }

            let first_message = state
                .repo
                .session(&session_id)
                .is_some_and(|s| s.messages.is_empty());

            let message_content = assemble_content(content, files);
            state
                .repo
                .append_message(&session_id, MessageDraft::user(message_content))
                .ok_or_else(|| QuillError::Internal("current session vanished".into()))?;

            // The title derives from the raw input, not the file manifest.
            if first_message {
                state.repo.rename_session(&session_id, &derive_title(content));
            }

            let placeholder = state
                .repo
                .append_message(&session_id, MessageDraft::assistant_placeholder())
                .ok_or_else(|| QuillError::Internal("current session vanished".into()))?;

            // History for the API: everything except the placeholder.
            let session = state
                .repo
                .session(&session_id)
                .expect("session exists, just appended");
            let history: Vec<Turn> = session
                .messages
                .iter()
                .filter(|m| m.id != placeholder.id)
                .map(Turn::from)
                .collect();

            let token = CancellationToken::new();
            state.turns.insert(session_id.clone(), token.clone());
            state.error = None;
            (session_id, placeholder.id, history, token, created)
        };

        if created {
            self.persist_pointer();
        }
        self.schedule_snapshot();
        self.emit(ChatEvent::SessionsChanged);

        let result = self
            .drive_turn(backend, &session_id, &placeholder_id, &history, &token)
            .await;

        {
            let mut state = self.lock();
            state.turns.remove(&session_id);
            if let Err(err) = &result {
                state.error = Some(err.user_message());
            }
        }
        result
    }

    /// Drives the stream, applying fragments in arrival order.
    async fn drive_turn(
        &self,
        backend: Arc<dyn CompletionBackend>,
        session_id: &SessionId,
        message_id: &MessageId,
        history: &[Turn],
        token: &CancellationToken,
    ) -> Result<(), QuillError> {
        let mut accumulator = String::new();

        let opened = tokio::select! {
            _ = token.cancelled() => None,
            result = backend.open_stream(history) => Some(result),
        };
        let mut stream = match opened {
            None => {
                debug!(session_id = %session_id, "turn cancelled before the stream opened");
                self.finalize_turn(session_id, message_id, accumulator);
                return Ok(());
            }
            Some(Ok(stream)) => stream,
            Some(Err(err)) => {
                self.fail_turn(session_id, message_id, &err);
                return Err(err);
            }
        };

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(session_id = %session_id, "turn cancelled mid-stream");
                    stream.cancel();
                    break;
                }
                fragment = stream.next_fragment() => match fragment {
                    None => break,
                    Some(Ok(fragment)) => {
                        accumulator.push_str(&fragment);
                        self.apply_delta(session_id, message_id, &accumulator);
                    }
                    Some(Err(err)) => {
                        self.fail_turn(session_id, message_id, &err);
                        return Err(err);
                    }
                },
            }
        }

        self.finalize_turn(session_id, message_id, accumulator);
        Ok(())
    }

    fn apply_delta(&self, session_id: &SessionId, message_id: &MessageId, accumulated: &str) {
        self.lock().repo.update_message(
            session_id,
            message_id,
            MessagePatch {
                content: Some(accumulated.to_string()),
                is_streaming: Some(true),
            },
        );
        self.schedule_snapshot();
        self.emit(ChatEvent::AssistantDelta {
            session_id: session_id.clone(),
            message_id: message_id.clone(),
            content: accumulated.to_string(),
        });
    }

    /// Freezes the assistant message with whatever has accumulated. Covers
    /// both clean completion and user-initiated cancellation.
    fn finalize_turn(&self, session_id: &SessionId, message_id: &MessageId, accumulated: String) {
        self.lock().repo.update_message(
            session_id,
            message_id,
            MessagePatch {
                content: Some(accumulated),
                is_streaming: Some(false),
            },
        );
        self.schedule_snapshot();
        self.emit(ChatEvent::TurnCompleted {
            session_id: session_id.clone(),
        });
    }

    fn fail_turn(&self, session_id: &SessionId, message_id: &MessageId, err: &QuillError) {
        let message = err.user_message();
        warn!(session_id = %session_id, error = %err, "turn failed");
        self.lock().repo.update_message(
            session_id,
            message_id,
            MessagePatch {
                content: Some(format!("错误: {message}")),
                is_streaming: Some(false),
            },
        );
        self.schedule_snapshot();
        self.emit(ChatEvent::TurnFailed {
            session_id: session_id.clone(),
            message,
        });
    }

    /// Cancels the current session's in-flight turn, if any. The turn
    /// finalizes with its partial content; this is control flow, not a
    /// fault.
    pub fn cancel_current(&self) {
        let state = self.lock();
        if let Some(id) = state.repo.current_session_id() {
            if let Some(token) = state.turns.get(&id) {
                info!(session_id = %id, "cancelling in-flight turn");
                token.cancel();
            }
        }
    }

    /// One buffered round-trip to verify the endpoint and credential.
    pub async fn test_connection(&self) -> bool {
        let config = self.lock().config.clone();
        if !config.has_credential() {
            return false;
        }
        let Ok(backend) = self.backend_for(&config) else {
            return false;
        };
        backend
            .complete(&[Turn {
                role: quill_core::Role::User,
                content: "Hello".into(),
            }])
            .await
            .is_ok()
    }

    /// Factory reset: cancels in-flight turns, drops all in-memory state,
    /// and clears every persisted slot.
    pub fn reset(&self) {
        {
            let mut state = self.lock();
            for token in state.turns.values() {
                token.cancel();
            }
            state.repo = SessionRepository::from_parts(Vec::new(), None);
            state.config = ChatConfig::default();
            state.theme = Theme::default();
            state.error = None;
        }
        if let Err(e) = self.file_store.clear_all() {
            warn!(error = %e, "failed to clear persisted state");
        }
        self.emit(ChatEvent::SessionsChanged);
    }

    /// Force-flushes pending persistence. Call once at process teardown.
    pub fn shutdown(&self) {
        self.scheduler.flush();
    }
}

/// Appends a deterministic manifest line per attachment; attachments are
/// descriptive metadata only, not uploaded content.
fn assemble_content(content: &str, files: &[FileAttachment]) -> String {
    if files.is_empty() {
        return content.to_string();
    }
    let manifest: Vec<String> = files
        .iter()
        .map(|file| format!("[文件: {} ({} bytes)]", file.name, file.size))
        .collect();
    format!("{content}\n\n附件:\n{}", manifest.join("\n"))
}

/// Derives a session title from its first user message.
fn derive_title(content: &str) -> String {
    let mut chars = content.chars();
    let head: String = chars.by_ref().take(TITLE_LIMIT).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_content_is_the_title_verbatim() {
        assert_eq!(derive_title("你好，世界"), "你好，世界");
    }

    #[test]
    fn long_content_is_truncated_at_thirty_chars_with_ellipsis() {
        let content = "a".repeat(45);
        let title = derive_title(&content);
        assert_eq!(title, format!("{}...", "a".repeat(30)));
    }

    #[test]
    fn exactly_thirty_chars_gets_no_ellipsis() {
        let content = "b".repeat(30);
        assert_eq!(derive_title(&content), content);
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let content = "汉".repeat(31);
        let title = derive_title(&content);
        assert_eq!(title, format!("{}...", "汉".repeat(30)));
    }

    #[test]
    fn attachments_render_as_manifest_lines() {
        let files = vec![
            FileAttachment {
                name: "notes.txt".into(),
                size: 120,
            },
            FileAttachment {
                name: "图表.png".into(),
                size: 20480,
            },
        ];
        assert_eq!(
            assemble_content("看看这些", &files),
            "看看这些\n\n附件:\n[文件: notes.txt (120 bytes)]\n[文件: 图表.png (20480 bytes)]"
        );
    }

    #[test]
    fn no_attachments_leaves_content_untouched() {
        assert_eq!(assemble_content("plain", &[]), "plain");
    }
}

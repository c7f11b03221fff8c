// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable slot-file store.
//!
//! Four named slots in one data directory: the session collection and the
//! config as JSON documents, the current-session pointer and the theme as
//! bare scalar files. Writes go through a temp file plus rename so a crash
//! never leaves a half-written slot. Reads degrade: a missing or corrupt
//! slot yields the empty/default value with a warning, never an error.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use quill_core::{ChatConfig, ConfigPatch, QuillError, Session, SessionId, Theme};
use tracing::{debug, warn};

const SESSIONS_SLOT: &str = "sessions.json";
const CONFIG_SLOT: &str = "config.json";
const CURRENT_SESSION_SLOT: &str = "current-session";
const THEME_SLOT: &str = "theme";

/// File-backed persistent store. Pure I/O boundary; no business logic.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) the store at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, QuillError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| QuillError::Storage {
            source: Box::new(e),
        })?;
        Ok(Self { dir })
    }

    fn slot_path(&self, slot: &str) -> PathBuf {
        self.dir.join(slot)
    }

    /// Atomic slot write: temp file in the same directory, then rename.
    fn write_slot(&self, slot: &str, contents: &str) -> Result<(), QuillError> {
        let tmp = self.slot_path(&format!("{slot}.tmp"));
        let target = self.slot_path(slot);
        std::fs::write(&tmp, contents).map_err(|e| QuillError::Storage {
            source: Box::new(e),
        })?;
        if let Err(e) = std::fs::rename(&tmp, &target) {
            // Do not let a failed rename strand the temp file.
            let _ = std::fs::remove_file(&tmp);
            return Err(QuillError::Storage {
                source: Box::new(e),
            });
        }
        Ok(())
    }

    fn read_slot(&self, slot: &str) -> Option<String> {
        match std::fs::read_to_string(self.slot_path(slot)) {
            Ok(contents) => Some(contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(slot, error = %e, "failed to read slot, using default");
                None
            }
        }
    }

    // --- Sessions ---

    /// Loads all persisted sessions; empty on a missing or corrupt slot.
    pub fn load_sessions(&self) -> Vec<Session> {
        let Some(raw) = self.read_slot(SESSIONS_SLOT) else {
            return Vec::new();
        };
        match serde_json::from_str(&raw) {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(error = %e, "corrupt sessions slot, starting empty");
                Vec::new()
            }
        }
    }

    /// Persists the full session collection.
    pub fn save_sessions(&self, sessions: &[Session]) -> Result<(), QuillError> {
        let json = serde_json::to_string(sessions).map_err(|e| QuillError::Storage {
            source: Box::new(e),
        })?;
        debug!(count = sessions.len(), "writing sessions slot");
        self.write_slot(SESSIONS_SLOT, &json)
    }

    // --- Config ---

    /// Loads the persisted config as a patch over compiled defaults; empty
    /// patch on a missing or corrupt slot.
    pub fn load_config(&self) -> ConfigPatch {
        let Some(raw) = self.read_slot(CONFIG_SLOT) else {
            return ConfigPatch::default();
        };
        match serde_json::from_str(&raw) {
            Ok(patch) => patch,
            Err(e) => {
                warn!(error = %e, "corrupt config slot, using defaults");
                ConfigPatch::default()
            }
        }
    }

    /// Persists the full config.
    pub fn save_config(&self, config: &ChatConfig) -> Result<(), QuillError> {
        let json = serde_json::to_string(config).map_err(|e| QuillError::Storage {
            source: Box::new(e),
        })?;
        self.write_slot(CONFIG_SLOT, &json)
    }

    // --- Current session pointer ---

    /// The persisted current-session pointer, if any.
    pub fn current_session_id(&self) -> Option<SessionId> {
        let raw = self.read_slot(CURRENT_SESSION_SLOT)?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(SessionId(trimmed.to_string()))
        }
    }

    /// Persists (or clears) the current-session pointer immediately.
    pub fn set_current_session_id(&self, id: Option<&SessionId>) -> Result<(), QuillError> {
        match id {
            Some(id) => self.write_slot(CURRENT_SESSION_SLOT, &id.0),
            None => match std::fs::remove_file(self.slot_path(CURRENT_SESSION_SLOT)) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(QuillError::Storage {
                    source: Box::new(e),
                }),
            },
        }
    }

    // --- Theme ---

    /// The persisted theme; default on a missing or unrecognized slot.
    pub fn theme(&self) -> Theme {
        self.read_slot(THEME_SLOT)
            .and_then(|raw| Theme::from_str(raw.trim()).ok())
            .unwrap_or_default()
    }

    /// Persists the theme immediately.
    pub fn set_theme(&self, theme: Theme) -> Result<(), QuillError> {
        self.write_slot(THEME_SLOT, &theme.to_string())
    }

    // --- Maintenance ---

    /// Removes every slot, resetting the store to its initial state.
    pub fn clear_all(&self) -> Result<(), QuillError> {
        for slot in [SESSIONS_SLOT, CONFIG_SLOT, CURRENT_SESSION_SLOT, THEME_SLOT] {
            match std::fs::remove_file(self.slot_path(slot)) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(QuillError::Storage {
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(())
    }

    /// The data directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use quill_core::{Message, MessageId, Role};
    use tempfile::tempdir;

    fn make_session(id: &str, title: &str) -> Session {
        let now = Utc::now();
        Session {
            id: SessionId(id.to_string()),
            title: title.to_string(),
            messages: vec![Message {
                id: MessageId::generate(),
                content: "你好".into(),
                role: Role::User,
                timestamp: now,
                is_streaming: false,
            }],
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn open_creates_and_reports_the_data_dir() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("quill-data");
        let store = FileStore::open(&nested).unwrap();

        assert_eq!(store.dir(), nested);
        assert!(nested.is_dir());
    }

    #[test]
    fn sessions_round_trip_preserving_everything() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let sessions = vec![make_session("s-1", "first"), make_session("s-2", "second")];

        store.save_sessions(&sessions).unwrap();
        let restored = store.load_sessions();
        assert_eq!(restored, sessions);
    }

    #[test]
    fn missing_slots_yield_defaults() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        assert!(store.load_sessions().is_empty());
        assert!(store.load_config().is_empty());
        assert!(store.current_session_id().is_none());
        assert_eq!(store.theme(), Theme::Dark);
    }

    #[test]
    fn corrupt_sessions_slot_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("sessions.json"), "{not json").unwrap();

        assert!(store.load_sessions().is_empty());
    }

    #[test]
    fn corrupt_config_slot_degrades_to_defaults() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        std::fs::write(dir.path().join("config.json"), "][").unwrap();

        assert!(store.load_config().is_empty());
    }

    #[test]
    fn config_round_trips_as_a_full_patch() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let config = ChatConfig {
            api_key: "sk-roundtrip".into(),
            model: "gpt-4o".into(),
            ..Default::default()
        };

        store.save_config(&config).unwrap();
        let patch = store.load_config();
        let mut restored = ChatConfig::default();
        patch.apply_to(&mut restored);
        assert_eq!(restored, config);
    }

    #[test]
    fn current_session_pointer_set_and_clear() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        let id = SessionId("s-current".into());

        store.set_current_session_id(Some(&id)).unwrap();
        assert_eq!(store.current_session_id(), Some(id));

        store.set_current_session_id(None).unwrap();
        assert!(store.current_session_id().is_none());
        // Clearing an already absent pointer is fine.
        store.set_current_session_id(None).unwrap();
    }

    #[test]
    fn theme_round_trips() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();

        store.set_theme(Theme::Light).unwrap();
        assert_eq!(store.theme(), Theme::Light);
    }

    #[test]
    fn clear_all_removes_every_slot() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save_sessions(&[make_session("s-1", "t")]).unwrap();
        store.save_config(&ChatConfig::default()).unwrap();
        store
            .set_current_session_id(Some(&SessionId("s-1".into())))
            .unwrap();
        store.set_theme(Theme::Light).unwrap();

        store.clear_all().unwrap();
        assert!(store.load_sessions().is_empty());
        assert!(store.load_config().is_empty());
        assert!(store.current_session_id().is_none());
        assert_eq!(store.theme(), Theme::Dark);
    }

    #[test]
    fn failed_rename_does_not_strand_the_temp_file() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        // A directory squatting on the slot path makes the rename fail.
        std::fs::create_dir(dir.path().join("sessions.json")).unwrap();

        assert!(store.save_sessions(&[make_session("s-1", "t")]).is_err());
        assert!(!dir.path().join("sessions.json.tmp").exists());
    }

    #[test]
    fn writes_leave_no_temp_files_behind() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.save_sessions(&[make_session("s-1", "t")]).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}

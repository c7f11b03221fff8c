// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Debounced persistence scheduler.
//!
//! Decouples high-frequency repository mutations (one per streamed fragment)
//! from the cost of durable writes. Each persisted slot owns exactly one
//! pending-write timer: re-scheduling within the window replaces the pending
//! snapshot and restarts the timer (trailing debounce), so a burst of
//! mutations produces exactly one write whose value is the state after the
//! last mutation. The sessions slot is never written while the snapshot is
//! empty, so an uninitialized process cannot clobber durable state.
//!
//! All writes funnel through this scheduler or the immediate scalar setters
//! on [`FileStore`]; nothing else writes the session or config slots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use quill_core::{ChatConfig, Session};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::FileStore;

/// Debounce window for the session collection.
const SESSION_WINDOW: Duration = Duration::from_millis(1000);

/// Debounce window for the config slot.
const CONFIG_WINDOW: Duration = Duration::from_millis(500);

struct Slot<T> {
    pending: Option<T>,
    timer: Option<JoinHandle<()>>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            pending: None,
            timer: None,
        }
    }
}

/// Coalesces repository mutations into infrequent slot writes.
///
/// Scheduling must happen on a tokio runtime; [`flush`](Self::flush) is
/// synchronous so teardown can force out pending state without one.
pub struct PersistScheduler {
    store: Arc<FileStore>,
    sessions: Mutex<Slot<Vec<Session>>>,
    config: Mutex<Slot<ChatConfig>>,
    session_window: Duration,
    config_window: Duration,
    writes: AtomicU64,
}

impl PersistScheduler {
    /// Creates a scheduler with the standard debounce windows.
    pub fn new(store: Arc<FileStore>) -> Arc<Self> {
        Self::with_windows(store, SESSION_WINDOW, CONFIG_WINDOW)
    }

    /// Creates a scheduler with explicit windows.
    pub fn with_windows(
        store: Arc<FileStore>,
        session_window: Duration,
        config_window: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            store,
            sessions: Mutex::new(Slot::default()),
            config: Mutex::new(Slot::default()),
            session_window,
            config_window,
            writes: AtomicU64::new(0),
        })
    }

    /// Replaces the pending session snapshot and restarts its timer.
    pub fn schedule_sessions(self: &Arc<Self>, snapshot: Vec<Session>) {
        let mut slot = self.sessions.lock().expect("scheduler lock poisoned");
        slot.pending = Some(snapshot);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        let scheduler = Arc::clone(self);
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(scheduler.session_window).await;
            scheduler.flush_sessions();
        }));
    }

    /// Replaces the pending config snapshot and restarts its timer.
    pub fn schedule_config(self: &Arc<Self>, snapshot: ChatConfig) {
        let mut slot = self.config.lock().expect("scheduler lock poisoned");
        slot.pending = Some(snapshot);
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        let scheduler = Arc::clone(self);
        slot.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(scheduler.config_window).await;
            scheduler.flush_config();
        }));
    }

    /// Forced synchronous flush of both slots, for process teardown.
    pub fn flush(&self) {
        {
            let mut slot = self.sessions.lock().expect("scheduler lock poisoned");
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
        }
        {
            let mut slot = self.config.lock().expect("scheduler lock poisoned");
            if let Some(timer) = slot.timer.take() {
                timer.abort();
            }
        }
        self.flush_sessions();
        self.flush_config();
    }

    /// Number of slot writes performed. Diagnostic counter.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    fn flush_sessions(&self) {
        let pending = {
            let mut slot = self.sessions.lock().expect("scheduler lock poisoned");
            slot.timer = None;
            slot.pending.take()
        };
        let Some(snapshot) = pending else { return };
        if snapshot.is_empty() {
            debug!("skipping sessions write, snapshot is empty");
            return;
        }
        match self.store.save_sessions(&snapshot) {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
            // Storage failures are non-fatal: state stays in memory and the
            // next schedule retries.
            Err(e) => warn!(error = %e, "debounced sessions write failed"),
        }
    }

    fn flush_config(&self) {
        let pending = {
            let mut slot = self.config.lock().expect("scheduler lock poisoned");
            slot.timer = None;
            slot.pending.take()
        };
        let Some(snapshot) = pending else { return };
        match self.store.save_config(&snapshot) {
            Ok(()) => {
                self.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!(error = %e, "debounced config write failed"),
        }
    }
}

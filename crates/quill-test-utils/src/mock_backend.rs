// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted backend with FIFO responses.
//!
//! Each `complete` or `open_stream` call consumes the next queued
//! [`Script`]; with the queue empty, the backend answers `"mock response"`.
//! Every call's conversation history is recorded for assertions.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use quill_core::{CompletionBackend, FragmentStream, QuillError, Turn};
use tokio::sync::mpsc;

/// One scripted response.
pub enum Script {
    /// Fragments delivered in order; an `Err` entry fails the stream at
    /// that point.
    Fragments(Vec<Result<String, QuillError>>),
    /// `open_stream` (or `complete`) fails before producing anything.
    OpenError(QuillError),
    /// Fragments arrive as the test sends them; closing the sender ends
    /// the stream. Lets a test hold a turn open mid-stream.
    Channel(mpsc::UnboundedReceiver<Result<String, QuillError>>),
}

#[derive(Default)]
pub struct MockBackend {
    scripts: Mutex<VecDeque<Script>>,
    calls: Mutex<Vec<Vec<Turn>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response.
    pub fn push(&self, script: Script) {
        self.scripts
            .lock()
            .expect("mock backend lock poisoned")
            .push_back(script);
    }

    /// Queues a stream of `Ok` fragments.
    pub fn push_fragments<I, S>(&self, fragments: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.push(Script::Fragments(
            fragments.into_iter().map(|f| Ok(f.into())).collect(),
        ));
    }

    /// Queues a channel-driven stream and returns its sender.
    pub fn push_channel(&self) -> mpsc::UnboundedSender<Result<String, QuillError>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.push(Script::Channel(rx));
        tx
    }

    /// Histories passed to `complete`/`open_stream`, in call order.
    pub fn calls(&self) -> Vec<Vec<Turn>> {
        self.calls
            .lock()
            .expect("mock backend lock poisoned")
            .clone()
    }

    pub fn last_call(&self) -> Option<Vec<Turn>> {
        self.calls
            .lock()
            .expect("mock backend lock poisoned")
            .last()
            .cloned()
    }

    fn record(&self, turns: &[Turn]) {
        self.calls
            .lock()
            .expect("mock backend lock poisoned")
            .push(turns.to_vec());
    }

    fn next_script(&self) -> Script {
        self.scripts
            .lock()
            .expect("mock backend lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Script::Fragments(vec![Ok("mock response".into())]))
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    async fn complete(&self, turns: &[Turn]) -> Result<String, QuillError> {
        self.record(turns);
        match self.next_script() {
            Script::Fragments(fragments) => {
                let mut text = String::new();
                for fragment in fragments {
                    text.push_str(&fragment?);
                }
                Ok(text)
            }
            Script::OpenError(err) => Err(err),
            Script::Channel(mut rx) => {
                let mut text = String::new();
                while let Some(fragment) = rx.recv().await {
                    text.push_str(&fragment?);
                }
                Ok(text)
            }
        }
    }

    async fn open_stream(&self, turns: &[Turn]) -> Result<FragmentStream, QuillError> {
        self.record(turns);
        match self.next_script() {
            Script::Fragments(fragments) => {
                Ok(FragmentStream::new(Box::pin(stream::iter(fragments))))
            }
            Script::OpenError(err) => Err(err),
            Script::Channel(rx) => Ok(FragmentStream::new(Box::pin(stream::unfold(
                rx,
                |mut rx| async move { rx.recv().await.map(|fragment| (fragment, rx)) },
            )))),
        }
    }
}

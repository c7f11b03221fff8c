// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The completion backend trait and the cancellable fragment stream handle.
//!
//! The message pipeline drives a `dyn CompletionBackend`: the HTTP client in
//! `quill-client` implements it against the real API, and the mock backend
//! in `quill-test-utils` implements it for deterministic tests.

use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;

use crate::error::QuillError;
use crate::types::Turn;

/// Boxed stream of decoded text fragments.
pub type BoxFragmentStream = Pin<Box<dyn Stream<Item = Result<String, QuillError>> + Send>>;

/// A backend that produces assistant replies for a conversation history.
///
/// Both modes receive the prior turns in order, ending with the user turn
/// being answered. Generation parameters are captured at backend
/// construction time.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Buffered mode: a single call returning the full reply text.
    async fn complete(&self, turns: &[Turn]) -> Result<String, QuillError>;

    /// Streaming mode: opens a new connection and returns a lazy, in-order,
    /// finite sequence of text fragments.
    async fn open_stream(&self, turns: &[Turn]) -> Result<FragmentStream, QuillError>;
}

/// A cancellable handle over an in-flight fragment sequence.
///
/// Not restartable: each [`CompletionBackend::open_stream`] call opens a new
/// connection. [`cancel`](FragmentStream::cancel) drops the underlying
/// transport, which closes the connection promptly; afterwards
/// [`next_fragment`](FragmentStream::next_fragment) yields `None`.
pub struct FragmentStream {
    inner: Option<BoxFragmentStream>,
}

impl FragmentStream {
    /// Wraps a boxed fragment stream.
    pub fn new(inner: BoxFragmentStream) -> Self {
        Self { inner: Some(inner) }
    }

    /// Next fragment, end-of-stream (`None`), or a typed failure.
    pub async fn next_fragment(&mut self) -> Option<Result<String, QuillError>> {
        let inner = self.inner.as_mut()?;
        std::future::poll_fn(|cx| inner.as_mut().poll_next(cx)).await
    }

    /// Stops fragment delivery and closes the underlying transport.
    pub fn cancel(&mut self) {
        self.inner = None;
    }

    /// Whether [`cancel`](FragmentStream::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.is_none()
    }
}

impl std::fmt::Debug for FragmentStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FragmentStream")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic [`CompletionBackend`] for pipeline tests.

mod mock_backend;

pub use mock_backend::{MockBackend, Script};

// SPDX-FileCopyrightText: 2026 Quill Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for the Quill chat client.
//!
//! [`FileStore`] is the durable key/value boundary: four named slots in a
//! data directory, no business logic. [`PersistScheduler`] sits in front of
//! it and coalesces rapid repository mutations into infrequent writes.

pub mod scheduler;
pub mod store;

pub use scheduler::PersistScheduler;
pub use store::FileStore;

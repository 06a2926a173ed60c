// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Recall integration tests.
//!
//! Provides mock adapters and test harness infrastructure for fast,
//! deterministic, CI-runnable tests without model downloads or network.
//!
//! # Components
//!
//! - [`MockEmbedder`] - Bag-of-words embedder with call accounting
//! - [`RecordingStorage`] - Storage decorator recording every method call
//! - [`TestHarness`] - Temp storage, vector store and embedder in one place
//! - [`fixtures`] - Thread and message builders

pub mod fixtures;
pub mod harness;
pub mod mock_embedder;
pub mod recording_storage;

pub use harness::TestHarness;
pub use mock_embedder::MockEmbedder;
pub use recording_storage::RecordingStorage;

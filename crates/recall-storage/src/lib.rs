// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for threads and messages.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, typed queries for threads and
//! messages, and [`LazyInit`], a decorator that runs a storage adapter's
//! one-time `init()` before the first call reaches it.

pub mod adapter;
pub mod database;
pub mod lazy;
pub mod migrations;
pub mod models;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
pub use lazy::LazyInit;

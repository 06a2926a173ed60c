// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vector index store for the Recall memory engine.
//!
//! [`SqliteVector`] keeps one SQLite table per index, scores candidates with
//! sqlite-vec cosine distance, and pre-filters on JSON metadata using the
//! MongoDB-style dialect implemented in [`filter`].

pub mod blob;
pub mod filter;
pub mod store;

pub use filter::{FilterTranslator, SqlPredicate, build_predicate};
pub use store::{SqliteVector, validate_index_name};

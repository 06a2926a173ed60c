// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metadata filters for vector queries.
//!
//! Filters arrive in a MongoDB-style JSON dialect (`{"tags": {"$in": ["a"]}}`).
//! [`FilterTranslator`] validates and normalizes them; [`build_predicate`]
//! compiles the normalized tree into a parametrized SQL condition over the
//! `metadata` JSON column of an index table.

pub mod sql;
pub mod translator;

pub use sql::{SqlPredicate, build_predicate};
pub use translator::{FilterSupport, FilterTranslator};

pub(crate) const BASIC_OPERATORS: &[&str] = &["$eq", "$ne"];
pub(crate) const NUMERIC_OPERATORS: &[&str] = &["$gt", "$gte", "$lt", "$lte"];
pub(crate) const ARRAY_OPERATORS: &[&str] = &["$in", "$nin", "$all", "$elemMatch"];
pub(crate) const LOGICAL_OPERATORS: &[&str] = &["$and", "$or", "$not", "$nor"];
pub(crate) const ELEMENT_OPERATORS: &[&str] = &["$exists"];
pub(crate) const REGEX_OPERATORS: &[&str] = &["$regex", "$options"];

/// The operator vocabulary a particular store accepts, by class.
#[derive(Debug, Clone)]
pub struct OperatorSupport {
    pub logical: &'static [&'static str],
    pub basic: &'static [&'static str],
    pub numeric: &'static [&'static str],
    pub array: &'static [&'static str],
    pub element: &'static [&'static str],
    pub regex: &'static [&'static str],
    /// Store-specific extensions.
    pub custom: &'static [&'static str],
}

impl Default for OperatorSupport {
    fn default() -> Self {
        Self {
            logical: LOGICAL_OPERATORS,
            basic: BASIC_OPERATORS,
            numeric: NUMERIC_OPERATORS,
            array: ARRAY_OPERATORS,
            element: ELEMENT_OPERATORS,
            regex: REGEX_OPERATORS,
            custom: &[],
        }
    }
}

impl OperatorSupport {
    /// Operators understood by the SQLite predicate builder: no regex, plus
    /// `$contains` and `$size`.
    pub fn sqlite() -> Self {
        Self {
            regex: &[],
            custom: &["$contains", "$size"],
            ..Self::default()
        }
    }

    pub fn contains(&self, op: &str) -> bool {
        [
            self.logical,
            self.basic,
            self.numeric,
            self.array,
            self.element,
            self.regex,
            self.custom,
        ]
        .iter()
        .any(|class| class.contains(&op))
    }
}

pub(crate) fn is_operator(key: &str) -> bool {
    key.starts_with('$')
}

pub(crate) fn is_logical_operator(key: &str) -> bool {
    LOGICAL_OPERATORS.contains(&key)
}

pub(crate) fn is_field_operator(key: &str) -> bool {
    is_operator(key) && !is_logical_operator(key)
}

// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compiles a normalized filter into a parametrized SQL condition over a
//! `metadata` JSON text column.
//!
//! Field names are dot-separated paths; every segment is quoted in the JSON
//! path (`a.b` is addressed as `$."a"."b"`), so segments never need escaping
//! beyond rejecting quote characters.

use rusqlite::types::Value as SqlValue;
use serde_json::{Map, Value};

use recall_core::RecallError;

use super::is_logical_operator;

const TRUE: &str = "1 = 1";
const FALSE: &str = "1 = 0";

/// A WHERE-clause fragment and its positional (`?`) parameters, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlPredicate {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

/// Compiles a filter previously normalized by
/// [`FilterTranslator::translate`](super::FilterTranslator::translate).
///
/// Returns `None` for an empty or null filter.
pub fn build_predicate(filter: &Value) -> Result<Option<SqlPredicate>, RecallError> {
    let map = match filter {
        Value::Null => return Ok(None),
        Value::Object(map) if map.is_empty() => return Ok(None),
        Value::Object(map) => map,
        other => {
            return Err(RecallError::InvalidFilter(format!(
                "filter must be an object, got {other}"
            )));
        }
    };

    let mut builder = Builder::default();
    let sql = builder.conjunction(map)?;
    Ok(Some(SqlPredicate {
        sql,
        params: builder.params,
    }))
}

/// What a field condition compares against.
enum Target {
    /// A path into the row's `metadata` column.
    Metadata { path: String },
    /// The current element of an enclosing `json_each`.
    Element { alias: String },
    /// A path into the current element of an enclosing `json_each`.
    ElementField { alias: String, path: String },
}

impl Target {
    fn value(&self) -> String {
        match self {
            Self::Metadata { path } => format!("json_extract(metadata, '{path}')"),
            Self::Element { alias } => format!("{alias}.value"),
            Self::ElementField { alias, path } => format!("json_extract({alias}.value, '{path}')"),
        }
    }

    /// SQL NULL when the path is absent, `'null'` for a JSON null.
    fn json_type(&self) -> String {
        match self {
            Self::Metadata { path } => format!("json_type(metadata, '{path}')"),
            Self::Element { alias } => format!("{alias}.type"),
            Self::ElementField { alias, path } => format!("json_type({alias}.value, '{path}')"),
        }
    }

    /// Argument list for `json_each(..)` / `json_array_length(..)`.
    fn array_args(&self) -> String {
        match self {
            Self::Metadata { path } => format!("metadata, '{path}'"),
            Self::Element { alias } => format!("{alias}.value"),
            Self::ElementField { alias, path } => format!("{alias}.value, '{path}'"),
        }
    }
}

#[derive(Default)]
struct Builder {
    params: Vec<SqlValue>,
    aliases: usize,
}

impl Builder {
    fn alias(&mut self) -> String {
        let alias = format!("j{}", self.aliases);
        self.aliases += 1;
        alias
    }

    fn bind(&mut self, value: &Value) -> &'static str {
        self.params.push(to_sql_value(value));
        "?"
    }

    fn conjunction(&mut self, map: &Map<String, Value>) -> Result<String, RecallError> {
        let mut parts = Vec::with_capacity(map.len());
        for (key, value) in map {
            parts.push(self.condition(key, value)?);
        }
        Ok(join(parts, "AND", TRUE))
    }

    fn condition(&mut self, key: &str, value: &Value) -> Result<String, RecallError> {
        if is_logical_operator(key) {
            return self.logical(key, value);
        }
        let target = Target::Metadata {
            path: json_path(key)?,
        };
        self.field(&target, value)
    }

    fn logical(&mut self, op: &str, value: &Value) -> Result<String, RecallError> {
        let empty = match value {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        };
        if empty {
            return match op {
                "$or" => Ok(FALSE.to_string()),
                "$not" => Err(RecallError::InvalidFilter(
                    "$not operator cannot be empty".to_string(),
                )),
                _ => Ok(TRUE.to_string()),
            };
        }

        if op == "$not" {
            let Value::Object(map) = value else {
                return Err(RecallError::InvalidFilter(
                    "$not operator requires an object".to_string(),
                ));
            };
            return Ok(format!("NOT ({})", self.conjunction(map)?));
        }

        let mut branches = Vec::new();
        match value {
            Value::Array(items) => {
                for item in items {
                    let Value::Object(map) = item else {
                        return Err(RecallError::InvalidFilter(format!(
                            "{op} entries must be objects"
                        )));
                    };
                    branches.push(self.conjunction(map)?);
                }
            }
            Value::Object(map) => branches.push(self.conjunction(map)?),
            _ => {
                return Err(RecallError::InvalidFilter(format!(
                    "{op} requires an array of conditions"
                )));
            }
        }

        Ok(match op {
            "$and" => join(branches, "AND", TRUE),
            "$or" => join(branches, "OR", FALSE),
            _ => format!("NOT ({})", join(branches, "OR", FALSE)),
        })
    }

    /// A field's condition: an operator object, or a bare value/array.
    fn field(&mut self, target: &Target, value: &Value) -> Result<String, RecallError> {
        match value {
            Value::Object(ops) => {
                let mut parts = Vec::with_capacity(ops.len());
                for (op, operand) in ops {
                    parts.push(self.field_operator(target, op, operand)?);
                }
                Ok(join(parts, "AND", TRUE))
            }
            Value::Array(_) => self.operator(target, "$in", value),
            _ => self.operator(target, "$eq", value),
        }
    }

    fn field_operator(
        &mut self,
        target: &Target,
        op: &str,
        operand: &Value,
    ) -> Result<String, RecallError> {
        if op != "$not" {
            return self.operator(target, op, operand);
        }
        match operand {
            Value::Object(inner) if !inner.is_empty() => {
                let mut parts = Vec::with_capacity(inner.len());
                for (inner_op, inner_operand) in inner {
                    parts.push(self.operator(target, inner_op, inner_operand)?);
                }
                Ok(format!("NOT ({})", join(parts, "AND", TRUE)))
            }
            Value::Object(_) => Err(RecallError::InvalidFilter(
                "$not operator cannot be empty".to_string(),
            )),
            _ => Err(RecallError::InvalidFilter(
                "$not operator requires an object".to_string(),
            )),
        }
    }

    fn operator(&mut self, target: &Target, op: &str, operand: &Value) -> Result<String, RecallError> {
        let field = target.value();
        let sql = match op {
            "$eq" | "$ne" => {
                let (null_test, cmp) = if op == "$eq" {
                    ("IS NULL", "=")
                } else {
                    ("IS NOT NULL", "!=")
                };
                let first = self.bind(operand);
                let second = self.bind(operand);
                format!("(CASE WHEN {first} IS NULL THEN {field} {null_test} ELSE {field} {cmp} {second} END)")
            }
            "$gt" | "$gte" | "$lt" | "$lte" => {
                let cmp = match op {
                    "$gt" => ">",
                    "$gte" => ">=",
                    "$lt" => "<",
                    _ => "<=",
                };
                let placeholder = self.bind(operand);
                // Strings (RFC 3339 timestamps included) compare as text.
                if operand.is_string() {
                    format!("{field} {cmp} {placeholder}")
                } else {
                    format!("CAST({field} AS NUMERIC) {cmp} {placeholder}")
                }
            }
            "$in" | "$nin" => {
                let values = as_array(operand);
                let negate = op == "$nin";
                if values.is_empty() {
                    return Ok(if negate { TRUE } else { FALSE }.to_string());
                }
                let not = if negate { "NOT " } else { "" };
                let alias = self.alias();
                let json = self.bind(&Value::Array(values.clone()));
                let list = values
                    .iter()
                    .map(|value| self.bind(value))
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "(CASE WHEN {ty} = 'array' THEN {not}EXISTS (SELECT 1 FROM json_each({args}) AS {alias} WHERE {alias}.value IN (SELECT value FROM json_each({json}))) ELSE {field} {not}IN ({list}) END)",
                    ty = target.json_type(),
                    args = target.array_args(),
                )
            }
            "$all" => {
                let values = as_array(operand);
                if values.is_empty() {
                    return Ok(FALSE.to_string());
                }
                let wanted = self.alias();
                let stored = self.alias();
                let json = self.bind(&Value::Array(values));
                format!(
                    "(CASE WHEN {ty} = 'array' THEN NOT EXISTS (SELECT 1 FROM json_each({json}) AS {wanted} WHERE {wanted}.value NOT IN (SELECT {stored}.value FROM json_each({args}) AS {stored})) ELSE 0 END)",
                    ty = target.json_type(),
                    args = target.array_args(),
                )
            }
            "$elemMatch" => {
                let Value::Object(conditions) = operand else {
                    return Err(RecallError::InvalidFilter(
                        "$elemMatch requires an object with conditions".to_string(),
                    ));
                };
                let alias = self.alias();
                let mut parts = Vec::with_capacity(conditions.len());
                for (key, value) in conditions {
                    if key.starts_with('$') {
                        let element = Target::Element {
                            alias: alias.clone(),
                        };
                        parts.push(self.field_operator(&element, key, value)?);
                    } else {
                        let element_field = Target::ElementField {
                            alias: alias.clone(),
                            path: json_path(key)?,
                        };
                        parts.push(self.field(&element_field, value)?);
                    }
                }
                format!(
                    "(CASE WHEN {ty} = 'array' THEN EXISTS (SELECT 1 FROM json_each({args}) AS {alias} WHERE {conds}) ELSE 0 END)",
                    ty = target.json_type(),
                    args = target.array_args(),
                    conds = join(parts, "AND", TRUE),
                )
            }
            "$exists" => {
                let wanted = !matches!(operand, Value::Bool(false) | Value::Null);
                let test = if wanted { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {test}", target.json_type())
            }
            "$size" => {
                let placeholder = self.bind(operand);
                format!(
                    "(CASE WHEN {ty} = 'array' THEN json_array_length({args}) = {placeholder} ELSE 0 END)",
                    ty = target.json_type(),
                    args = target.array_args(),
                )
            }
            "$contains" => match operand {
                Value::Array(_) => {
                    let alias = self.alias();
                    let json = self.bind(operand);
                    format!(
                        "({ty} = 'array' AND EXISTS (SELECT 1 FROM json_each({args}) AS {alias} WHERE {alias}.value IN (SELECT value FROM json_each({json}))))",
                        ty = target.json_type(),
                        args = target.array_args(),
                    )
                }
                Value::String(_) => {
                    let placeholder = self.bind(operand);
                    format!("instr(lower({field}), lower({placeholder})) > 0")
                }
                _ => {
                    let placeholder = self.bind(operand);
                    format!("{field} = {placeholder}")
                }
            },
            other => {
                return Err(RecallError::InvalidFilter(format!(
                    "Invalid operator: {other}"
                )));
            }
        };
        Ok(sql)
    }
}

/// Quotes each dot-separated segment into a JSON path.
fn json_path(key: &str) -> Result<String, RecallError> {
    if key.contains('"') || key.contains('\'') {
        return Err(RecallError::InvalidFilter(format!(
            "Invalid field name: {key}"
        )));
    }
    let segments: Vec<String> = key.split('.').map(|segment| format!("\"{segment}\"")).collect();
    Ok(format!("$.{}", segments.join(".")))
}

fn join(parts: Vec<String>, connective: &str, empty: &str) -> String {
    match parts.len() {
        0 => empty.to_string(),
        1 => parts.into_iter().next().unwrap_or_default(),
        _ => format!("({})", parts.join(&format!(" {connective} "))),
    }
}

fn as_array(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        other => vec![other.clone()],
    }
}

/// Maps a JSON scalar onto the SQLite value `json_extract` would produce
/// for it. Compound values bind as their JSON text.
fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        compound => SqlValue::Text(compound.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterTranslator;
    use rusqlite::Connection;
    use serde_json::json;

    /// Indices of `docs` whose metadata satisfies `filter`.
    fn matching(docs: &[Value], filter: Value) -> Vec<usize> {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE docs (idx INTEGER, metadata TEXT NOT NULL)")
            .unwrap();
        for (i, doc) in docs.iter().enumerate() {
            conn.execute(
                "INSERT INTO docs (idx, metadata) VALUES (?1, ?2)",
                rusqlite::params![i as i64, doc.to_string()],
            )
            .unwrap();
        }
        let translated = FilterTranslator::sqlite().translate(&filter).unwrap();
        let (clause, params) = match build_predicate(&translated).unwrap() {
            Some(p) => (format!("WHERE {}", p.sql), p.params),
            None => (String::new(), Vec::new()),
        };
        let sql = format!("SELECT idx FROM docs {clause} ORDER BY idx");
        let mut stmt = conn.prepare(&sql).unwrap();
        stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
            row.get::<_, i64>(0)
        })
        .unwrap()
        .map(|r| r.unwrap() as usize)
        .collect()
    }

    #[test]
    fn in_and_nin_treat_arrays_and_scalars_alike() {
        let docs = [json!({"x": [1, 2, 3]}), json!({"x": 2}), json!({"x": 5})];
        assert_eq!(matching(&docs, json!({"x": {"$in": [2]}})), vec![0, 1]);
        assert_eq!(matching(&docs, json!({"x": {"$nin": [2]}})), vec![2]);
        assert_eq!(matching(&docs, json!({"x": {"$in": 2}})), vec![0, 1]);
    }

    #[test]
    fn empty_in_list_short_circuits() {
        let docs = [json!({"x": 1})];
        assert!(matching(&docs, json!({"x": {"$in": []}})).is_empty());
        assert_eq!(matching(&docs, json!({"x": {"$nin": []}})), vec![0]);
        let translated = FilterTranslator::sqlite()
            .translate(&json!({"x": {"$in": []}}))
            .unwrap();
        let predicate = build_predicate(&translated).unwrap().unwrap();
        assert_eq!(predicate.sql, FALSE);
        assert!(predicate.params.is_empty());
    }

    #[test]
    fn all_requires_superset() {
        let docs = [json!({"x": [1, 2, 3]}), json!({"x": [1, 3]}), json!({"x": 1})];
        assert_eq!(matching(&docs, json!({"x": {"$all": [1, 2]}})), vec![0]);
        assert!(matching(&docs, json!({"x": {"$all": []}})).is_empty());
    }

    #[test]
    fn eq_null_matches_missing_and_null_fields() {
        let docs = [json!({"x": null}), json!({}), json!({"x": 1})];
        assert_eq!(matching(&docs, json!({"x": {"$eq": null}})), vec![0, 1]);
        assert_eq!(matching(&docs, json!({"x": {"$ne": null}})), vec![2]);
    }

    #[test]
    fn numeric_operators_cast_before_comparing() {
        let docs = [json!({"n": 5}), json!({"n": 10.5}), json!({"n": -1})];
        assert_eq!(matching(&docs, json!({"n": {"$gt": 4}})), vec![0, 1]);
        assert_eq!(matching(&docs, json!({"n": {"$lte": 5}})), vec![0, 2]);
    }

    #[test]
    fn timestamps_compare_as_text() {
        let docs = [
            json!({"at": "2026-01-01T00:00:00Z"}),
            json!({"at": "2026-06-01T00:00:00Z"}),
        ];
        assert_eq!(
            matching(&docs, json!({"at": {"$gte": "2026-03-01T00:00:00Z"}})),
            vec![1]
        );
    }

    #[test]
    fn nested_paths_address_sub_objects() {
        let docs = [json!({"user": {"age": 30}}), json!({"user": {"age": 12}})];
        assert_eq!(matching(&docs, json!({"user": {"age": {"$gte": 18}}})), vec![0]);
        assert_eq!(matching(&docs, json!({"user.age": 12})), vec![1]);
    }

    #[test]
    fn elem_match_checks_each_element() {
        let docs = [
            json!({"items": [{"sku": "a", "qty": 1}, {"sku": "b", "qty": 9}]}),
            json!({"items": [{"sku": "b", "qty": 2}]}),
            json!({"items": "b"}),
        ];
        assert_eq!(
            matching(&docs, json!({"items": {"$elemMatch": {"sku": "b", "qty": {"$gt": 5}}}})),
            vec![0]
        );
        let scores = [json!({"s": [1, 8]}), json!({"s": [2, 3]})];
        assert_eq!(
            matching(&scores, json!({"s": {"$elemMatch": {"$gte": 5, "$lt": 9}}})),
            vec![0]
        );
    }

    #[test]
    fn size_exists_and_contains() {
        let docs = [
            json!({"tags": ["Red", "blue"], "name": "Hello World"}),
            json!({"tags": ["green"], "name": null}),
            json!({"name": "other"}),
        ];
        assert_eq!(matching(&docs, json!({"tags": {"$size": 2}})), vec![0]);
        assert_eq!(matching(&docs, json!({"tags": {"$exists": true}})), vec![0, 1]);
        assert_eq!(matching(&docs, json!({"tags": {"$exists": false}})), vec![2]);
        assert_eq!(matching(&docs, json!({"name": {"$contains": "WORLD"}})), vec![0]);
        assert_eq!(
            matching(&docs, json!({"tags": {"$contains": ["green", "x"]}})),
            vec![1]
        );
    }

    #[test]
    fn logical_composition() {
        let docs = [json!({"a": 1, "b": 1}), json!({"a": 1, "b": 2}), json!({"a": 2, "b": 2})];
        assert_eq!(
            matching(&docs, json!({"$or": [{"a": 2}, {"a": 1, "b": 1}]})),
            vec![0, 2]
        );
        assert_eq!(matching(&docs, json!({"$nor": [{"a": 2}, {"b": 1}]})), vec![1]);
        assert_eq!(matching(&docs, json!({"$not": {"a": 1}})), vec![2]);
        assert_eq!(matching(&docs, json!({"a": {"$not": {"$gt": 1}}})), vec![0, 1]);
    }

    #[test]
    fn empty_logical_operands() {
        let docs = [json!({"a": 1})];
        assert_eq!(matching(&docs, json!({"$and": []})), vec![0]);
        assert_eq!(matching(&docs, json!({"$nor": []})), vec![0]);
        assert!(matching(&docs, json!({"$or": []})).is_empty());
        assert!(matches!(
            build_predicate(&json!({"$not": {}})),
            Err(RecallError::InvalidFilter(_))
        ));
    }

    #[test]
    fn quoted_field_names_are_rejected() {
        let err = build_predicate(&json!({"a'b": {"$eq": 1}})).unwrap_err();
        assert!(err.to_string().contains("Invalid field name"));
    }

    #[test]
    fn eq_binds_value_twice() {
        let predicate = build_predicate(&json!({"k": {"$eq": "v"}})).unwrap().unwrap();
        assert_eq!(
            predicate.params,
            vec![SqlValue::Text("v".into()), SqlValue::Text("v".into())]
        );
        assert!(predicate.sql.contains("json_extract(metadata, '$.\"k\"')"));
    }
}

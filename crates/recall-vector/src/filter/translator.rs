// SPDX-FileCopyrightText: 2026 Recall Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Validation and normalization of portable metadata filters.

use serde_json::{Map, Value, json};

use recall_core::RecallError;

use super::{
    ARRAY_OPERATORS, BASIC_OPERATORS, OperatorSupport, is_field_operator, is_logical_operator,
    is_operator,
};

/// Outcome of a structural filter check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSupport {
    pub supported: bool,
    pub messages: Vec<String>,
}

impl FilterSupport {
    fn ok() -> Self {
        Self {
            supported: true,
            messages: Vec::new(),
        }
    }

    fn reject(&mut self, message: String) {
        self.supported = false;
        self.messages.push(message);
    }
}

/// Validates a MongoDB-style filter against a store's operator vocabulary
/// and rewrites it into the normalized shape the predicate builder expects.
///
/// Normalization:
/// - bare values become `{"$eq": v}`, bare arrays become `{"$in": [..]}`
/// - nested plain objects flatten into dotted paths (`{"a": {"b": 1}}` is `{"a.b": {"$eq": 1}}`)
/// - scalars under `$in`/`$nin`/`$all` are wrapped into a one-element array
/// - arrays under `$eq`/`$ne` are compared as their JSON text
/// - `-0` becomes `0`
///
/// JSON has no date type; timestamps are expected as RFC 3339 strings, which
/// order correctly under string comparison.
#[derive(Debug, Clone)]
pub struct FilterTranslator {
    operators: OperatorSupport,
}

impl Default for FilterTranslator {
    fn default() -> Self {
        Self::sqlite()
    }
}

impl FilterTranslator {
    pub fn new(operators: OperatorSupport) -> Self {
        Self { operators }
    }

    /// Translator for the SQLite vector store.
    pub fn sqlite() -> Self {
        Self::new(OperatorSupport::sqlite())
    }

    pub fn operators(&self) -> &OperatorSupport {
        &self.operators
    }

    /// Validates and normalizes `filter`. Empty filters pass through as-is.
    pub fn translate(&self, filter: &Value) -> Result<Value, RecallError> {
        if is_empty(filter) {
            return Ok(filter.clone());
        }
        self.validate_filter(filter)?;
        Ok(self.translate_node(filter, ""))
    }

    /// Runs [`validate_filter_support`](Self::validate_filter_support) and
    /// fails with every violation joined into one message.
    pub fn validate_filter(&self, filter: &Value) -> Result<(), RecallError> {
        let support = self.validate_filter_support(filter, "");
        if support.supported {
            Ok(())
        } else {
            Err(RecallError::InvalidFilter(support.messages.join(", ")))
        }
    }

    /// Walks the whole filter and collects every structural violation.
    pub fn validate_filter_support(&self, node: &Value, path: &str) -> FilterSupport {
        if is_primitive(node) || is_empty(node) {
            return FilterSupport::ok();
        }

        if let Value::Array(items) = node {
            let mut result = FilterSupport::ok();
            for item in items {
                let nested = self.validate_filter_support(item, path);
                result.supported &= nested.supported;
                result.messages.extend(nested.messages);
            }
            return result;
        }

        let Value::Object(map) = node else {
            return FilterSupport::ok();
        };

        let mut result = FilterSupport::ok();

        for (key, value) in map {
            let new_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{path}.{key}")
            };

            if is_operator(key) {
                if !self.operators.contains(key) {
                    result.reject(format!("Unsupported operator: {key}"));
                    continue;
                }
                if path.is_empty() && !is_logical_operator(key) {
                    result.reject(format!("Invalid top-level operator: {key}"));
                    continue;
                }
                if key == "$elemMatch" && !value.is_object() {
                    result.reject("$elemMatch requires an object with conditions".to_string());
                    continue;
                }
                if is_logical_operator(key) {
                    if key == "$not" {
                        if !value.is_object() {
                            result.reject("$not operator requires an object".to_string());
                        } else if is_empty(value) {
                            result.reject("$not operator cannot be empty".to_string());
                        }
                        continue;
                    }
                    let parent = path.rsplit('.').next().unwrap_or_default();
                    if !path.is_empty() && !is_logical_operator(parent) {
                        result.reject(format!(
                            "Logical operator {key} cannot be used at field level: {new_path}"
                        ));
                        continue;
                    }
                    if let Value::Array(items) = value
                        && items.iter().any(is_bare_field_operator)
                    {
                        result.reject(format!(
                            "Logical operators must contain field conditions, not direct operators: {new_path}"
                        ));
                        continue;
                    }
                }
            }

            let nested = self.validate_filter_support(value, &new_path);
            if !nested.supported {
                result.supported = false;
                result.messages.extend(nested.messages);
            }
        }

        result
    }

    fn translate_node(&self, node: &Value, current_path: &str) -> Value {
        let with_path = |inner: Value| {
            if current_path.is_empty() {
                inner
            } else {
                single(current_path, inner)
            }
        };

        match node {
            Value::Array(items) => {
                let normalized: Vec<Value> = items.iter().map(normalize_comparison_value).collect();
                with_path(json!({ "$in": normalized }))
            }
            Value::Object(map) => {
                let mut result = Map::new();
                for (key, value) in map {
                    let new_path = if current_path.is_empty() {
                        key.clone()
                    } else {
                        format!("{current_path}.{key}")
                    };

                    if is_logical_operator(key) {
                        let translated = match value {
                            Value::Array(items) => Value::Array(
                                items.iter().map(|item| self.translate_node(item, "")).collect(),
                            ),
                            other => self.translate_node(other, ""),
                        };
                        result.insert(key.clone(), translated);
                    } else if is_operator(key) {
                        result.insert(key.clone(), normalize_operand(key, value));
                    } else if let Value::Object(inner) = value {
                        if inner.keys().any(|k| is_operator(k)) {
                            result.insert(new_path, self.translate_node(value, ""));
                        } else if let Value::Object(flat) = self.translate_node(value, &new_path) {
                            result.extend(flat);
                        }
                    } else {
                        result.insert(new_path, self.translate_node(value, ""));
                    }
                }
                Value::Object(result)
            }
            primitive => with_path(json!({ "$eq": normalize_comparison_value(primitive) })),
        }
    }
}

/// Rewrites `$all` as a conjunction of single-value `$in` tests, for stores
/// without native superset matching.
pub fn simulate_all(field: &str, values: &[Value]) -> Value {
    let clauses: Vec<Value> = values
        .iter()
        .map(|value| single(field, json!({ "$in": [normalize_comparison_value(value)] })))
        .collect();
    json!({ "$and": clauses })
}

fn single(key: &str, value: Value) -> Value {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    Value::Object(map)
}

fn normalize_operand(op: &str, value: &Value) -> Value {
    let is_wrappable_array_op = ARRAY_OPERATORS.contains(&op) && op != "$elemMatch";
    match value {
        Value::Array(items) if BASIC_OPERATORS.contains(&op) => {
            Value::String(Value::Array(items.clone()).to_string())
        }
        Value::Array(items) if is_wrappable_array_op => {
            Value::Array(items.iter().map(normalize_comparison_value).collect())
        }
        other if is_wrappable_array_op => {
            Value::Array(vec![normalize_comparison_value(other)])
        }
        other => normalize_comparison_value(other),
    }
}

pub(crate) fn normalize_comparison_value(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.as_f64() == Some(0.0) && !n.is_i64() && !n.is_u64() => json!(0),
        other => other.clone(),
    }
}

fn is_primitive(value: &Value) -> bool {
    !matches!(value, Value::Array(_) | Value::Object(_))
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

fn is_bare_field_operator(item: &Value) -> bool {
    match item {
        Value::Object(map) if map.len() == 1 => map.keys().all(|k| is_field_operator(k)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn translate(filter: Value) -> Value {
        FilterTranslator::sqlite().translate(&filter).unwrap()
    }

    fn errors(filter: Value) -> String {
        match FilterTranslator::sqlite().translate(&filter) {
            Err(RecallError::InvalidFilter(msg)) => msg,
            other => panic!("expected InvalidFilter, got {other:?}"),
        }
    }

    #[test]
    fn bare_values_become_eq_and_in() {
        assert_eq!(
            translate(json!({"color": "red", "size": [1, 2]})),
            json!({"color": {"$eq": "red"}, "size": {"$in": [1, 2]}})
        );
    }

    #[test]
    fn nested_objects_flatten_to_dotted_paths() {
        assert_eq!(
            translate(json!({"user": {"profile": {"age": 30}}})),
            json!({"user.profile.age": {"$eq": 30}})
        );
        assert_eq!(
            translate(json!({"user": {"age": {"$gt": 18}}})),
            json!({"user.age": {"$gt": 18}})
        );
    }

    #[test]
    fn scalars_under_array_operators_are_wrapped() {
        assert_eq!(
            translate(json!({"tags": {"$in": "a", "$nin": "b", "$all": "c"}})),
            json!({"tags": {"$in": ["a"], "$nin": ["b"], "$all": ["c"]}})
        );
    }

    #[test]
    fn arrays_under_eq_compare_as_json_text() {
        assert_eq!(
            translate(json!({"pair": {"$eq": [1, 2]}})),
            json!({"pair": {"$eq": "[1,2]"}})
        );
    }

    #[test]
    fn negative_zero_is_canonicalized() {
        let translated = translate(json!({"x": {"$gte": -0.0}}));
        assert_eq!(translated, json!({"x": {"$gte": 0}}));
    }

    #[test]
    fn logical_operands_translate_recursively() {
        assert_eq!(
            translate(json!({"$or": [{"a": 1}, {"b": {"c": 2}}]})),
            json!({"$or": [{"a": {"$eq": 1}}, {"b.c": {"$eq": 2}}]})
        );
    }

    #[test]
    fn empty_filter_passes_through() {
        assert_eq!(translate(json!({})), json!({}));
        assert_eq!(translate(Value::Null), Value::Null);
    }

    #[test]
    fn unknown_operator_is_rejected() {
        assert_eq!(
            errors(json!({"name": {"$regex": "^a"}})),
            "Unsupported operator: $regex"
        );
    }

    #[test]
    fn field_operator_at_root_is_rejected() {
        assert_eq!(errors(json!({"$gt": 5})), "Invalid top-level operator: $gt");
    }

    #[test]
    fn not_requires_non_empty_object() {
        assert_eq!(
            errors(json!({"$not": [1]})),
            "$not operator requires an object"
        );
        assert_eq!(errors(json!({"$not": {}})), "$not operator cannot be empty");
    }

    #[test]
    fn elem_match_requires_object() {
        assert_eq!(
            errors(json!({"items": {"$elemMatch": [1, 2]}})),
            "$elemMatch requires an object with conditions"
        );
    }

    #[test]
    fn logical_operator_under_field_is_rejected() {
        assert_eq!(
            errors(json!({"price": {"$and": [{"a": 1}]}})),
            "Logical operator $and cannot be used at field level: price.$and"
        );
    }

    #[test]
    fn bare_operators_inside_logical_array_are_rejected() {
        assert_eq!(
            errors(json!({"$and": [{"$gt": 5}]})),
            "Logical operators must contain field conditions, not direct operators: $and"
        );
    }

    #[test]
    fn all_violations_are_reported_together() {
        let msg = errors(json!({"$gt": 1, "name": {"$regex": "x"}, "$not": {}}));
        assert!(msg.contains("Invalid top-level operator: $gt"));
        assert!(msg.contains("Unsupported operator: $regex"));
        assert!(msg.contains("$not operator cannot be empty"));
        assert_eq!(msg.matches(", ").count(), 2);
    }

    #[test]
    fn nested_logical_operators_are_allowed() {
        let filter = json!({"$and": [{"$or": [{"a": 1}, {"b": 2}]}, {"c": {"$exists": true}}]});
        let support = FilterTranslator::sqlite().validate_filter_support(&filter, "");
        assert!(support.supported, "{:?}", support.messages);
    }

    #[test]
    fn simulate_all_expands_to_and_of_in() {
        assert_eq!(
            simulate_all("tags", &[json!("a"), json!(-0.0)]),
            json!({"$and": [{"tags": {"$in": ["a"]}}, {"tags": {"$in": [0]}}]})
        );
    }
}

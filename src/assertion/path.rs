//! Field extractor
//!
//! Resolves a small, closed path grammar against a canonical response:
//!
//! | form | meaning |
//! |------|---------|
//! | `length` | element count of a sequence, `0` for anything else |
//! | `result_type` | `"null"` when the response is absent, `"path"` otherwise |
//! | `[*].<attr>` | `<attr>` of every element of a sequence (nulls where missing) |
//! | `nodes[<i>]` | i-th element of the root mapping's `nodes` sequence |
//! | anything else | shallow key lookup on a mapping |
//!
//! Resolution never fails: an unresolvable path yields `None`. JSON `null`
//! counts as absent.

use std::fmt;

use serde_json::Value;

/// A parsed field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldPath {
    Length,
    ResultType,
    Project(String),
    NodeIndex(usize),
    Key(String),
}

impl FieldPath {
    /// Parse a path expression; unrecognized forms become key lookups
    pub fn parse(expr: &str) -> Self {
        if expr == "length" {
            return FieldPath::Length;
        }
        if expr == "result_type" {
            return FieldPath::ResultType;
        }
        if let Some(attr) = expr.strip_prefix("[*].") {
            return FieldPath::Project(attr.to_string());
        }
        if let Some(index) = expr
            .strip_prefix("nodes[")
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|i| i.parse::<usize>().ok())
        {
            return FieldPath::NodeIndex(index);
        }
        FieldPath::Key(expr.to_string())
    }

    /// Resolve against a response; `data` is `None` when the response is absent
    pub fn extract(&self, data: Option<&Value>) -> Option<Value> {
        let data = data.filter(|v| !v.is_null());

        let extracted = match self {
            FieldPath::Length => {
                let len = data.and_then(Value::as_array).map_or(0, Vec::len);
                Some(Value::from(len))
            }
            FieldPath::ResultType => Some(Value::from(if data.is_none() { "null" } else { "path" })),
            FieldPath::Project(attr) => {
                let projected = match data.and_then(Value::as_array) {
                    Some(items) => items
                        .iter()
                        .map(|item| item.get(attr.as_str()).cloned().unwrap_or(Value::Null))
                        .collect(),
                    None => Vec::new(),
                };
                Some(Value::Array(projected))
            }
            FieldPath::NodeIndex(index) => data
                .and_then(|d| d.get("nodes"))
                .and_then(Value::as_array)
                .and_then(|nodes| nodes.get(*index))
                .cloned(),
            FieldPath::Key(key) => data
                .and_then(Value::as_object)
                .and_then(|map| map.get(key))
                .cloned(),
        };

        extracted.filter(|v| !v.is_null())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Length => f.write_str("length"),
            FieldPath::ResultType => f.write_str("result_type"),
            FieldPath::Project(attr) => write!(f, "[*].{}", attr),
            FieldPath::NodeIndex(i) => write!(f, "nodes[{}]", i),
            FieldPath::Key(key) => f.write_str(key),
        }
    }
}

/// Resolve a path expression against a response
pub fn extract_field(data: Option<&Value>, expr: &str) -> Option<Value> {
    FieldPath::parse(expr).extract(data)
}

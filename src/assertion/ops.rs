//! Assertion evaluator
//!
//! Applies one declarative operator to an extracted value and produces a
//! verdict with a self-explanatory diagnostic.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Assertion operator
///
/// Unknown operator names are kept so evaluation can report them; they are
/// a suite configuration error, never a silent pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Op {
    Eq,
    Gte,
    Lte,
    In,
    AllEq,
    Unknown(String),
}

impl From<String> for Op {
    fn from(name: String) -> Self {
        match name.as_str() {
            "eq" => Op::Eq,
            "gte" => Op::Gte,
            "lte" => Op::Lte,
            "in" => Op::In,
            "all_eq" => Op::AllEq,
            _ => Op::Unknown(name),
        }
    }
}

impl From<Op> for String {
    fn from(op: Op) -> Self {
        op.to_string()
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Eq => f.write_str("eq"),
            Op::Gte => f.write_str("gte"),
            Op::Lte => f.write_str("lte"),
            Op::In => f.write_str("in"),
            Op::AllEq => f.write_str("all_eq"),
            Op::Unknown(name) => f.write_str(name),
        }
    }
}

/// A declarative check against one field of a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    /// Path expression resolved by the field extractor
    pub field: String,
    pub op: Op,
    /// Expected value
    #[serde(default)]
    pub value: Value,
    /// Pass when the extracted value is absent
    #[serde(default)]
    pub if_not_null: bool,
    /// Whether the extracted value must agree across clients
    #[serde(default = "default_parity", skip_serializing_if = "is_true")]
    pub parity: bool,
}

fn default_parity() -> bool {
    true
}

fn is_true(v: &bool) -> bool {
    *v
}

impl Assertion {
    pub fn new(field: impl Into<String>, op: Op, value: Value) -> Self {
        Self {
            field: field.into(),
            op,
            value,
            if_not_null: false,
            parity: true,
        }
    }

    pub fn if_not_null(mut self) -> Self {
        self.if_not_null = true;
        self
    }
}

/// Outcome of evaluating one assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub passed: bool,
    pub message: String,
}

impl Verdict {
    fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
        }
    }
}

/// Evaluate an assertion against an extracted value (`None` = absent)
pub fn evaluate(actual: Option<&Value>, assertion: &Assertion) -> Verdict {
    let actual = actual.filter(|v| !v.is_null());
    let expected = &assertion.value;

    if assertion.if_not_null && actual.is_none() {
        return Verdict::pass("skipped (null)");
    }

    let ok = match &assertion.op {
        Op::Eq => values_equal(actual.unwrap_or(&Value::Null), expected),
        Op::Gte => actual.is_some_and(|v| {
            matches!(compare(v, expected), Some(Ordering::Greater | Ordering::Equal))
        }),
        Op::Lte => actual.is_some_and(|v| {
            matches!(compare(v, expected), Some(Ordering::Less | Ordering::Equal))
        }),
        Op::In => contains(expected, actual.unwrap_or(&Value::Null)),
        Op::AllEq => actual
            .and_then(Value::as_array)
            .is_some_and(|items| items.iter().all(|item| values_equal(item, expected))),
        Op::Unknown(name) => return Verdict::fail(format!("unknown op: {}", name)),
    };

    if ok {
        Verdict::pass("")
    } else {
        Verdict::fail(format!(
            "expected {} {}, got {}",
            assertion.op,
            expected,
            actual.unwrap_or(&Value::Null)
        ))
    }
}

/// Structural equality with numbers compared by value (`3 == 3.0`)
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (x.as_u64(), y.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => x.as_f64() == y.as_f64(),
            },
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, x)| ym.get(k).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

/// Order numbers numerically and strings lexicographically
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Membership in a sequence, or substring of a string
fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::Array(items), _) => items.iter().any(|item| values_equal(item, needle)),
        (Value::String(s), Value::String(sub)) => s.contains(sub.as_str()),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(op: &str, actual: Option<Value>, expected: Value) -> Verdict {
        let assertion = Assertion::new("f", Op::from(op.to_string()), expected);
        evaluate(actual.as_ref(), &assertion)
    }

    #[test]
    fn test_op_round_trips_names() {
        let op: Op = serde_json::from_value(json!("all_eq")).unwrap();
        assert_eq!(op, Op::AllEq);
        let op: Op = serde_json::from_value(json!("contains")).unwrap();
        assert_eq!(op, Op::Unknown("contains".into()));
        assert_eq!(serde_json::to_value(Op::Gte).unwrap(), json!("gte"));
    }

    #[test]
    fn test_if_not_null_short_circuits_every_op() {
        for op in ["eq", "gte", "lte", "in", "all_eq", "bogus"] {
            let assertion = Assertion::new("f", Op::from(op.to_string()), json!(42)).if_not_null();
            let verdict = evaluate(None, &assertion);
            assert!(verdict.passed, "{op} should pass vacuously");
            assert_eq!(verdict.message, "skipped (null)");

            assert!(evaluate(Some(&Value::Null), &assertion).passed);
        }
    }

    #[test]
    fn test_eq_is_structural_and_numeric() {
        assert!(check("eq", Some(json!(3)), json!(3.0)).passed);
        assert!(check("eq", Some(json!({"a": [1, 2]})), json!({"a": [1.0, 2]})).passed);
        assert!(check("eq", None, Value::Null).passed);
        assert!(!check("eq", Some(json!("6")), json!(6)).passed);
        assert!(!check("eq", Some(json!([1, 2])), json!([2, 1])).passed);
    }

    #[test]
    fn test_gte_lte() {
        assert!(check("gte", Some(json!(6)), json!(6)).passed);
        assert!(check("gte", Some(json!(7.5)), json!(6)).passed);
        assert!(!check("gte", Some(json!(5)), json!(6)).passed);
        assert!(check("lte", Some(json!(1)), json!(1)).passed);
        assert!(!check("lte", Some(json!(2)), json!(1)).passed);
        assert!(check("gte", Some(json!("b")), json!("a")).passed);

        // Absence always fails
        assert!(!check("gte", None, json!(0)).passed);
        assert!(!check("lte", None, json!(0)).passed);
        // Mismatched types fail
        assert!(!check("gte", Some(json!("7")), json!(6)).passed);
    }

    #[test]
    fn test_in() {
        assert!(check("in", Some(json!(4)), json!([4, 5])).passed);
        assert!(!check("in", Some(json!(1)), json!([4, 5])).passed);
        assert!(check("in", Some(json!("prod")), json!("products")).passed);
        assert!(check("in", None, json!([null, 1])).passed);
        assert!(!check("in", Some(json!(1)), json!(1)).passed);
    }

    #[test]
    fn test_all_eq() {
        assert!(check("all_eq", Some(json!([4, 4, 4.0])), json!(4)).passed);
        assert!(check("all_eq", Some(json!([])), json!(4)).passed);
        assert!(!check("all_eq", Some(json!([4, 5])), json!(4)).passed);
        assert!(!check("all_eq", Some(json!(4)), json!(4)).passed);
        assert!(!check("all_eq", None, json!(4)).passed);
    }

    #[test]
    fn test_unknown_op_names_operator() {
        let verdict = check("approx", Some(json!(1)), json!(1));
        assert!(!verdict.passed);
        assert_eq!(verdict.message, "unknown op: approx");
    }

    #[test]
    fn test_failure_message_has_op_expected_actual() {
        let verdict = check("gte", Some(json!(2)), json!(6));
        assert_eq!(verdict.message, "expected gte 6, got 2");

        let verdict = check("eq", None, json!("path"));
        assert_eq!(verdict.message, "expected eq \"path\", got null");
    }

    #[test]
    fn test_parity_defaults_on() {
        let assertion: Assertion =
            serde_json::from_value(json!({"field": "hops", "op": "gte", "value": 1})).unwrap();
        assert!(assertion.parity);
        assert!(!assertion.if_not_null);

        let volatile: Assertion = serde_json::from_value(
            json!({"field": "uptime_seconds", "op": "gte", "value": 0, "parity": false}),
        )
        .unwrap();
        assert!(!volatile.parity);
    }
}

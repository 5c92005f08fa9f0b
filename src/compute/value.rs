//! value.rs
//! Runtime values seen by the interpreter, and the evaluation error type.

use super::kernel::Builtin;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub use self::error::EvaluationError;
mod error {
    use crate::formula::ParseError;
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum EvaluationError {
        #[error("Syntax error: {0}")]
        Syntax(#[from] ParseError),
        #[error("'{0}' is not defined")]
        UndefinedVariable(String),
        #[error("'{0}' is not a function")]
        NotCallable(String),
        #[error("Math.{0} is not available")]
        UnknownMathMember(String),
        #[error("Type error: {0}")]
        TypeMismatch(String),
        #[error("Division by zero")]
        DivisionByZero,
        #[error("{function} expects {expected} argument(s) but received {actual}")]
        Arity { function: String, expected: String, actual: usize },
        #[error("Execution budget of {limit} steps exceeded")]
        BudgetExceeded { limit: u64 },
        #[error("Invalid formula result: {0}")]
        InvalidResult(String),
    }
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Namespaces reachable by name from a formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Math,
}

/// The atomic unit of data in the interpreter.
/// Composite values are shared so reading a bound input never deep-copies it.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Str(Arc<str>),
    Bool(bool),
    Null,
    Undefined,
    Array(Arc<Vec<Value>>),
    Object(Arc<BTreeMap<String, Value>>),
    Function(Builtin),
    Namespace(Namespace),
}

impl Value {
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Namespace(_) => "namespace",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
            Value::Null | Value::Undefined => false,
            Value::Array(_) | Value::Object(_) | Value::Function(_) | Value::Namespace(_) => true,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Strict equality: no coercion between types, `NaN` never equals itself.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Null, Value::Null) | (Value::Undefined, Value::Undefined) => true,
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => a == b,
            (Value::Namespace(a), Value::Namespace(b)) => a == b,
            _ => false,
        }
    }

    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Value::str(s),
            JsonValue::Array(items) => Value::Array(Arc::new(items.iter().map(Value::from_json).collect())),
            JsonValue::Object(map) => Value::Object(Arc::new(
                map.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect(),
            )),
        }
    }

    /// Non-finite numbers have no JSON form and become `null`, as do functions.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::Number(n) if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER => JsonValue::from(*n as i64),
            Value::Number(n) => serde_json::Number::from_f64(*n).map_or(JsonValue::Null, JsonValue::Number),
            Value::Str(s) => JsonValue::String(s.to_string()),
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Null | Value::Undefined | Value::Function(_) | Value::Namespace(_) => JsonValue::Null,
            Value::Array(items) => JsonValue::Array(items.iter().map(Value::to_json).collect()),
            Value::Object(map) => JsonValue::Object(map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Undefined => write!(f, "undefined"),
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 { write!(f, ",")?; }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(b) => write!(f, "function {}", b.name()),
            Value::Namespace(Namespace::Math) => write!(f, "[object Math]"),
        }
    }
}

/// Integral values print without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(Value::Number(0.0), false)]
    #[case(Value::Number(f64::NAN), false)]
    #[case(Value::Number(-1.0), true)]
    #[case(Value::str(""), false)]
    #[case(Value::str("0"), true)]
    #[case(Value::Null, false)]
    #[case(Value::Undefined, false)]
    #[case(Value::Array(Arc::new(vec![])), true)]
    fn test_truthiness(#[case] value: Value, #[case] expected: bool) {
        assert_eq!(value.is_truthy(), expected);
    }

    #[test]
    fn test_json_conversion_preserves_structure() {
        let json = json!({"slab": {"length": 4.5, "tags": ["a", true, null]}});
        assert_eq!(Value::from_json(&json).to_json(), json);
    }

    #[test]
    fn test_integral_numbers_serialize_as_integers() {
        assert_eq!(Value::Number(12.0).to_json(), json!(12));
        assert_eq!(Value::Number(-0.25).to_json(), json!(-0.25));
    }

    #[test]
    fn test_non_finite_numbers_serialize_as_null() {
        assert_eq!(Value::Number(f64::INFINITY).to_json(), JsonValue::Null);
    }

    #[rstest]
    #[case(3.0, "3")]
    #[case(-0.5, "-0.5")]
    #[case(f64::NAN, "NaN")]
    #[case(f64::NEG_INFINITY, "-Infinity")]
    fn test_number_formatting(#[case] n: f64, #[case] expected: &str) {
        assert_eq!(format_number(n), expected);
    }
}

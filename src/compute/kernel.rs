//! The closed function library available to formulas.
//!
//! Nothing outside these tables can be reached by name. There is no
//! clock and no random source, so evaluation stays deterministic.

use super::value::{EvaluationError, Namespace, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Abs,
    Ceil,
    Floor,
    Round,
    Trunc,
    Sign,
    Sqrt,
    Cbrt,
    Exp,
    Log,
    Log10,
    Log2,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Pow,
    Atan2,
    Hypot,
    Min,
    Max,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Math(MathFn),
    CalculateWaste,
    ApplyRegionalFactor,
    Number,
    ParseFloat,
    ParseInt,
    IsNaN,
    IsFinite,
}

const MATH_FUNCTIONS: &[(&str, MathFn)] = &[
    ("abs", MathFn::Abs),
    ("ceil", MathFn::Ceil),
    ("floor", MathFn::Floor),
    ("round", MathFn::Round),
    ("trunc", MathFn::Trunc),
    ("sign", MathFn::Sign),
    ("sqrt", MathFn::Sqrt),
    ("cbrt", MathFn::Cbrt),
    ("exp", MathFn::Exp),
    ("log", MathFn::Log),
    ("log10", MathFn::Log10),
    ("log2", MathFn::Log2),
    ("sin", MathFn::Sin),
    ("cos", MathFn::Cos),
    ("tan", MathFn::Tan),
    ("asin", MathFn::Asin),
    ("acos", MathFn::Acos),
    ("atan", MathFn::Atan),
    ("pow", MathFn::Pow),
    ("atan2", MathFn::Atan2),
    ("hypot", MathFn::Hypot),
    ("min", MathFn::Min),
    ("max", MathFn::Max),
];

const MATH_CONSTANTS: &[(&str, f64)] = &[
    ("PI", std::f64::consts::PI),
    ("E", std::f64::consts::E),
    ("LN2", std::f64::consts::LN_2),
    ("LN10", std::f64::consts::LN_10),
    ("LOG2E", std::f64::consts::LOG2_E),
    ("LOG10E", std::f64::consts::LOG10_E),
    ("SQRT2", std::f64::consts::SQRT_2),
    ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
];

const GLOBAL_FUNCTIONS: &[(&str, Builtin)] = &[
    ("calculateWaste", Builtin::CalculateWaste),
    ("applyRegionalFactor", Builtin::ApplyRegionalFactor),
    ("Number", Builtin::Number),
    ("parseFloat", Builtin::ParseFloat),
    ("parseInt", Builtin::ParseInt),
    ("isNaN", Builtin::IsNaN),
    ("isFinite", Builtin::IsFinite),
];

pub const MATH_NAMESPACE: &str = "Math";

/// Whether `name` resolves to a library global (`Math` or a top-level function).
pub fn is_global(name: &str) -> bool {
    name == MATH_NAMESPACE || GLOBAL_FUNCTIONS.iter().any(|(n, _)| *n == name)
}

pub fn global(name: &str) -> Option<Value> {
    if name == MATH_NAMESPACE {
        return Some(Value::Namespace(Namespace::Math));
    }
    GLOBAL_FUNCTIONS.iter().find(|(n, _)| *n == name).map(|(_, b)| Value::Function(*b))
}

pub fn math_member(name: &str) -> Option<Value> {
    if let Some((_, f)) = MATH_FUNCTIONS.iter().find(|(n, _)| *n == name) {
        return Some(Value::Function(Builtin::Math(*f)));
    }
    MATH_CONSTANTS.iter().find(|(n, _)| *n == name).map(|(_, c)| Value::Number(*c))
}

impl Builtin {
    pub fn name(&self) -> String {
        match self {
            Builtin::Math(f) => {
                let short = MATH_FUNCTIONS.iter().find(|(_, m)| m == f).map_or("?", |(n, _)| *n);
                format!("Math.{}", short)
            }
            other => GLOBAL_FUNCTIONS
                .iter()
                .find(|(_, b)| b == other)
                .map_or_else(|| "?".to_string(), |(n, _)| n.to_string()),
        }
    }
}

fn arity(function: &Builtin, expected: &str, args: &[Value]) -> EvaluationError {
    EvaluationError::Arity { function: function.name(), expected: expected.to_string(), actual: args.len() }
}

pub(crate) fn number_arg(function: &Builtin, args: &[Value], i: usize) -> Result<f64, EvaluationError> {
    match args.get(i) {
        Some(Value::Number(n)) => Ok(*n),
        Some(other) => Err(EvaluationError::TypeMismatch(format!(
            "{} expects a number as argument {} but received {}",
            function.name(),
            i + 1,
            other.type_name()
        ))),
        None => Err(arity(function, &(i + 1).to_string(), args)),
    }
}

fn exactly(function: &Builtin, n: usize, args: &[Value]) -> Result<(), EvaluationError> {
    if args.len() == n { Ok(()) } else { Err(arity(function, &n.to_string(), args)) }
}

/// Applies a pure library function. The two domain helpers need the execution
/// context and are dispatched by the interpreter instead.
pub fn call(function: Builtin, args: &[Value]) -> Result<Value, EvaluationError> {
    match function {
        Builtin::Math(f) => call_math(&function, f, args).map(Value::Number),
        Builtin::Number => {
            exactly(&function, 1, args)?;
            to_number(&args[0]).map(Value::Number)
        }
        Builtin::ParseFloat => {
            exactly(&function, 1, args)?;
            Ok(Value::Number(match &args[0] {
                Value::Number(n) => *n,
                other => parse_float_prefix(&other.to_string()),
            }))
        }
        Builtin::ParseInt => {
            exactly(&function, 1, args)?;
            Ok(Value::Number(match &args[0] {
                Value::Number(n) => n.trunc(),
                other => parse_float_prefix(&other.to_string()).trunc(),
            }))
        }
        Builtin::IsNaN => {
            exactly(&function, 1, args)?;
            Ok(Value::Bool(to_number(&args[0])?.is_nan()))
        }
        Builtin::IsFinite => {
            exactly(&function, 1, args)?;
            Ok(Value::Bool(to_number(&args[0])?.is_finite()))
        }
        Builtin::CalculateWaste | Builtin::ApplyRegionalFactor => {
            Err(EvaluationError::NotCallable(function.name()))
        }
    }
}

fn call_math(function: &Builtin, f: MathFn, args: &[Value]) -> Result<f64, EvaluationError> {
    let unary = |op: fn(f64) -> f64| -> Result<f64, EvaluationError> {
        exactly(function, 1, args)?;
        Ok(op(number_arg(function, args, 0)?))
    };
    match f {
        MathFn::Abs => unary(f64::abs),
        MathFn::Ceil => unary(f64::ceil),
        MathFn::Floor => unary(f64::floor),
        // Halves round towards positive infinity.
        MathFn::Round => unary(|x| (x + 0.5).floor()),
        MathFn::Trunc => unary(f64::trunc),
        MathFn::Sign => unary(|x| if x.is_nan() || x == 0.0 { x } else { x.signum() }),
        MathFn::Sqrt => unary(f64::sqrt),
        MathFn::Cbrt => unary(f64::cbrt),
        MathFn::Exp => unary(f64::exp),
        MathFn::Log => unary(f64::ln),
        MathFn::Log10 => unary(f64::log10),
        MathFn::Log2 => unary(f64::log2),
        MathFn::Sin => unary(f64::sin),
        MathFn::Cos => unary(f64::cos),
        MathFn::Tan => unary(f64::tan),
        MathFn::Asin => unary(f64::asin),
        MathFn::Acos => unary(f64::acos),
        MathFn::Atan => unary(f64::atan),
        MathFn::Pow => {
            exactly(function, 2, args)?;
            Ok(number_arg(function, args, 0)?.powf(number_arg(function, args, 1)?))
        }
        MathFn::Atan2 => {
            exactly(function, 2, args)?;
            Ok(number_arg(function, args, 0)?.atan2(number_arg(function, args, 1)?))
        }
        MathFn::Hypot => numbers(function, args).map(|ns| ns.iter().map(|n| n * n).sum::<f64>().sqrt()),
        MathFn::Min => numbers(function, args).map(|ns| {
            ns.iter().fold(f64::INFINITY, |acc, &n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) })
        }),
        MathFn::Max => numbers(function, args).map(|ns| {
            ns.iter().fold(f64::NEG_INFINITY, |acc, &n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) })
        }),
    }
}

fn numbers(function: &Builtin, args: &[Value]) -> Result<Vec<f64>, EvaluationError> {
    (0..args.len()).map(|i| number_arg(function, args, i)).collect()
}

/// Numeric conversion following the host language's `Number(x)`.
pub fn to_number(value: &Value) -> Result<f64, EvaluationError> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Null => Ok(0.0),
        Value::Undefined => Ok(f64::NAN),
        Value::Str(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Ok(0.0)
            } else {
                Ok(decimal_literal(trimmed).unwrap_or(f64::NAN))
            }
        }
        other => Err(EvaluationError::TypeMismatch(format!("cannot convert {} to a number", other.type_name()))),
    }
}

/// Longest leading numeric prefix, or `NaN` when there is none.
fn parse_float_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let unsigned = trimmed.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(trimmed);
    if unsigned.starts_with("Infinity") {
        return if trimmed.starts_with('-') { f64::NEG_INFINITY } else { f64::INFINITY };
    }
    let run = trimmed.find(|c: char| !is_decimal_char(c)).unwrap_or(trimmed.len());
    (1..=run).rev().find_map(|end| trimmed[..end].parse::<f64>().ok()).unwrap_or(f64::NAN)
}

/// Decimal text or the spelled-out `Infinity`; Rust's own `inf`/`nan` spellings are not numbers here.
fn decimal_literal(text: &str) -> Option<f64> {
    match text {
        "Infinity" | "+Infinity" => Some(f64::INFINITY),
        "-Infinity" => Some(f64::NEG_INFINITY),
        _ if text.chars().all(is_decimal_char) => text.parse().ok(),
        _ => None,
    }
}

fn is_decimal_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')
}

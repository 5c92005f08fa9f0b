//! A synchronous tree-walking interpreter over the formula arena.
use super::context::ExecutionContext;
use super::kernel::{self, Builtin};
use super::value::{EvaluationError, Namespace, Value};
use crate::formula::{BinaryOp, Expr, ExprId, Formula, LogicalOp, UnaryOp};
use std::collections::BTreeMap;
use std::sync::Arc;

pub struct Engine<'a> {
    formula: &'a Formula,
    context: &'a ExecutionContext<'a>,
    steps: u64,
    max_steps: u64,
}

impl<'a> Engine<'a> {
    pub fn new(formula: &'a Formula, context: &'a ExecutionContext<'a>, max_steps: u64) -> Self {
        Self { formula, context, steps: 0, max_steps }
    }

    /// Evaluates the formula once. The engine holds no state beyond the step counter.
    pub fn run(mut self) -> Result<Value, EvaluationError> {
        let root = self.formula.root();
        self.eval(root)
    }

    fn tick(&mut self) -> Result<(), EvaluationError> {
        self.steps += 1;
        if self.steps > self.max_steps {
            return Err(EvaluationError::BudgetExceeded { limit: self.max_steps });
        }
        Ok(())
    }

    fn eval(&mut self, id: ExprId) -> Result<Value, EvaluationError> {
        self.tick()?;
        let formula = self.formula;
        match formula.get(id) {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::str(s)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Undefined => Ok(Value::Undefined),
            Expr::Ident(name) => self
                .context
                .lookup(name)
                .ok_or_else(|| EvaluationError::UndefinedVariable(name.clone())),
            Expr::Member { object, property } => {
                let target = self.eval(*object)?;
                member(&target, property)
            }
            Expr::Index { object, index } => {
                let target = self.eval(*object)?;
                let key = self.eval(*index)?;
                index_into(&target, &key)
            }
            Expr::Call { callee, args } => {
                let function = match self.eval(*callee)? {
                    Value::Function(f) => f,
                    other => return Err(EvaluationError::NotCallable(self.describe_callee(*callee, &other))),
                };
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(*arg)?);
                }
                match function {
                    Builtin::CalculateWaste | Builtin::ApplyRegionalFactor => self.context.call_helper(function, &values),
                    other => kernel::call(other, &values),
                }
            }
            Expr::Unary { op, operand } => {
                let value = self.eval(*operand)?;
                unary(*op, &value)
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = self.eval(*lhs)?;
                let r = self.eval(*rhs)?;
                binary(*op, &l, &r)
            }
            Expr::Logical { op, lhs, rhs } => {
                let l = self.eval(*lhs)?;
                match (op, l.is_truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => Ok(l),
                    _ => self.eval(*rhs),
                }
            }
            Expr::Conditional { test, then, otherwise } => {
                if self.eval(*test)?.is_truthy() {
                    self.eval(*then)
                } else {
                    self.eval(*otherwise)
                }
            }
            Expr::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(*item)?);
                }
                Ok(Value::Array(Arc::new(values)))
            }
            Expr::Object(fields) => {
                let mut map = BTreeMap::new();
                for (key, value) in fields {
                    let v = self.eval(*value)?;
                    map.insert(key.clone(), v);
                }
                Ok(Value::Object(Arc::new(map)))
            }
        }
    }

    fn describe_callee(&self, callee: ExprId, value: &Value) -> String {
        match self.formula.get(callee) {
            Expr::Ident(name) => name.clone(),
            Expr::Member { property, .. } => property.clone(),
            _ => value.type_name().to_string(),
        }
    }
}

fn member(target: &Value, property: &str) -> Result<Value, EvaluationError> {
    match target {
        Value::Namespace(Namespace::Math) => {
            kernel::math_member(property).ok_or_else(|| EvaluationError::UnknownMathMember(property.to_string()))
        }
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Undefined)),
        Value::Array(items) if property == "length" => Ok(Value::Number(items.len() as f64)),
        Value::Str(s) if property == "length" => Ok(Value::Number(s.chars().count() as f64)),
        other => Err(EvaluationError::TypeMismatch(format!(
            "cannot read property '{}' of {}",
            property,
            other.type_name()
        ))),
    }
}

fn index_into(target: &Value, key: &Value) -> Result<Value, EvaluationError> {
    match (target, key) {
        (Value::Array(items), Value::Number(n)) => {
            if n.fract() == 0.0 && *n >= 0.0 {
                Ok(items.get(*n as usize).cloned().unwrap_or(Value::Undefined))
            } else {
                Ok(Value::Undefined)
            }
        }
        (Value::Object(_) | Value::Namespace(_) | Value::Array(_) | Value::Str(_), Value::Str(name)) => {
            member(target, name)
        }
        (Value::Object(map), Value::Number(n)) => {
            Ok(map.get(&super::value::format_number(*n)).cloned().unwrap_or(Value::Undefined))
        }
        (other, key) => Err(EvaluationError::TypeMismatch(format!(
            "cannot index {} with {}",
            other.type_name(),
            key.type_name()
        ))),
    }
}

fn unary(op: UnaryOp, value: &Value) -> Result<Value, EvaluationError> {
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
        UnaryOp::Negate | UnaryOp::Plus => {
            let n = value.as_number().ok_or_else(|| {
                let symbol = if op == UnaryOp::Negate { "-" } else { "+" };
                EvaluationError::TypeMismatch(format!("cannot apply unary '{}' to {}", symbol, value.type_name()))
            })?;
            Ok(Value::Number(if op == UnaryOp::Negate { -n } else { n }))
        }
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Remainder => "%",
        BinaryOp::Power => "**",
        BinaryOp::Less => "<",
        BinaryOp::LessEqual => "<=",
        BinaryOp::Greater => ">",
        BinaryOp::GreaterEqual => ">=",
        BinaryOp::Equal => "===",
        BinaryOp::NotEqual => "!==",
    }
}

fn mismatch(op: BinaryOp, l: &Value, r: &Value) -> EvaluationError {
    EvaluationError::TypeMismatch(format!(
        "cannot apply '{}' to {} and {}",
        symbol(op),
        l.type_name(),
        r.type_name()
    ))
}

fn binary(op: BinaryOp, l: &Value, r: &Value) -> Result<Value, EvaluationError> {
    match op {
        BinaryOp::Equal => return Ok(Value::Bool(l.strict_eq(r))),
        BinaryOp::NotEqual => return Ok(Value::Bool(!l.strict_eq(r))),
        BinaryOp::Add => {
            if matches!(l, Value::Str(_)) || matches!(r, Value::Str(_)) {
                if matches!(l, Value::Str(_) | Value::Number(_) | Value::Bool(_))
                    && matches!(r, Value::Str(_) | Value::Number(_) | Value::Bool(_))
                {
                    return Ok(Value::str(&format!("{}{}", l, r)));
                }
                return Err(mismatch(op, l, r));
            }
        }
        BinaryOp::Less | BinaryOp::LessEqual | BinaryOp::Greater | BinaryOp::GreaterEqual => {
            if let (Value::Str(a), Value::Str(b)) = (l, r) {
                let ord = a.cmp(b);
                return Ok(Value::Bool(match op {
                    BinaryOp::Less => ord.is_lt(),
                    BinaryOp::LessEqual => ord.is_le(),
                    BinaryOp::Greater => ord.is_gt(),
                    _ => ord.is_ge(),
                }));
            }
        }
        _ => {}
    }

    let (a, b) = match (l, r) {
        (Value::Number(a), Value::Number(b)) => (*a, *b),
        _ => return Err(mismatch(op, l, r)),
    };
    let result = match op {
        BinaryOp::Add => Value::Number(a + b),
        BinaryOp::Subtract => Value::Number(a - b),
        BinaryOp::Multiply => Value::Number(a * b),
        BinaryOp::Divide | BinaryOp::Remainder if b == 0.0 => return Err(EvaluationError::DivisionByZero),
        BinaryOp::Divide => Value::Number(a / b),
        BinaryOp::Remainder => Value::Number(a % b),
        BinaryOp::Power => Value::Number(a.powf(b)),
        BinaryOp::Less => Value::Bool(a < b),
        BinaryOp::LessEqual => Value::Bool(a <= b),
        BinaryOp::Greater => Value::Bool(a > b),
        BinaryOp::GreaterEqual => Value::Bool(a >= b),
        BinaryOp::Equal | BinaryOp::NotEqual => Value::Bool((a == b) == (op == BinaryOp::Equal)),
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::parse;
    use rstest::rstest;
    use std::collections::HashMap;

    fn eval_with(source: &str, bindings: &[(&str, Value)]) -> Result<Value, EvaluationError> {
        let formula = parse(source).expect("Parse failed");
        let map: HashMap<String, Value> = bindings.iter().map(|(k, v)| (k.to_string(), v.clone())).collect();
        let ctx = ExecutionContext::with_bindings(map);
        Engine::new(&formula, &ctx, 10_000).run()
    }

    fn eval(source: &str) -> Result<Value, EvaluationError> {
        eval_with(source, &[])
    }

    #[rstest]
    #[case("1 + 2 * 3", 7.0)]
    #[case("(1 + 2) * 3", 9.0)]
    #[case("2 ** 3 ** 2", 512.0)]
    #[case("-2 ** 2", -4.0)]
    #[case("10 % 4", 2.0)]
    #[case("Math.ceil(2.01) + Math.floor(2.99)", 5.0)]
    #[case("Math.max(1, Math.PI, 3)", std::f64::consts::PI)]
    #[case("true ? 1 : 2", 1.0)]
    #[case("0 || 5", 5.0)]
    #[case("3 && 4", 4.0)]
    #[case("[1, 2, 3].length", 3.0)]
    #[case("[10, 20][1]", 20.0)]
    #[case("{ a: { b: 6 } }.a.b", 6.0)]
    #[case("parseFloat('2.5 m')", 2.5)]
    fn test_arithmetic(#[case] source: &str, #[case] expected: f64) {
        assert_eq!(eval(source).unwrap(), Value::Number(expected));
    }

    #[rstest]
    #[case("1 < 2", true)]
    #[case("'a' < 'b'", true)]
    #[case("1 === 1", true)]
    #[case("1 == '1'", false)]
    #[case("NaN === NaN", false)]
    #[case("!0", true)]
    #[case("null !== undefined", true)]
    fn test_comparisons(#[case] source: &str, #[case] expected: bool) {
        assert_eq!(eval(source).unwrap(), Value::Bool(expected));
    }

    #[test]
    fn test_bindings_and_string_concat() {
        let result = eval_with("label + ': ' + qty", &[("label", Value::str("slab")), ("qty", Value::Number(4.0))]);
        assert_eq!(result.unwrap(), Value::str("slab: 4"));
    }

    #[test]
    fn test_short_circuit_skips_undefined_reference() {
        assert_eq!(eval("false && missing").unwrap(), Value::Bool(false));
        assert_eq!(eval("1 ? 2 : missing").unwrap(), Value::Number(2.0));
    }

    #[rstest]
    #[case("missing + 1", "'missing' is not defined")]
    #[case("1 / 0", "Division by zero")]
    #[case("5 % 0", "Division by zero")]
    #[case("Math.random()", "Math.random is not available")]
    #[case("true - 1", "cannot apply '-' to boolean and number")]
    #[case("null.x", "cannot read property 'x' of null")]
    #[case("(1)(2)", "'number' is not a function")]
    #[case("Math.sqrt('9')", "expects a number")]
    #[case("-'a'", "unary '-'")]
    fn test_runtime_errors(#[case] source: &str, #[case] fragment: &str) {
        let err = eval(source).unwrap_err();
        assert!(err.to_string().contains(fragment), "Msg: {}", err);
    }

    #[test]
    fn test_calling_a_bound_value_names_it() {
        let err = eval_with("area(2)", &[("area", Value::Number(3.0))]).unwrap_err();
        assert_eq!(err, EvaluationError::NotCallable("area".into()));
    }

    #[test]
    fn test_step_budget() {
        let formula = parse("1 + 1 + 1 + 1 + 1").unwrap();
        let ctx = ExecutionContext::with_bindings(HashMap::new());
        let err = Engine::new(&formula, &ctx, 3).run().unwrap_err();
        assert_eq!(err, EvaluationError::BudgetExceeded { limit: 3 });
        assert_eq!(Engine::new(&formula, &ctx, 100).run().unwrap(), Value::Number(5.0));
    }
}

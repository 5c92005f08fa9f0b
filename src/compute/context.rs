//! The closed variable and function table a formula executes against.

use super::kernel::{self, Builtin};
use super::value::{EvaluationError, Value};
use crate::model::{RegionalFactor, WasteFactor};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

/// Exactly what a formula may see: bound inputs, the function library, and the
/// waste/regional helpers configured for this call.
#[derive(Debug, Clone)]
pub struct ExecutionContext<'a> {
    bindings: HashMap<String, Value>,
    waste_factors: &'a [WasteFactor],
    include_waste: bool,
    regional_factors: Option<&'a [RegionalFactor]>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new(
        inputs: &BTreeMap<String, JsonValue>,
        waste_factors: &'a [WasteFactor],
        include_waste: bool,
        regional_factors: Option<&'a [RegionalFactor]>,
    ) -> Self {
        let bindings = inputs.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect();
        Self { bindings, waste_factors, include_waste, regional_factors }
    }

    /// A context with only the function library and the given bindings.
    pub fn with_bindings(bindings: HashMap<String, Value>) -> Self {
        Self { bindings, waste_factors: &[], include_waste: false, regional_factors: None }
    }

    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Bound names take precedence over library globals.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.bindings.get(name).cloned().or_else(|| kernel::global(name))
    }

    /// `calculateWaste(materialKey, baseQuantity)`: exact key match; applies the
    /// average waste only when waste is included for this call.
    pub fn calculate_waste(&self, material_key: &str, base: f64) -> f64 {
        if !self.include_waste {
            return base;
        }
        match self.waste_factors.iter().find(|w| w.material_type == material_key) {
            Some(w) => base * (1.0 + w.average_waste / 100.0),
            None => base,
        }
    }

    /// `applyRegionalFactor(materialKey, quantity)`: exact key match, identity otherwise.
    pub fn apply_regional_factor(&self, material_key: &str, quantity: f64) -> f64 {
        self.regional_factors
            .and_then(|factors| factors.iter().find(|r| r.material_type == material_key))
            .map_or(quantity, |r| quantity * r.adjustment_factor)
    }

    pub(crate) fn call_helper(&self, helper: Builtin, args: &[Value]) -> Result<Value, EvaluationError> {
        if args.len() != 2 {
            return Err(EvaluationError::Arity { function: helper.name(), expected: "2".into(), actual: args.len() });
        }
        let key = match &args[0] {
            Value::Str(s) => s.to_string(),
            other => {
                return Err(EvaluationError::TypeMismatch(format!(
                    "{} expects a material key string as argument 1 but received {}",
                    helper.name(),
                    other.type_name()
                )))
            }
        };
        let quantity = kernel::number_arg(&helper, args, 1)?;
        let adjusted = match helper {
            Builtin::CalculateWaste => self.calculate_waste(&key, quantity),
            Builtin::ApplyRegionalFactor => self.apply_regional_factor(&key, quantity),
            other => return kernel::call(other, args),
        };
        Ok(Value::Number(adjusted))
    }
}

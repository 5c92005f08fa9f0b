//! Maps a raw formula result onto the declared material outputs and applies
//! waste and regional adjustments.

use super::value::{EvaluationError, Value};
use crate::model::{MaterialOutput, MaterialQuantity, RegionalFactor, WasteFactor};
use std::collections::BTreeMap;

/// One declared output as read from the raw result.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResolvedField {
    pub quantity: f64,
    pub unit_price: Option<f64>,
    pub total_cost: Option<f64>,
}

/// The fixed set of named numeric fields a material formula is expected to produce.
#[derive(Debug, Clone)]
pub struct ResultSchema<'a> {
    outputs: &'a [MaterialOutput],
}

impl<'a> ResultSchema<'a> {
    pub fn new(outputs: &'a [MaterialOutput]) -> Self {
        Self { outputs }
    }

    /// The output a bare numeric result is attributed to: the one flagged main, else the first.
    pub fn main_output(&self) -> Option<&'a MaterialOutput> {
        self.outputs.iter().find(|o| o.is_main).or_else(|| self.outputs.first())
    }

    /// Resolves every declared output against the raw result, in declaration order.
    /// Absent fields resolve to zero.
    pub fn resolve(&self, raw: &Value) -> Result<Vec<ResolvedField>, EvaluationError> {
        match raw {
            Value::Object(fields) => self
                .outputs
                .iter()
                .map(|o| resolve_field(&o.name, fields.get(&o.name)))
                .collect(),
            Value::Number(n) => {
                let main = self.main_output().map(|o| o.name.as_str());
                Ok(self
                    .outputs
                    .iter()
                    .map(|o| ResolvedField {
                        quantity: if Some(o.name.as_str()) == main { *n } else { 0.0 },
                        ..Default::default()
                    })
                    .collect())
            }
            other => Err(EvaluationError::InvalidResult(format!(
                "formula must produce an object or a number, got {}",
                other.type_name()
            ))),
        }
    }

    /// Flattens the raw result into named fields for the caller.
    pub fn raw_fields(&self, raw: &Value) -> BTreeMap<String, serde_json::Value> {
        match raw {
            Value::Object(fields) => fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            other => {
                let key = self.main_output().map_or_else(|| "result".to_string(), |o| o.name.clone());
                BTreeMap::from([(key, other.to_json())])
            }
        }
    }
}

fn resolve_field(name: &str, value: Option<&Value>) -> Result<ResolvedField, EvaluationError> {
    match value {
        None | Some(Value::Null) | Some(Value::Undefined) => Ok(ResolvedField::default()),
        Some(Value::Number(n)) => Ok(ResolvedField { quantity: finite(name, *n)?, ..Default::default() }),
        Some(Value::Object(fields)) => {
            let number = |key: &str| -> Result<Option<f64>, EvaluationError> {
                match fields.get(key) {
                    None | Some(Value::Null) | Some(Value::Undefined) => Ok(None),
                    Some(Value::Number(n)) => finite(name, *n).map(Some),
                    Some(other) => Err(EvaluationError::InvalidResult(format!(
                        "'{}.{}' must be a number, got {}",
                        name,
                        key,
                        other.type_name()
                    ))),
                }
            };
            Ok(ResolvedField {
                quantity: number("quantity")?.unwrap_or(0.0),
                unit_price: number("unitPrice")?,
                total_cost: number("totalCost")?,
            })
        }
        Some(other) => Err(EvaluationError::InvalidResult(format!(
            "material output '{}' must be a number, got {}",
            name,
            other.type_name()
        ))),
    }
}

fn finite(name: &str, n: f64) -> Result<f64, EvaluationError> {
    if n.is_finite() {
        Ok(n)
    } else {
        Err(EvaluationError::InvalidResult(format!("material output '{}' is not a finite number", name)))
    }
}

/// Case-insensitive over the full Unicode range, so `HORMIGÓN` matches `Hormigón`.
fn matches_output(key: &str, output: &MaterialOutput) -> bool {
    let key = key.to_lowercase();
    key == output.category.to_lowercase() || key == output.name.to_lowercase()
}

/// Waste factor lookup by category or name, case-insensitive.
pub fn find_waste_factor<'w>(factors: &'w [WasteFactor], output: &MaterialOutput) -> Option<&'w WasteFactor> {
    factors.iter().find(|w| matches_output(&w.material_type, output))
}

pub fn find_regional_factor<'r>(factors: &'r [RegionalFactor], output: &MaterialOutput) -> Option<&'r RegionalFactor> {
    factors.iter().find(|r| matches_output(&r.material_type, output))
}

/// Base quantity, then waste, then the regional adjustment.
pub fn adjust(
    output: &MaterialOutput,
    field: ResolvedField,
    waste_factors: &[WasteFactor],
    include_waste: bool,
    regional_factors: Option<&[RegionalFactor]>,
) -> MaterialQuantity {
    let base = field.quantity;
    let waste_percentage = match find_waste_factor(waste_factors, output) {
        Some(w) if include_waste => w.average_waste,
        _ => 0.0,
    };
    let mut final_quantity = if waste_percentage != 0.0 { base * (1.0 + waste_percentage / 100.0) } else { base };

    let regional = regional_factors.and_then(|f| find_regional_factor(f, output)).map(|r| r.adjustment_factor);
    if let Some(factor) = regional {
        final_quantity *= factor;
    }

    let total_cost = field.total_cost.or_else(|| field.unit_price.map(|p| p * final_quantity));

    MaterialQuantity {
        name: output.name.clone(),
        category: output.category.clone(),
        unit: output.unit.clone(),
        is_main: output.is_main,
        base_quantity: base,
        waste_percentage,
        final_quantity,
        regional_factor: regional,
        unit_price: field.unit_price,
        total_cost,
    }
}

/// Sum of known costs; `None` when nothing was priced.
pub fn total_cost(quantities: &[MaterialQuantity]) -> Option<f64> {
    let total: f64 = quantities.iter().filter_map(|q| q.total_cost).sum();
    if total == 0.0 { None } else { Some(total) }
}

//! One material calculation: sandboxed evaluation followed by quantity post-processing.

use super::context::ExecutionContext;
use super::engine::Engine;
use super::quantities::{self, ResultSchema};
use super::value::EvaluationError;
use crate::config::EngineConfig;
use crate::formula::parse_with;
use crate::model::{EvaluationResult, MaterialOutput, RegionalFactor, WasteFactor};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Caller-supplied input values keyed by INPUT parameter name.
pub type Inputs = BTreeMap<String, JsonValue>;

/// Everything one calculation request carries besides the formula text.
#[derive(Debug, Clone, Copy)]
pub struct CalculationRequest<'a> {
    pub inputs: &'a Inputs,
    pub material_outputs: &'a [MaterialOutput],
    pub waste_factors: &'a [WasteFactor],
    pub include_waste: bool,
    pub regional_factors: Option<&'a [RegionalFactor]>,
}

/// Runs the formula once and maps its result into material quantities.
/// Failures of any kind come back as an unsuccessful result; nothing partial survives.
pub fn execute(formula: &str, request: CalculationRequest<'_>, config: &EngineConfig) -> EvaluationResult {
    debug!(outputs = request.material_outputs.len(), include_waste = request.include_waste, "executing calculation");
    match try_execute(formula, request, config) {
        Ok(result) => {
            debug!(quantities = result.quantities.len(), total_cost = ?result.total_cost, "calculation succeeded");
            result
        }
        Err(e) => {
            warn!(error = %e, "calculation failed");
            EvaluationResult::failure(e.to_string())
        }
    }
}

fn try_execute(
    source: &str,
    request: CalculationRequest<'_>,
    config: &EngineConfig,
) -> Result<EvaluationResult, EvaluationError> {
    let formula = parse_with(source, config)?;
    debug!(nodes = formula.node_count(), "formula parsed");
    let context = ExecutionContext::new(
        request.inputs,
        request.waste_factors,
        request.include_waste,
        request.regional_factors,
    );
    let raw = Engine::new(&formula, &context, config.max_steps).run()?;

    let schema = ResultSchema::new(request.material_outputs);
    let fields = schema.resolve(&raw)?;
    let quantities: Vec<_> = request
        .material_outputs
        .iter()
        .zip(fields)
        .map(|(output, field)| {
            quantities::adjust(output, field, request.waste_factors, request.include_waste, request.regional_factors)
        })
        .collect();

    Ok(EvaluationResult {
        execution_successful: true,
        raw_result: schema.raw_fields(&raw),
        total_cost: quantities::total_cost(&quantities),
        quantities,
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn outputs() -> Vec<MaterialOutput> {
        vec![
            MaterialOutput { name: "concrete".into(), unit: "m3".into(), category: "Concrete".into(), is_main: true },
            MaterialOutput { name: "rebar".into(), unit: "kg".into(), category: "Steel".into(), is_main: false },
        ]
    }

    fn waste() -> Vec<WasteFactor> {
        vec![WasteFactor {
            material_type: "concrete".into(),
            min_waste: 5.0,
            average_waste: 10.0,
            max_waste: 15.0,
            conditions: BTreeMap::new(),
        }]
    }

    fn inputs() -> Inputs {
        BTreeMap::from([("length".to_string(), json!(10)), ("width".to_string(), json!(5)), ("depth".to_string(), json!(2))])
    }

    fn run(formula: &str, include_waste: bool, regional: Option<&[RegionalFactor]>) -> EvaluationResult {
        let (inputs, outputs, waste) = (inputs(), outputs(), waste());
        let request = CalculationRequest {
            inputs: &inputs,
            material_outputs: &outputs,
            waste_factors: &waste,
            include_waste,
            regional_factors: regional,
        };
        execute(formula, request, &EngineConfig::default())
    }

    #[test]
    fn test_slab_with_waste_and_region() {
        let regions = vec![RegionalFactor { region: "coast".into(), material_type: "Concrete".into(), adjustment_factor: 1.2 }];
        let result = run("return { concrete: length * width * depth, rebar: length * 3 };", true, Some(regions.as_slice()));
        assert!(result.execution_successful, "{:?}", result.error);
        let concrete = &result.quantities[0];
        assert_eq!(concrete.base_quantity, 100.0);
        assert!((concrete.final_quantity - 132.0).abs() < 1e-9);
        let rebar = &result.quantities[1];
        assert_eq!((rebar.base_quantity, rebar.final_quantity, rebar.waste_percentage), (30.0, 30.0, 0.0));
        assert_eq!(result.raw_result.get("rebar"), Some(&json!(30)));
        assert_eq!(result.total_cost, None);
    }

    #[test]
    fn test_helpers_inside_formula() {
        let regions = vec![RegionalFactor { region: "coast".into(), material_type: "concrete".into(), adjustment_factor: 2.0 }];
        let result = run(
            "{ concrete: applyRegionalFactor('concrete', calculateWaste('concrete', length * width * depth)) }",
            true,
            Some(regions.as_slice()),
        );
        assert!(result.execution_successful);
        assert!((result.raw_result["concrete"].as_f64().unwrap() - 220.0).abs() < 1e-9);
    }

    #[test]
    fn test_missing_output_is_zero() {
        let result = run("{ concrete: length }", false, None);
        assert!(result.execution_successful);
        assert_eq!(result.quantities[1].base_quantity, 0.0);
        assert_eq!(result.quantities[1].final_quantity, 0.0);
    }

    #[test]
    fn test_runtime_failure_is_contained() {
        let result = run("{ concrete: height * 2 }", true, None);
        assert!(!result.execution_successful);
        assert_eq!(result.error.as_deref(), Some("'height' is not defined"));
        assert!(result.quantities.is_empty());
        assert!(result.raw_result.is_empty());
    }

    #[test]
    fn test_syntax_failure_is_contained() {
        let result = run("{ concrete: ", true, None);
        assert!(!result.execution_successful);
        assert!(result.error.unwrap().starts_with("Syntax error"));
    }

    #[test]
    fn test_deep_member_chain_is_a_syntax_failure() {
        let formula = format!("{{ concrete: length{} }}", ".a".repeat(8000));
        let result = run(&formula, false, None);
        assert!(!result.execution_successful);
        let message = result.error.unwrap();
        assert!(message.starts_with("Syntax error: "), "{}", message);
        assert!(message.contains("maximum depth"), "{}", message);
    }

    #[test]
    fn test_budget_breach_is_a_failed_result() {
        let (inputs, outputs) = (inputs(), outputs());
        let request = CalculationRequest {
            inputs: &inputs,
            material_outputs: &outputs,
            waste_factors: &[],
            include_waste: false,
            regional_factors: None,
        };
        let config = EngineConfig { max_steps: 2, ..Default::default() };
        let result = execute("{ concrete: length * width * depth }", request, &config);
        assert!(!result.execution_successful);
        assert!(result.error.unwrap().contains("budget"));
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let formula = "{ concrete: Math.ceil(length * width * depth / 3) , rebar: Math.sqrt(length) }";
        let first = run(formula, true, None);
        let second = run(formula, true, None);
        assert_eq!(first.quantities, second.quantities);
        for (a, b) in first.quantities.iter().zip(&second.quantities) {
            assert_eq!(a.final_quantity.to_bits(), b.final_quantity.to_bits());
        }
    }
}

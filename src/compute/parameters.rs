//! Evaluates a template's INTERNAL and OUTPUT parameter formulas in dependency order.

use super::calculation::Inputs;
use super::context::ExecutionContext;
use super::engine::Engine;
use super::value::{EvaluationError, Value};
use crate::analysis::topology::DependencyGraph;
use crate::config::EngineConfig;
use crate::formula::parse_with;
use crate::model::{Parameter, ParameterEvaluation, Scope, Template};
use crate::validation::TemplateValidator;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Inputs are checked first; formulas then run one at a time, each seeing the
/// inputs and every parameter computed before it. Any failure discards all values.
pub fn evaluate_parameters(
    template: &Template,
    inputs: &Inputs,
    include_waste: bool,
    config: &EngineConfig,
) -> ParameterEvaluation {
    debug!(template = %template.name, "evaluating parameters");

    let errors = TemplateValidator::new(config).check_inputs(template, inputs);
    if !errors.is_empty() {
        warn!(template = %template.name, errors = errors.len(), "inputs rejected");
        return ParameterEvaluation { success: false, errors, ..Default::default() };
    }

    match try_evaluate(template, inputs, include_waste, config) {
        Ok(evaluation) => evaluation,
        Err(message) => {
            warn!(template = %template.name, error = %message, "parameter evaluation failed");
            ParameterEvaluation { success: false, errors: vec![message], ..Default::default() }
        }
    }
}

fn try_evaluate(
    template: &Template,
    inputs: &Inputs,
    include_waste: bool,
    config: &EngineConfig,
) -> Result<ParameterEvaluation, String> {
    let order = DependencyGraph::build(&template.parameters)
        .evaluation_order()
        .map_err(|cycle| format!("Circular dependency detected: {}", cycle))?;

    let mut by_name: HashMap<&str, &Parameter> = HashMap::new();
    for p in &template.parameters {
        by_name.entry(p.name.as_str()).or_insert(p);
    }

    let mut resolved = inputs.clone();
    for p in template.parameters_in_scope(Scope::Input) {
        let absent = resolved.get(&p.name).map_or(true, |v| v.is_null());
        if let (true, Some(default)) = (absent, &p.default_value) {
            resolved.insert(p.name.clone(), default.clone());
        }
    }

    let regional = Some(template.regional_factors.as_slice()).filter(|r| !r.is_empty());
    let mut context = ExecutionContext::new(&resolved, &template.waste_factors, include_waste, regional);
    let mut evaluation = ParameterEvaluation { success: true, values: resolved.clone(), ..Default::default() };

    for name in &order {
        let Some(p) = by_name.get(name.as_str()) else { continue };
        if p.scope == Scope::Input {
            continue;
        }
        let Some(formula) = p.formula_text() else { continue };

        let value = evaluate_one(formula, &context, config)
            .map_err(|e| format!("Parameter '{}': {}", p.name, e))?;
        let json = value.to_json();
        context.bind(p.name.clone(), value);
        evaluation.values.insert(p.name.clone(), json.clone());
        if p.scope == Scope::Output {
            evaluation.outputs.insert(p.name.clone(), json);
        }
    }

    debug!(template = %template.name, outputs = evaluation.outputs.len(), "parameters evaluated");
    Ok(evaluation)
}

fn evaluate_one(source: &str, context: &ExecutionContext<'_>, config: &EngineConfig) -> Result<Value, EvaluationError> {
    let formula = parse_with(source, config)?;
    Engine::new(&formula, context, config.max_steps).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataType, WasteFactor};
    use serde_json::json;
    use std::collections::BTreeMap;

    fn slab() -> Template {
        let mut width = Parameter::new("width", DataType::Number, Scope::Input);
        width.default_value = Some(json!(4));
        let mut length = Parameter::new("length", DataType::Number, Scope::Input);
        length.is_required = true;
        length.min_value = Some(0.0);

        let mut t = Template::new("Slab", "Slab volume", "{ concrete: volume }")
            // Declared before its dependencies on purpose.
            .with_parameter(Parameter::new("volume", DataType::Number, Scope::Output).with_formula("calculateWaste('concrete', area * 0.5)"))
            .with_parameter(Parameter::new("area", DataType::Number, Scope::Internal).with_formula("length * width"))
            .with_parameter(length)
            .with_parameter(width);
        t.waste_factors = vec![WasteFactor {
            material_type: "concrete".into(),
            min_waste: 5.0,
            average_waste: 10.0,
            max_waste: 15.0,
            conditions: BTreeMap::new(),
        }];
        t
    }

    #[test]
    fn test_dependency_order_and_defaults() {
        let inputs = BTreeMap::from([("length".to_string(), json!(10))]);
        let result = evaluate_parameters(&slab(), &inputs, false, &EngineConfig::default());
        assert!(result.success, "{:?}", result.errors);
        assert_eq!(result.values["area"], json!(40));
        assert_eq!(result.values["width"], json!(4));
        assert_eq!(result.outputs, BTreeMap::from([("volume".to_string(), json!(20))]));
    }

    #[test]
    fn test_waste_helper_sees_flag() {
        let inputs = BTreeMap::from([("length".to_string(), json!(10))]);
        let result = evaluate_parameters(&slab(), &inputs, true, &EngineConfig::default());
        assert!((result.outputs["volume"].as_f64().unwrap() - 22.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_inputs_stop_evaluation() {
        let inputs = BTreeMap::from([("length".to_string(), json!(-3))]);
        let result = evaluate_parameters(&slab(), &inputs, false, &EngineConfig::default());
        assert!(!result.success);
        assert_eq!(result.errors, vec!["Parameter 'length' must be at least 0"]);
        assert!(result.values.is_empty());
    }

    #[test]
    fn test_runtime_failure_names_parameter() {
        let mut t = slab();
        t.parameters[1].formula = Some("length / 0".into());
        let inputs = BTreeMap::from([("length".to_string(), json!(10))]);
        let result = evaluate_parameters(&t, &inputs, false, &EngineConfig::default());
        assert!(!result.success);
        assert!(result.errors[0].starts_with("Parameter 'area': "));
        assert!(result.outputs.is_empty());
    }

    #[test]
    fn test_cycle_is_refused() {
        let mut t = slab();
        t.parameters[1].formula = Some("volume * 2".into());
        let inputs = BTreeMap::from([("length".to_string(), json!(10))]);
        let result = evaluate_parameters(&t, &inputs, false, &EngineConfig::default());
        assert_eq!(result.errors, vec!["Circular dependency detected: volume -> area -> volume"]);
    }
}

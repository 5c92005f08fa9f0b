//! Template validation and sandboxed formula evaluation for material calculations.
//!
//! Templates are authored by domain experts and are untrusted. [`validate_template`]
//! checks one before it is stored; [`execute_calculation`] runs a validated formula
//! against caller inputs inside a closed namespace and derives material quantities.

pub mod analysis;
pub mod compute;
pub mod config;
pub mod formula;
pub mod model;
pub mod validation;

#[cfg(feature = "python")]
pub mod bindings;

pub use analysis::{FormulaError, FormulaValidation};
pub use compute::{CalculationRequest, EvaluationError, Inputs};
pub use config::{ConfigError, EngineConfig};
pub use model::{
    DataType, EvaluationResult, MaterialOutput, MaterialQuantity, Parameter, ParameterEvaluation,
    RegionalFactor, Scope, Template, WasteFactor,
};
pub use validation::{TemplateValidator, ValidationReport};

/// Entry point carrying resource limits. The free functions use the defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormulaEngine {
    config: EngineConfig,
}

impl FormulaEngine {
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn validate_template(&self, template: &Template) -> ValidationReport {
        TemplateValidator::new(&self.config).report(template)
    }

    pub fn validate_templates(&self, templates: &[Template]) -> Vec<ValidationReport> {
        TemplateValidator::new(&self.config).report_all(templates)
    }

    pub fn validate_formula<S: AsRef<str>>(&self, formula: &str, parameter_names: &[S]) -> FormulaValidation {
        analysis::validate_formula(formula, parameter_names, &self.config)
    }

    pub fn execute_calculation(&self, formula: &str, request: CalculationRequest<'_>) -> EvaluationResult {
        compute::execute(formula, request, &self.config)
    }

    pub fn evaluate_parameters(&self, template: &Template, inputs: &Inputs, include_waste: bool) -> ParameterEvaluation {
        compute::evaluate_parameters(template, inputs, include_waste, &self.config)
    }

    pub fn check_inputs(&self, template: &Template, inputs: &Inputs) -> Vec<String> {
        TemplateValidator::new(&self.config).check_inputs(template, inputs)
    }
}

pub fn validate_template(template: &Template) -> ValidationReport {
    FormulaEngine::default().validate_template(template)
}

/// Validates independent templates in parallel.
pub fn validate_templates(templates: &[Template]) -> Vec<ValidationReport> {
    FormulaEngine::default().validate_templates(templates)
}

pub fn validate_formula<S: AsRef<str>>(formula: &str, parameter_names: &[S]) -> FormulaValidation {
    FormulaEngine::default().validate_formula(formula, parameter_names)
}

pub fn execute_calculation(
    formula: &str,
    inputs: &Inputs,
    material_outputs: &[MaterialOutput],
    waste_factors: &[WasteFactor],
    include_waste: bool,
    regional_factors: Option<&[RegionalFactor]>,
) -> EvaluationResult {
    let request = CalculationRequest { inputs, material_outputs, waste_factors, include_waste, regional_factors };
    FormulaEngine::default().execute_calculation(formula, request)
}

pub fn evaluate_parameters(template: &Template, inputs: &Inputs, include_waste: bool) -> ParameterEvaluation {
    FormulaEngine::default().evaluate_parameters(template, inputs, include_waste)
}

pub fn check_inputs(template: &Template, inputs: &Inputs) -> Vec<String> {
    FormulaEngine::default().check_inputs(template, inputs)
}

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// The compiled `_core` extension module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    bindings::python::register(m)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn template_json() -> serde_json::Value {
        json!({
            "name": "Concrete slab",
            "description": "Slab volume",
            "formula": "return { concrete: length * width * depth };",
            "parameters": [
                {"name": "length", "dataType": "NUMBER", "scope": "INPUT", "isRequired": true, "minValue": 0},
                {"name": "width", "dataType": "NUMBER", "scope": "INPUT", "defaultValue": 5},
                {"name": "depth", "dataType": "NUMBER", "scope": "INPUT", "defaultValue": 0.2},
                {"name": "volume", "dataType": "NUMBER", "scope": "OUTPUT", "formula": "length * width * depth"}
            ],
            "materialOutputs": [{"name": "concrete", "unit": "m3", "category": "Concrete", "isMain": true}],
            "wasteFactors": [{"materialType": "concrete", "minWaste": 5, "averageWaste": 10, "maxWaste": 15}]
        })
    }

    #[test]
    fn test_template_round_trip_through_json() {
        let template: Template = serde_json::from_value(template_json()).unwrap();
        assert!(template.is_active);
        assert_eq!(template.version, 1);
        let report = validate_template(&template);
        assert!(report.is_valid, "{:?}", report.errors);
        assert_eq!(serde_json::to_value(&report).unwrap(), json!({"isValid": true, "errors": []}));
    }

    #[rstest]
    #[case(true, 110.0)]
    #[case(false, 100.0)]
    fn test_waste_flag(#[case] include_waste: bool, #[case] expected: f64) {
        let outputs = vec![MaterialOutput { name: "concrete".into(), unit: "m3".into(), category: "Concrete".into(), is_main: true }];
        let waste = vec![WasteFactor { material_type: "concrete".into(), min_waste: 5.0, average_waste: 10.0, max_waste: 15.0, conditions: BTreeMap::new() }];
        let inputs = BTreeMap::from([("base".to_string(), json!(100))]);
        let result = execute_calculation("{ concrete: base }", &inputs, &outputs, &waste, include_waste, None);
        assert!(result.execution_successful);
        assert!((result.quantities[0].final_quantity - expected).abs() < 1e-9);
    }

    #[test]
    fn test_free_functions_agree_with_engine() {
        let template: Template = serde_json::from_value(template_json()).unwrap();
        let inputs = BTreeMap::from([("length".to_string(), json!(10))]);
        let evaluation = evaluate_parameters(&template, &inputs, false);
        assert!(evaluation.success, "{:?}", evaluation.errors);
        assert_eq!(evaluation.outputs["volume"], json!(10));
        assert!(check_inputs(&template, &BTreeMap::new()).contains(&"Parameter 'length' is required".to_string()));
        assert!(validate_formula("length * 2", &["length"]).is_valid);
    }

    #[test]
    fn test_engine_rejects_zero_limits() {
        let config = EngineConfig { max_steps: 0, ..Default::default() };
        assert_eq!(FormulaEngine::new(config).unwrap_err(), ConfigError::ZeroLimit { field: "maxSteps" });
    }

    #[test]
    fn test_reports_serialize_for_callers() {
        let mut template: Template = serde_json::from_value(template_json()).unwrap();
        template.parameters.retain(|p| p.scope == Scope::Input);
        let report = validate_template(&template);
        assert!(!report.is_valid);
        assert!(report.errors.contains(&"Template must have at least one OUTPUT parameter".to_string()));
    }
}

use crate::compute::{CalculationRequest, Inputs};
use crate::config::EngineConfig;
use crate::model::{MaterialOutput, RegionalFactor, Template, WasteFactor};
use crate::FormulaEngine;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

fn from_json<T: DeserializeOwned>(what: &str, text: &str) -> PyResult<T> {
    serde_json::from_str(text).map_err(|e| PyValueError::new_err(format!("Invalid {} JSON: {}", what, e)))
}

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyValueError::new_err(e.to_string()))
}

fn engine(config_json: Option<&str>) -> PyResult<FormulaEngine> {
    let config = match config_json {
        Some(text) => EngineConfig::from_json(text),
        None => Ok(EngineConfig::default()),
    };
    config
        .and_then(FormulaEngine::new)
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

/// Returns `{"isValid": bool, "errors": [...]}` as JSON.
#[pyfunction]
#[pyo3(signature = (template_json, config_json=None))]
fn validate_template(template_json: &str, config_json: Option<&str>) -> PyResult<String> {
    let template: Template = from_json("template", template_json)?;
    to_json(&engine(config_json)?.validate_template(&template))
}

#[pyfunction]
#[pyo3(signature = (formula, parameter_names, config_json=None))]
fn validate_formula(formula: &str, parameter_names: Vec<String>, config_json: Option<&str>) -> PyResult<String> {
    to_json(&engine(config_json)?.validate_formula(formula, parameter_names.as_slice()))
}

#[pyfunction]
#[pyo3(signature = (formula, inputs_json, outputs_json, waste_json="[]", include_waste=true, regional_json=None, config_json=None))]
fn execute_calculation(
    formula: &str,
    inputs_json: &str,
    outputs_json: &str,
    waste_json: &str,
    include_waste: bool,
    regional_json: Option<&str>,
    config_json: Option<&str>,
) -> PyResult<String> {
    let inputs: Inputs = from_json("inputs", inputs_json)?;
    let outputs: Vec<MaterialOutput> = from_json("material outputs", outputs_json)?;
    let waste: Vec<WasteFactor> = from_json("waste factors", waste_json)?;
    let regional: Option<Vec<RegionalFactor>> = regional_json.map(|t| from_json("regional factors", t)).transpose()?;

    let request = CalculationRequest {
        inputs: &inputs,
        material_outputs: &outputs,
        waste_factors: &waste,
        include_waste,
        regional_factors: regional.as_deref(),
    };
    to_json(&engine(config_json)?.execute_calculation(formula, request))
}

#[pyfunction]
#[pyo3(signature = (template_json, inputs_json, include_waste=true))]
fn evaluate_parameters(template_json: &str, inputs_json: &str, include_waste: bool) -> PyResult<String> {
    let template: Template = from_json("template", template_json)?;
    let inputs: Inputs = from_json("inputs", inputs_json)?;
    to_json(&engine(None)?.evaluate_parameters(&template, &inputs, include_waste))
}

/// Adds the functions to the `_core` module.
pub(crate) fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(validate_template, m)?)?;
    m.add_function(wrap_pyfunction!(validate_formula, m)?)?;
    m.add_function(wrap_pyfunction!(execute_calculation, m)?)?;
    m.add_function(wrap_pyfunction!(evaluate_parameters, m)?)?;
    Ok(())
}

//! The central validator that orchestrates the execution of all validation rules.
use super::error::{ValidationError, ValidationReport};
use super::rules::{formulas, inputs, outputs, parameters, structure};
use crate::config::EngineConfig;
use crate::model::Template;
use rayon::prelude::*;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// The orchestrator for template validation.
///
/// Runs every rule against a template and collects all problems before anything
/// is stored or executed, so an author sees the whole list at once.
pub struct TemplateValidator<'a> {
    config: &'a EngineConfig,
}

impl<'a> TemplateValidator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Executes all registered validation rules against the template.
    ///
    /// # Returns
    /// - `Ok(())` if no validation errors are found.
    /// - `Err(Vec<ValidationError>)` containing every error discovered.
    pub fn validate(&self, template: &Template) -> Result<(), Vec<ValidationError>> {
        let mut errors = structure::validate_structure(template);

        let names: HashSet<&str> = template.parameter_names().into_iter().collect();
        for p in &template.parameters {
            errors.extend(parameters::validate_parameter(p, &names));
        }

        let checked = formulas::validate_formulas(template, &names, self.config);
        errors.extend(checked.errors);
        // A cycle over formulas that do not parse would be meaningless.
        if checked.parameters_ok {
            errors.extend(formulas::validate_cycles(template));
        }

        errors.extend(outputs::validate_material_outputs(template, checked.main.as_ref()));
        errors.extend(outputs::validate_factors(template));

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn report(&self, template: &Template) -> ValidationReport {
        debug!(template = %template.name, parameters = template.parameters.len(), "validating template");
        let report = match self.validate(template) {
            Ok(()) => ValidationReport::from_errors(&[]),
            Err(errors) => ValidationReport::from_errors(&errors),
        };
        debug!(template = %template.name, is_valid = report.is_valid, errors = report.errors.len(), "template validated");
        report
    }

    /// Validates independent templates in parallel; reports keep the input order.
    pub fn report_all(&self, templates: &[Template]) -> Vec<ValidationReport> {
        templates.par_iter().map(|t| self.report(t)).collect()
    }

    /// Caller inputs against the template's INPUT parameter constraints.
    pub fn check_inputs(&self, template: &Template, values: &BTreeMap<String, JsonValue>) -> Vec<String> {
        inputs::validate_inputs(template, values).into_iter().map(|e| e.message).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataType, MaterialOutput, Parameter, Scope};

    fn slab() -> Template {
        let mut t = Template::new("Concrete slab", "Slab volume with waste", "return { concrete: volume };")
            .with_parameter(Parameter::new("length", DataType::Number, Scope::Input))
            .with_parameter(Parameter::new("width", DataType::Number, Scope::Input))
            .with_parameter(Parameter::new("area", DataType::Number, Scope::Internal).with_formula("length * width"))
            .with_parameter(Parameter::new("volume", DataType::Number, Scope::Output).with_formula("area * 0.2"));
        t.material_outputs = vec![MaterialOutput { name: "concrete".into(), unit: "m3".into(), category: "Concrete".into(), is_main: true }];
        t
    }

    fn messages(t: &Template) -> Vec<String> {
        TemplateValidator::new(&EngineConfig::default()).report(t).errors
    }

    #[test]
    fn test_valid_template() {
        let report = TemplateValidator::new(&EngineConfig::default()).report(&slab());
        assert!(report.is_valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_errors_accumulate() {
        let mut t = slab();
        t.description.clear();
        t.parameters.push(Parameter::new("length", DataType::Number, Scope::Internal));
        t.formula = "volume * ghost".into();
        let errors = messages(&t);
        assert!(errors.contains(&"Template description is required".to_string()));
        assert!(errors.contains(&"Duplicate parameter name: 'length'".to_string()));
        assert!(errors.contains(&"Main formula: Unknown identifiers: ghost".to_string()));
    }

    #[test]
    fn test_cycle_is_reported() {
        let mut t = slab();
        t.parameters[2].formula = Some("volume / 0.2".into());
        assert!(messages(&t).contains(&"Circular dependency detected: area -> volume -> area".to_string()));
    }

    #[test]
    fn test_cycle_check_skipped_when_formulas_fail() {
        let mut t = slab();
        t.parameters[2].formula = Some("volume / (".into());
        t.parameters[3].formula = Some("area * 0.2".into());
        let errors = messages(&t);
        assert!(errors.iter().any(|e| e.starts_with("Parameter 'area' formula: Syntax error")));
        assert!(!errors.iter().any(|e| e.starts_with("Circular dependency")));
    }

    #[test]
    fn test_batch_keeps_order() {
        let mut broken = slab();
        broken.parameters.retain(|p| p.scope != Scope::Output);
        let reports = TemplateValidator::new(&EngineConfig::default()).report_all(&[slab(), broken, slab()]);
        let verdicts: Vec<bool> = reports.iter().map(|r| r.is_valid).collect();
        assert_eq!(verdicts, vec![true, false, true]);
    }
}

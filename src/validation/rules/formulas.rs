//! Formula acceptance for the main formula and every parameter formula,
//! followed by the dependency cycle check.

use crate::analysis::identifiers::check_formula;
use crate::analysis::topology::DependencyGraph;
use crate::config::EngineConfig;
use crate::formula::Formula;
use crate::model::Template;
use crate::validation::error::{ValidationError, ValidationErrorType};
use std::collections::HashSet;

pub(crate) struct FormulaCheck {
    pub errors: Vec<ValidationError>,
    /// The parsed main formula, when it was accepted.
    pub main: Option<Formula>,
    pub parameters_ok: bool,
}

pub(crate) fn validate_formulas(template: &Template, names: &HashSet<&str>, config: &EngineConfig) -> FormulaCheck {
    let mut errors = Vec::new();

    let main = match check_formula(&template.formula, names, config) {
        Ok(parsed) => Some(parsed),
        Err(failures) => {
            errors.extend(failures.into_iter().map(|e| {
                ValidationError::template(ValidationErrorType::Formula, format!("Main formula: {}", e))
            }));
            None
        }
    };

    let mut parameters_ok = true;
    for p in &template.parameters {
        let Some(formula) = p.formula_text() else { continue };
        if let Err(failures) = check_formula(formula, names, config) {
            parameters_ok = false;
            errors.extend(failures.into_iter().map(|e| {
                ValidationError::for_subject(&p.name, ValidationErrorType::Formula, format!("Parameter '{}' formula: {}", p.name, e))
            }));
        }
    }

    FormulaCheck { errors, main, parameters_ok }
}

pub(crate) fn validate_cycles(template: &Template) -> Option<ValidationError> {
    DependencyGraph::build(&template.parameters).detect_cycle().err().map(|cycle| {
        let subject = cycle.members.first().cloned().unwrap_or_default();
        ValidationError::for_subject(&subject, ValidationErrorType::Cycle, format!("Circular dependency detected: {}", cycle))
    })
}

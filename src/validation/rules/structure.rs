//! Template-level shape: required fields, scope cardinality, unique names.

use crate::model::{Scope, Template};
use crate::validation::error::{ValidationError, ValidationErrorType};
use std::collections::HashSet;

pub(crate) fn validate_structure(template: &Template) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let structure = |message: String| ValidationError::template(ValidationErrorType::Structure, message);

    if template.name.trim().is_empty() {
        errors.push(structure("Template name is required".into()));
    }
    if template.description.trim().is_empty() {
        errors.push(structure("Template description is required".into()));
    }

    for scope in [Scope::Input, Scope::Output] {
        if template.parameters_in_scope(scope).next().is_none() {
            errors.push(structure(format!("Template must have at least one {} parameter", scope.as_str())));
        }
    }

    let mut seen = HashSet::new();
    let mut reported = HashSet::new();
    for (i, p) in template.parameters.iter().enumerate() {
        if p.name.trim().is_empty() {
            errors.push(structure(format!("Parameter at position {} must have a name", i + 1)));
            continue;
        }
        if !seen.insert(p.name.as_str()) && reported.insert(p.name.as_str()) {
            errors.push(ValidationError::for_subject(
                &p.name,
                ValidationErrorType::Structure,
                format!("Duplicate parameter name: '{}'", p.name),
            ));
        }
    }
    errors
}

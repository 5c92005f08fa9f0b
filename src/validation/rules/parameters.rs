//! Per-parameter declaration checks.

use super::inputs::{allowed_values, check_value};
use crate::model::{DataType, Parameter, Scope};
use crate::validation::error::{ValidationError, ValidationErrorType};
use regex::Regex;
use std::collections::HashSet;

pub(crate) fn validate_parameter(p: &Parameter, known: &HashSet<&str>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    if p.name.trim().is_empty() {
        return errors;
    }
    let mut push = |message: String| {
        errors.push(ValidationError::for_subject(&p.name, ValidationErrorType::Parameter, format!("Parameter '{}': {}", p.name, message)));
    };

    match p.data_type {
        DataType::Number => {
            if let (Some(min), Some(max)) = (p.min_value, p.max_value) {
                if min >= max {
                    push("minValue must be less than maxValue".into());
                }
            }
        }
        DataType::Enum => {
            if allowed_values(p).map_or(true, |list| list.is_empty()) {
                push("ENUM parameters require a non-empty list of allowed values".into());
            }
        }
        DataType::String => {
            if let Some(pattern) = p.validation_pattern.as_deref() {
                if let Err(e) = Regex::new(pattern) {
                    push(format!("invalid validation pattern: {}", e));
                }
            }
        }
        _ => {}
    }

    match (p.scope, p.formula_text()) {
        (Scope::Output, None) => push("OUTPUT parameters must declare a formula".into()),
        (Scope::Input, Some(_)) => push("INPUT parameters cannot declare a formula".into()),
        _ => {}
    }

    for dep in &p.depends_on {
        if !known.contains(dep.as_str()) {
            push(format!("dependsOn references unknown parameter '{}'", dep));
        }
    }

    if let Some(default) = p.default_value.as_ref().filter(|v| !v.is_null()) {
        if let Err(problem) = check_value(p, default) {
            push(format!("default value {}", problem));
        }
    }
    errors
}

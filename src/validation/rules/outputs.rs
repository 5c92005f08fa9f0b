//! Material outputs and the waste/regional factor tables.

use crate::formula::Formula;
use crate::model::Template;
use crate::validation::error::{ValidationError, ValidationErrorType};
use std::collections::HashSet;

pub(crate) fn validate_material_outputs(template: &Template, main: Option<&Formula>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let keys = main.and_then(Formula::result_keys);
    let mut seen = HashSet::new();

    for (i, output) in template.material_outputs.iter().enumerate() {
        if output.name.trim().is_empty() {
            errors.push(ValidationError::template(
                ValidationErrorType::Material,
                format!("Material output at position {} must have a name", i + 1),
            ));
            continue;
        }
        let material = |message: String| ValidationError::for_subject(&output.name, ValidationErrorType::Material, message);

        if !seen.insert(output.name.as_str()) {
            errors.push(material(format!("Duplicate material output name: '{}'", output.name)));
            continue;
        }
        if output.unit.trim().is_empty() {
            errors.push(material(format!("Material output '{}': unit is required", output.name)));
        }
        if let Some(keys) = &keys {
            if !keys.contains(&output.name.as_str()) {
                errors.push(material(format!("Material output '{}' is not produced by the main formula", output.name)));
            }
        }
    }
    errors
}

pub(crate) fn validate_factors(template: &Template) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for w in &template.waste_factors {
        let ordered = 0.0 <= w.min_waste && w.min_waste <= w.average_waste && w.average_waste <= w.max_waste;
        if !ordered {
            errors.push(ValidationError::for_subject(
                &w.material_type,
                ValidationErrorType::Material,
                format!("Waste factor '{}': expected 0 <= minWaste <= averageWaste <= maxWaste", w.material_type),
            ));
        }
    }
    for r in &template.regional_factors {
        if !(r.adjustment_factor.is_finite() && r.adjustment_factor > 0.0) {
            errors.push(ValidationError::for_subject(
                &r.material_type,
                ValidationErrorType::Material,
                format!("Regional factor '{}' ({}): adjustment factor must be a positive number", r.material_type, r.region),
            ));
        }
    }
    errors
}

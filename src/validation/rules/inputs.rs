//! Value constraints declared on a parameter: type tag, bounds, allowed values, pattern.
//! Applied to caller inputs and to declared defaults.

use crate::compute::value::format_number;
use crate::model::{DataType, Parameter, Scope, Template};
use crate::validation::error::{ValidationError, ValidationErrorType};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Allowed values as a list, whether stored as a JSON array or as a string holding one.
/// `None` when absent or undecodable.
pub(crate) fn allowed_values(p: &Parameter) -> Option<Vec<JsonValue>> {
    match p.allowed_values.as_ref()? {
        JsonValue::Array(items) => Some(items.clone()),
        JsonValue::String(text) => serde_json::from_str::<Vec<JsonValue>>(text).ok(),
        _ => None,
    }
}

fn type_matches(data_type: DataType, value: &JsonValue) -> bool {
    match data_type {
        DataType::Number => value.is_number(),
        DataType::String | DataType::Date => value.is_string(),
        DataType::Boolean => value.is_boolean(),
        DataType::Enum => value.is_string() || value.is_number(),
        DataType::Object => value.is_object(),
        DataType::Array => value.is_array(),
    }
}

fn type_label(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Number => "a number",
        DataType::String => "a string",
        DataType::Date => "a date string",
        DataType::Boolean => "a boolean",
        DataType::Enum => "one of the allowed values",
        DataType::Object => "an object",
        DataType::Array => "an array",
    }
}

/// Checks one value against the parameter's declaration; the error is the
/// unqualified problem, e.g. `must be at least 0`.
pub(crate) fn check_value(p: &Parameter, value: &JsonValue) -> Result<(), String> {
    if !type_matches(p.data_type, value) {
        return Err(format!("must be {}", type_label(p.data_type)));
    }

    if let Some(n) = value.as_f64() {
        if let Some(min) = p.min_value.filter(|_| p.data_type == DataType::Number) {
            if n < min {
                return Err(format!("must be at least {}", format_number(min)));
            }
        }
        if let Some(max) = p.max_value.filter(|_| p.data_type == DataType::Number) {
            if n > max {
                return Err(format!("must be at most {}", format_number(max)));
            }
        }
    }

    if let (Some(text), Some(pattern)) = (value.as_str(), p.validation_pattern.as_deref()) {
        if p.data_type == DataType::String {
            // An uncompilable pattern is reported by the declaration checks instead.
            if let Ok(re) = Regex::new(pattern) {
                if !re.is_match(text) {
                    return Err(format!("does not match the pattern '{}'", pattern));
                }
            }
        }
    }

    if let Some(allowed) = allowed_values(p).filter(|list| !list.is_empty()) {
        if !allowed.contains(value) {
            let listed: Vec<String> = allowed.iter().map(|v| v.to_string()).collect();
            return Err(format!("must be one of {}", listed.join(", ")));
        }
    }
    Ok(())
}

/// Caller inputs against the template's INPUT parameters. Null counts as absent;
/// an absent input is fine when the parameter is optional or has a default.
pub(crate) fn validate_inputs(template: &Template, inputs: &BTreeMap<String, JsonValue>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for p in template.parameters_in_scope(Scope::Input) {
        match inputs.get(&p.name).filter(|v| !v.is_null()) {
            None if p.is_required && p.default_value.is_none() => errors.push(ValidationError::for_subject(
                &p.name,
                ValidationErrorType::Input,
                format!("Parameter '{}' is required", p.name),
            )),
            None => {}
            Some(value) => {
                if let Err(problem) = check_value(p, value) {
                    errors.push(ValidationError::for_subject(
                        &p.name,
                        ValidationErrorType::Input,
                        format!("Parameter '{}' {}", p.name, problem),
                    ));
                }
            }
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn number(min: Option<f64>, max: Option<f64>) -> Parameter {
        let mut p = Parameter::new("length", DataType::Number, Scope::Input);
        p.min_value = min;
        p.max_value = max;
        p
    }

    #[rstest]
    #[case(json!(5), Ok(()))]
    #[case(json!(0), Ok(()))]
    #[case(json!(-1), Err("must be at least 0".to_string()))]
    #[case(json!(100.5), Err("must be at most 100".to_string()))]
    #[case(json!("5"), Err("must be a number".to_string()))]
    fn test_number_bounds(#[case] value: JsonValue, #[case] expected: Result<(), String>) {
        assert_eq!(check_value(&number(Some(0.0), Some(100.0)), &value), expected);
    }

    #[rstest]
    #[case(json!(["C20", "C25"]))]
    #[case(json!("[\"C20\", \"C25\"]"))]
    fn test_allowed_values_both_encodings(#[case] allowed: JsonValue) {
        let mut p = Parameter::new("grade", DataType::Enum, Scope::Input);
        p.allowed_values = Some(allowed);
        assert_eq!(check_value(&p, &json!("C25")), Ok(()));
        assert_eq!(check_value(&p, &json!("C30")), Err("must be one of \"C20\", \"C25\"".to_string()));
    }

    #[test]
    fn test_pattern_is_applied_to_strings() {
        let mut p = Parameter::new("code", DataType::String, Scope::Input);
        p.validation_pattern = Some("^[A-Z]{2}-\\d+$".into());
        assert!(check_value(&p, &json!("AB-12")).is_ok());
        assert!(check_value(&p, &json!("ab-12")).unwrap_err().starts_with("does not match"));
    }

    #[test]
    fn test_required_inputs() {
        let mut required = number(None, None);
        required.is_required = true;
        let mut defaulted = Parameter::new("width", DataType::Number, Scope::Input);
        defaulted.is_required = true;
        defaulted.default_value = Some(json!(2));
        let template = Template::new("Slab", "d", "length").with_parameter(required).with_parameter(defaulted);

        let errors = validate_inputs(&template, &BTreeMap::from([("length".to_string(), JsonValue::Null)]));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Parameter 'length' is required");
        assert!(validate_inputs(&template, &BTreeMap::from([("length".to_string(), json!(3))])).is_empty());
    }
}

//! Defines the error types for the validation module.
use serde::{Deserialize, Serialize};
use std::fmt;

/// The specific category of a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationErrorType {
    /// Missing template fields, scope cardinality, duplicate names.
    Structure,
    /// A parameter's own declaration is inconsistent.
    Parameter,
    /// Unknown identifiers or syntax failures in a formula.
    Formula,
    /// The parameter dependency graph is not acyclic.
    Cycle,
    /// Material outputs or their waste/regional factors.
    Material,
    /// A caller-supplied input violates its parameter's constraints.
    Input,
}

/// One problem found in a template. `subject` names the parameter or output it
/// belongs to, when there is one, so a UI can attribute it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    pub subject: Option<String>,
    pub error_type: ValidationErrorType,
    pub message: String,
}

impl ValidationError {
    pub fn template(error_type: ValidationErrorType, message: impl Into<String>) -> Self {
        Self { subject: None, error_type, message: message.into() }
    }

    pub fn for_subject(subject: &str, error_type: ValidationErrorType, message: impl Into<String>) -> Self {
        Self { subject: Some(subject.to_string()), error_type, message: message.into() }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// The verdict handed back to the persistence layer; `errors` is surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: &[ValidationError]) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors: errors.iter().map(|e| e.message.clone()).collect(),
        }
    }
}

//! Static validation of templates before they are stored or run.
pub mod error;
mod rules;
pub mod validator;

pub use error::{ValidationError, ValidationErrorType, ValidationReport};
pub use validator::TemplateValidator;

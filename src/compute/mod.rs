//! Sandboxed formula evaluation and material quantity post-processing.
pub mod calculation;
pub mod context;
pub mod engine;
pub mod kernel;
pub mod parameters;
pub mod quantities;
pub mod value;

pub use calculation::{execute, CalculationRequest, Inputs};
pub use context::ExecutionContext;
pub use engine::Engine;
pub use parameters::evaluate_parameters;
pub use value::{EvaluationError, Value};

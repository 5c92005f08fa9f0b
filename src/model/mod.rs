//! Value objects exchanged with the persistence and transport layers.
pub mod types;

pub use types::{
    DataType, EvaluationResult, MaterialOutput, MaterialQuantity, Parameter, ParameterEvaluation,
    RegionalFactor, Scope, Template, WasteFactor,
};

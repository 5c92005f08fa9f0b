//! Static analysis of formula text and of the parameter dependency graph.
pub mod identifiers;
pub mod topology;

pub use identifiers::{validate_formula, FormulaError, FormulaValidation};
pub use topology::{Cycle, DependencyGraph};

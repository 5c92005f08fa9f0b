//! Individual validation rules, each a pure function over a template.
pub(crate) mod formulas;
pub(crate) mod inputs;
pub(crate) mod outputs;
pub(crate) mod parameters;
pub(crate) mod structure;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// The data-type tag of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Number,
    String,
    Boolean,
    Date,
    Enum,
    Object,
    Array,
}

/// Whether a parameter is supplied by the caller, computed and hidden, or computed and surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Scope {
    Input,
    Internal,
    Output,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Input => "INPUT",
            Scope::Internal => "INTERNAL",
            Scope::Output => "OUTPUT",
        }
    }
}

/// A named value slot on a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub data_type: DataType,
    pub scope: Scope,
    #[serde(default)]
    pub display_order: u32,
    #[serde(default)]
    pub is_required: bool,
    #[serde(default)]
    pub default_value: Option<JsonValue>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
    #[serde(default)]
    pub validation_pattern: Option<String>,
    /// Either a JSON array or a string holding a JSON array.
    #[serde(default)]
    pub allowed_values: Option<JsonValue>,
    #[serde(default)]
    pub formula: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Parameter {
    /// Builds a parameter with every optional field unset.
    pub fn new(name: impl Into<String>, data_type: DataType, scope: Scope) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            data_type,
            scope,
            display_order: 0,
            is_required: false,
            default_value: None,
            min_value: None,
            max_value: None,
            validation_pattern: None,
            allowed_values: None,
            formula: None,
            depends_on: Vec::new(),
        }
    }

    pub fn with_formula(mut self, formula: impl Into<String>) -> Self {
        self.formula = Some(formula.into());
        self
    }

    /// The formula text, if one is declared and not blank.
    pub fn formula_text(&self) -> Option<&str> {
        self.formula.as_deref().filter(|f| !f.trim().is_empty())
    }
}

/// A named quantity a material-calculation formula is expected to produce.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialOutput {
    pub name: String,
    pub unit: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub is_main: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasteFactor {
    pub material_type: String,
    #[serde(default)]
    pub min_waste: f64,
    pub average_waste: f64,
    #[serde(default)]
    pub max_waste: f64,
    #[serde(default)]
    pub conditions: BTreeMap<String, JsonValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionalFactor {
    #[serde(default)]
    pub region: String,
    pub material_type: String,
    pub adjustment_factor: f64,
}

/// A user-authored calculation definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub formula: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub template_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub target_profession: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub parent_template_id: Option<String>,
    #[serde(default)]
    pub material_outputs: Vec<MaterialOutput>,
    #[serde(default)]
    pub waste_factors: Vec<WasteFactor>,
    #[serde(default)]
    pub regional_factors: Vec<RegionalFactor>,
}

fn default_true() -> bool { true }
fn default_version() -> u32 { 1 }

impl Template {
    pub fn new(name: impl Into<String>, description: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: description.into(),
            formula: formula.into(),
            parameters: Vec::new(),
            template_type: None,
            category: None,
            target_profession: None,
            is_active: true,
            is_verified: false,
            version: 1,
            parent_template_id: None,
            material_outputs: Vec::new(),
            waste_factors: Vec::new(),
            regional_factors: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    pub fn parameters_in_scope(&self, scope: Scope) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(move |p| p.scope == scope)
    }
}

/// The adjusted quantity for one declared material output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialQuantity {
    pub name: String,
    pub category: String,
    pub unit: String,
    pub is_main: bool,
    pub base_quantity: f64,
    pub waste_percentage: f64,
    pub final_quantity: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional_factor: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
}

/// The outcome of one formula execution.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationResult {
    pub execution_successful: bool,
    pub raw_result: BTreeMap<String, JsonValue>,
    pub quantities: Vec<MaterialQuantity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_cost: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EvaluationResult {
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            execution_successful: false,
            error: Some(message.into()),
            ..Default::default()
        }
    }
}

/// Outcome of evaluating a template's INTERNAL and OUTPUT parameter formulas in dependency order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterEvaluation {
    pub success: bool,
    /// Every resolved value, inputs and INTERNAL parameters included.
    pub values: BTreeMap<String, JsonValue>,
    /// OUTPUT parameters only.
    pub outputs: BTreeMap<String, JsonValue>,
    pub errors: Vec<String>,
}

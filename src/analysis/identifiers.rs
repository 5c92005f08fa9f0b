//! Identifier whitelisting and syntax acceptance for a single formula.

use crate::compute::kernel;
use crate::config::EngineConfig;
use crate::formula::keywords;
use crate::formula::lexer::{is_ident_continue, is_ident_start};
use crate::formula::{parse_with, Formula, ParseError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormulaError {
    #[error("Formula cannot be empty")]
    Empty,
    #[error("Unknown identifiers: {}", .0.join(", "))]
    UnknownIdentifiers(Vec<String>),
    #[error("Syntax error: {0}")]
    Syntax(ParseError),
}

/// What an identifier found in a formula refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierClass {
    Keyword,
    Library,
    Parameter,
    Unknown,
}

pub fn classify(name: &str, parameter_names: &HashSet<&str>) -> IdentifierClass {
    if keywords::is_keyword(name) {
        IdentifierClass::Keyword
    } else if kernel::is_global(name) {
        IdentifierClass::Library
    } else if parameter_names.contains(name) {
        IdentifierClass::Parameter
    } else {
        IdentifierClass::Unknown
    }
}

/// Top-level identifiers in one left-to-right pass, deduplicated in first-occurrence order.
///
/// String literal contents, member properties (`x.prop`) and object literal keys
/// are skipped. A member of the `Math` namespace that the library does not define
/// is reported in qualified form (`Math.random`) so the whitelist can reject it.
pub fn scan_identifiers(formula: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut push = |name: String| {
        if !found.contains(&name) {
            found.push(name);
        }
    };

    let chars: Vec<(usize, char)> = formula.char_indices().collect();
    let mut brackets: Vec<char> = Vec::new();
    // Last significant token: 'i' identifier, 'v' literal, otherwise the punctuation itself.
    let mut prev = '\0';
    let mut last_ident: Option<&str> = None;
    let mut member_of: Option<&str> = None;
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c == '"' || c == '\'' || c == '`' {
            i += 1;
            while i < chars.len() && chars[i].1 != c {
                i += if chars[i].1 == '\\' { 2 } else { 1 };
            }
            i += 1;
            prev = 'v';
            continue;
        }

        if c.is_ascii_digit() {
            while i < chars.len() && (is_ident_continue(chars[i].1) || chars[i].1 == '.') {
                i += 1;
            }
            prev = 'v';
            continue;
        }

        if is_ident_start(c) {
            let mut j = i;
            while j < chars.len() && is_ident_continue(chars[j].1) {
                j += 1;
            }
            let end = chars.get(j).map_or(formula.len(), |&(at, _)| at);
            let name = &formula[start..end];

            if prev == '.' {
                if member_of == Some(kernel::MATH_NAMESPACE) && kernel::math_member(name).is_none() {
                    push(format!("{}.{}", kernel::MATH_NAMESPACE, name));
                }
            } else if !is_object_key(&chars, j, prev, &brackets) {
                push(name.to_string());
            }

            last_ident = Some(name);
            prev = 'i';
            i = j;
            continue;
        }

        match c {
            '.' => member_of = if prev == 'i' { last_ident } else { None },
            '(' | '[' | '{' => brackets.push(c),
            ')' | ']' | '}' => {
                brackets.pop();
            }
            _ => {}
        }
        prev = c;
        i += 1;
    }
    found
}

/// An identifier directly inside `{`, after `{` or `,`, and followed by `:` is a key.
fn is_object_key(chars: &[(usize, char)], after: usize, prev: char, brackets: &[char]) -> bool {
    if brackets.last() != Some(&'{') || !(prev == '{' || prev == ',') {
        return false;
    }
    chars[after..].iter().find(|(_, c)| !c.is_whitespace()).map_or(false, |&(_, c)| c == ':')
}

/// Unknown identifiers in `formula`, given the declared parameter names.
pub fn unknown_identifiers(formula: &str, parameter_names: &HashSet<&str>) -> Vec<String> {
    scan_identifiers(formula)
        .into_iter()
        .filter(|name| name.contains('.') || classify(name, parameter_names) == IdentifierClass::Unknown)
        .collect()
}

/// Runs the blank check, the whitelist check and the syntax check.
/// The last two are independent, so both failures are reported together.
pub fn check_formula(
    formula: &str,
    parameter_names: &HashSet<&str>,
    config: &EngineConfig,
) -> Result<Formula, Vec<FormulaError>> {
    if formula.trim().is_empty() {
        return Err(vec![FormulaError::Empty]);
    }

    let mut errors = Vec::new();
    let unknown = unknown_identifiers(formula, parameter_names);
    if !unknown.is_empty() {
        errors.push(FormulaError::UnknownIdentifiers(unknown));
    }
    match parse_with(formula, config) {
        Ok(parsed) if errors.is_empty() => Ok(parsed),
        Ok(_) => Err(errors),
        Err(e) => {
            errors.push(FormulaError::Syntax(e));
            Err(errors)
        }
    }
}

/// Standalone verdict for one formula, e.g. for live-editing feedback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormulaValidation {
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub fn validate_formula<S: AsRef<str>>(formula: &str, parameter_names: &[S], config: &EngineConfig) -> FormulaValidation {
    let names: HashSet<&str> = parameter_names.iter().map(|s| s.as_ref()).collect();
    match check_formula(formula, &names, config) {
        Ok(_) => FormulaValidation { is_valid: true, error: None },
        Err(errors) => FormulaValidation {
            is_valid: false,
            error: Some(errors.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; ")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn names<'a>(list: &[&'a str]) -> HashSet<&'a str> {
        list.iter().copied().collect()
    }

    #[rstest]
    #[case("length * width", vec!["length", "width"])]
    #[case("Math.ceil(a) + Math.PI", vec!["Math", "a"])]
    #[case("'width' + \"depth\" + x", vec!["x"])]
    #[case("{ concrete: a, 'steel': b }", vec!["a", "b"])]
    #[case("a ? b : c", vec!["a", "b", "c"])]
    #[case("{ k: a ? b : c }", vec!["a", "b", "c"])]
    #[case("obj.field.nested", vec!["obj"])]
    #[case("$total + _base + 1.5e3", vec!["$total", "_base"])]
    #[case("x + x + x", vec!["x"])]
    #[case("42", vec![])]
    fn test_scan(#[case] formula: &str, #[case] expected: Vec<&str>) {
        assert_eq!(scan_identifiers(formula), expected);
    }

    #[test]
    fn test_unknown_math_member_is_qualified() {
        assert_eq!(scan_identifiers("Math.random() * 2"), vec!["Math", "Math.random"]);
    }

    #[test]
    fn test_classification() {
        let params = names(&["area"]);
        assert_eq!(classify("return", &params), IdentifierClass::Keyword);
        assert_eq!(classify("Math", &params), IdentifierClass::Library);
        assert_eq!(classify("calculateWaste", &params), IdentifierClass::Library);
        assert_eq!(classify("area", &params), IdentifierClass::Parameter);
        assert_eq!(classify("window", &params), IdentifierClass::Unknown);
    }

    #[test]
    fn test_all_unknowns_are_listed() {
        let result = validate_formula("a + foo * bar + Math.sqrt(baz)", &["a"], &EngineConfig::default());
        assert!(!result.is_valid);
        assert_eq!(result.error.as_deref(), Some("Unknown identifiers: foo, bar, baz"));
    }

    #[test]
    fn test_syntax_error_is_distinct() {
        let result = validate_formula("a +* 2", &["a"], &EngineConfig::default());
        assert!(result.error.unwrap().starts_with("Syntax error: "));
    }

    #[test]
    fn test_both_failures_reported() {
        let errors = check_formula("ghost + (", &names(&[]), &EngineConfig::default()).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], FormulaError::UnknownIdentifiers(_)));
        assert!(matches!(errors[1], FormulaError::Syntax(_)));
    }

    #[rstest]
    #[case("")]
    #[case("   \n")]
    fn test_blank_formula(#[case] formula: &str) {
        let result = validate_formula::<&str>(formula, &[], &EngineConfig::default());
        assert_eq!(result.error.as_deref(), Some("Formula cannot be empty"));
    }

    #[rstest]
    #[case("3.14 * 2")]
    #[case("return { concrete: length * 2 };")]
    #[case("Math.max(length, 1) > 2 ? calculateWaste('concrete', length) : 0")]
    fn test_valid_formulas(#[case] formula: &str) {
        let result = validate_formula(formula, &["length"], &EngineConfig::default());
        assert!(result.is_valid, "{:?}", result.error);
    }

    #[test]
    fn test_reserved_word_passes_whitelist_but_fails_parse() {
        let errors = check_formula("new Date()", &names(&[]), &EngineConfig::default()).unwrap_err();
        assert_eq!(errors, vec![
            FormulaError::UnknownIdentifiers(vec!["Date".into()]),
            FormulaError::Syntax(ParseError::new(0, "reserved word 'new' is not allowed in formulas")),
        ]);
    }
}

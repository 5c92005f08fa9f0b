//! Reserved words recognised inside formulas.

/// Words the grammar gives meaning to.
pub const LITERAL_KEYWORDS: &[&str] = &["true", "false", "null", "undefined", "NaN", "Infinity", "return"];

/// Reserved by the host expression language but not part of the formula grammar.
/// The identifier check lets them through; the parser rejects them.
pub const RESERVED_WORDS: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do",
    "else", "export", "extends", "finally", "for", "function", "if", "import", "in", "instanceof",
    "let", "new", "of", "super", "switch", "this", "throw", "try", "typeof", "var", "void",
    "while", "with", "yield",
];

pub fn is_keyword(word: &str) -> bool {
    LITERAL_KEYWORDS.contains(&word) || RESERVED_WORDS.contains(&word)
}

pub fn is_reserved(word: &str) -> bool {
    RESERVED_WORDS.contains(&word)
}

//! Formula text to expression tree: lexing, parsing and the arena AST.
pub mod ast;
pub mod error;
pub mod keywords;
pub mod lexer;
pub mod parser;

pub use ast::{BinaryOp, Expr, ExprId, Formula, LogicalOp, UnaryOp};
pub use error::ParseError;
pub use parser::{parse, parse_with};

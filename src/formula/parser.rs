//! Hand-written recursive descent parser producing an arena `Formula`.
//!
//! Precedence, loosest first: ternary, `||`, `&&`, equality, comparison,
//! additive, multiplicative, unary, `**` (right-associative), postfix.

use super::ast::{Args, BinaryOp, Expr, ExprId, Formula, LogicalOp, UnaryOp};
use super::error::ParseError;
use super::keywords;
use super::lexer::{tokenize, Spanned, Token};
use crate::config::EngineConfig;

/// Parses a formula body using the default limits.
pub fn parse(source: &str) -> Result<Formula, ParseError> {
    parse_with(source, &EngineConfig::default())
}

pub fn parse_with(source: &str, config: &EngineConfig) -> Result<Formula, ParseError> {
    if source.len() > config.max_formula_length {
        return Err(ParseError::new(
            config.max_formula_length,
            format!("formula exceeds the maximum length of {} characters", config.max_formula_length),
        ));
    }
    if source.trim().is_empty() {
        return Err(ParseError::new(0, "formula is empty"));
    }

    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0, depth: 0, max_depth: config.max_nesting_depth, formula: Formula::default() };

    if matches!(parser.peek(), Token::Ident(w) if w == "return") {
        parser.advance();
    }
    let root = parser.conditional()?;
    while parser.check(&Token::Semicolon) {
        parser.advance();
    }
    if !parser.check(&Token::Eof) {
        return Err(parser.unexpected("end of formula"));
    }
    parser.formula.set_root(root);
    Ok(parser.formula)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    max_depth: usize,
    formula: Formula,
}

impl Parser {
    fn peek(&self) -> &Token {
        // The token stream always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.pos].token
    }

    fn position(&self) -> usize {
        self.tokens[self.pos].start
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn check(&self, token: &Token) -> bool {
        self.peek() == token
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), ParseError> {
        if self.check(&token) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected(what))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::new(self.position(), format!("expected {} but found {}", expected, self.peek().describe()))
    }

    fn enter(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ParseError::new(
                self.position(),
                format!("expression nesting exceeds the maximum depth of {}", self.max_depth),
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn conditional(&mut self) -> Result<ExprId, ParseError> {
        self.enter()?;
        let test = self.logical_or()?;
        let result = if self.check(&Token::Question) {
            self.advance();
            let then = self.conditional()?;
            self.expect(Token::Colon, "':' in conditional expression")?;
            let otherwise = self.conditional()?;
            self.formula.push(Expr::Conditional { test, then, otherwise })
        } else {
            test
        };
        self.leave();
        Ok(result)
    }

    // Operator chains build left-deep trees, so each link counts towards the depth limit.
    fn logical_level(
        &mut self,
        token: Token,
        op: LogicalOp,
        next: fn(&mut Self) -> Result<ExprId, ParseError>,
    ) -> Result<ExprId, ParseError> {
        let mut lhs = next(self)?;
        let mut links = 0;
        while self.check(&token) {
            self.advance();
            self.enter()?;
            links += 1;
            let rhs = next(self)?;
            lhs = self.formula.push(Expr::Logical { op, lhs, rhs });
        }
        self.depth -= links;
        Ok(lhs)
    }

    fn logical_or(&mut self) -> Result<ExprId, ParseError> {
        self.logical_level(Token::OrOr, LogicalOp::Or, Self::logical_and)
    }

    fn logical_and(&mut self) -> Result<ExprId, ParseError> {
        self.logical_level(Token::AndAnd, LogicalOp::And, Self::equality)
    }

    fn binary_level(
        &mut self,
        next: fn(&mut Self) -> Result<ExprId, ParseError>,
        op_for: fn(&Token) -> Option<BinaryOp>,
    ) -> Result<ExprId, ParseError> {
        let mut lhs = next(self)?;
        let mut links = 0;
        while let Some(op) = op_for(self.peek()) {
            self.advance();
            self.enter()?;
            links += 1;
            let rhs = next(self)?;
            lhs = self.formula.push(Expr::Binary { op, lhs, rhs });
        }
        self.depth -= links;
        Ok(lhs)
    }

    fn equality(&mut self) -> Result<ExprId, ParseError> {
        self.binary_level(Self::comparison, |t| match t {
            Token::EqEq | Token::EqEqEq => Some(BinaryOp::Equal),
            Token::NotEq | Token::NotEqEq => Some(BinaryOp::NotEqual),
            _ => None,
        })
    }

    fn comparison(&mut self) -> Result<ExprId, ParseError> {
        self.binary_level(Self::additive, |t| match t {
            Token::Lt => Some(BinaryOp::Less),
            Token::Le => Some(BinaryOp::LessEqual),
            Token::Gt => Some(BinaryOp::Greater),
            Token::Ge => Some(BinaryOp::GreaterEqual),
            _ => None,
        })
    }

    fn additive(&mut self) -> Result<ExprId, ParseError> {
        self.binary_level(Self::multiplicative, |t| match t {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Subtract),
            _ => None,
        })
    }

    fn multiplicative(&mut self) -> Result<ExprId, ParseError> {
        self.binary_level(Self::unary, |t| match t {
            Token::Star => Some(BinaryOp::Multiply),
            Token::Slash => Some(BinaryOp::Divide),
            Token::Percent => Some(BinaryOp::Remainder),
            _ => None,
        })
    }

    fn unary(&mut self) -> Result<ExprId, ParseError> {
        let op = match self.peek() {
            Token::Minus => UnaryOp::Negate,
            Token::Plus => UnaryOp::Plus,
            Token::Bang => UnaryOp::Not,
            _ => return self.power(),
        };
        self.advance();
        self.enter()?;
        let operand = self.unary()?;
        self.leave();
        Ok(self.formula.push(Expr::Unary { op, operand }))
    }

    fn power(&mut self) -> Result<ExprId, ParseError> {
        let base = self.postfix()?;
        if self.check(&Token::StarStar) {
            self.advance();
            self.enter()?;
            let exponent = self.unary()?;
            self.leave();
            return Ok(self.formula.push(Expr::Binary { op: BinaryOp::Power, lhs: base, rhs: exponent }));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<ExprId, ParseError> {
        let mut expr = self.primary()?;
        let mut links = 0;
        loop {
            if matches!(self.peek(), Token::Dot | Token::LBracket | Token::LParen) {
                self.enter()?;
                links += 1;
            }
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let property = match self.peek() {
                        Token::Ident(property) => property.clone(),
                        _ => return Err(self.unexpected("property name after '.'")),
                    };
                    self.advance();
                    expr = self.formula.push(Expr::Member { object: expr, property });
                }
                Token::LBracket => {
                    self.advance();
                    let index = self.conditional()?;
                    self.expect(Token::RBracket, "']'")?;
                    expr = self.formula.push(Expr::Index { object: expr, index });
                }
                Token::LParen => {
                    self.advance();
                    let args = self.list(Token::RParen, "')'")?;
                    expr = self.formula.push(Expr::Call { callee: expr, args });
                }
                _ => {
                    self.depth -= links;
                    return Ok(expr);
                }
            }
        }
    }

    /// Comma-separated expressions up to `close`; a trailing comma is tolerated.
    fn list(&mut self, close: Token, what: &str) -> Result<Args, ParseError> {
        let mut items = Args::new();
        while !self.check(&close) {
            items.push(self.conditional()?);
            if self.check(&Token::Comma) {
                self.advance();
            } else if !self.check(&close) {
                return Err(self.unexpected(&format!("',' or {}", what)));
            }
        }
        self.advance();
        Ok(items)
    }

    fn primary(&mut self) -> Result<ExprId, ParseError> {
        let start = self.position();
        let expr = match self.peek().clone() {
            Token::Number(n) => Expr::Number(n),
            Token::Str(s) => Expr::Str(s),
            Token::Ident(word) => match word.as_str() {
                "true" => Expr::Bool(true),
                "false" => Expr::Bool(false),
                "null" => Expr::Null,
                "undefined" => Expr::Undefined,
                "NaN" => Expr::Number(f64::NAN),
                "Infinity" => Expr::Number(f64::INFINITY),
                "return" => return Err(ParseError::new(start, "'return' is only allowed at the start of a formula")),
                w if keywords::is_reserved(w) => {
                    return Err(ParseError::new(start, format!("reserved word '{}' is not allowed in formulas", w)))
                }
                _ => Expr::Ident(word),
            },
            Token::LParen => {
                self.advance();
                let inner = self.conditional()?;
                self.expect(Token::RParen, "')'")?;
                return Ok(inner);
            }
            Token::LBracket => {
                self.advance();
                self.enter()?;
                let items = self.list(Token::RBracket, "']'")?;
                self.leave();
                return Ok(self.formula.push(Expr::Array(items)));
            }
            Token::LBrace => {
                self.advance();
                self.enter()?;
                let fields = self.object_fields()?;
                self.leave();
                return Ok(self.formula.push(Expr::Object(fields)));
            }
            _ => return Err(self.unexpected("an expression")),
        };
        self.advance();
        Ok(self.formula.push(expr))
    }

    fn object_fields(&mut self) -> Result<Vec<(String, ExprId)>, ParseError> {
        let mut fields: Vec<(String, ExprId)> = Vec::new();
        while !self.check(&Token::RBrace) {
            let key_at = self.position();
            let key = match self.peek() {
                Token::Ident(name) | Token::Str(name) => name.clone(),
                Token::Number(n) => format_key(*n),
                _ => return Err(self.unexpected("a property name")),
            };
            self.advance();
            if fields.iter().any(|(k, _)| *k == key) {
                return Err(ParseError::new(key_at, format!("duplicate property '{}' in object literal", key)));
            }
            self.expect(Token::Colon, "':' after property name")?;
            let value = self.conditional()?;
            fields.push((key, value));
            if self.check(&Token::Comma) {
                self.advance();
            } else if !self.check(&Token::RBrace) {
                return Err(self.unexpected("',' or '}'"));
            }
        }
        self.advance();
        Ok(fields)
    }
}

fn format_key(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_precedence_multiplication_binds_tighter() {
        let f = parse("a + b * c").unwrap();
        assert_eq!(f.node_count(), 5);
        match f.get(f.root()) {
            Expr::Binary { op: BinaryOp::Add, rhs, .. } => {
                assert!(matches!(f.get(*rhs), Expr::Binary { op: BinaryOp::Multiply, .. }));
            }
            other => panic!("Unexpected root: {:?}", other),
        }
    }

    #[test]
    fn test_power_is_right_associative() {
        let f = parse("2 ** 3 ** 2").unwrap();
        match f.get(f.root()) {
            Expr::Binary { op: BinaryOp::Power, lhs, rhs } => {
                assert_eq!(f.get(*lhs), &Expr::Number(2.0));
                assert!(matches!(f.get(*rhs), Expr::Binary { op: BinaryOp::Power, .. }));
            }
            other => panic!("Unexpected root: {:?}", other),
        }
    }

    #[test]
    fn test_return_object_literal() {
        let f = parse("return { concrete: length * width * depth, 'rebar kg': Math.ceil(length) };").unwrap();
        assert_eq!(f.result_keys(), Some(vec!["concrete", "rebar kg"]));
        assert_eq!(f.free_identifiers(), vec!["length", "width", "depth", "Math"]);
    }

    #[test]
    fn test_ternary_and_member_keys_are_not_free() {
        let f = parse("area > 10 ? { total: area } : { total: Math.PI }").unwrap();
        assert_eq!(f.free_identifiers(), vec!["area", "Math"]);
    }

    #[rstest]
    #[case("a +", "expected an expression")]
    #[case("(a + b", "expected ')'")]
    #[case("a b", "expected end of formula")]
    #[case("if (a) b", "reserved word 'if'")]
    #[case("new Date()", "reserved word 'new'")]
    #[case("{ a: 1, a: 2 }", "duplicate property 'a'")]
    #[case("a ? b", "':' in conditional")]
    #[case("Math.", "property name after '.'")]
    #[case("   ", "formula is empty")]
    fn test_syntax_errors(#[case] source: &str, #[case] fragment: &str) {
        let err = parse(source).unwrap_err();
        assert!(err.message.contains(fragment), "Msg: {}", err.message);
    }

    #[test]
    fn test_nesting_limit() {
        let config = EngineConfig { max_nesting_depth: 8, ..Default::default() };
        let deep = format!("{}1{}", "(".repeat(20), ")".repeat(20));
        let err = parse_with(&deep, &config).unwrap_err();
        assert!(err.message.contains("maximum depth"));
        assert!(parse_with("((1))", &config).is_ok());
    }

    #[rstest]
    #[case(format!("x{}", ".a".repeat(40)))]
    #[case(format!("f{}", "()".repeat(40)))]
    #[case(format!("m{}", "[0]".repeat(40)))]
    fn test_postfix_chain_counts_towards_depth(#[case] chain: String) {
        let config = EngineConfig { max_nesting_depth: 16, ..Default::default() };
        assert!(parse_with(&chain, &config).unwrap_err().message.contains("maximum depth"));
        assert!(parse_with("x.a.b(1)[0].c", &config).is_ok());
    }

    #[test]
    fn test_long_operator_chain_counts_towards_depth() {
        let config = EngineConfig { max_nesting_depth: 16, ..Default::default() };
        let chain = vec!["1"; 40].join(" + ");
        assert!(parse_with(&chain, &config).unwrap_err().message.contains("maximum depth"));
        assert!(parse_with(&vec!["1"; 10].join(" + "), &config).is_ok());
    }

    #[test]
    fn test_length_limit() {
        let config = EngineConfig { max_formula_length: 4, ..Default::default() };
        assert!(parse_with("1 + 2 + 3", &config).unwrap_err().message.contains("maximum length"));
    }

    #[test]
    fn test_trailing_commas() {
        assert!(parse("[1, 2,]").is_ok());
        assert!(parse("{ a: 1, }").is_ok());
        assert!(parse("Math.max(1, 2,)").is_ok());
    }
}

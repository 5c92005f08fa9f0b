//! lexer.rs
//! Turns formula text into a flat token stream with byte offsets.

use super::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Colon,
    Question,
    Semicolon,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    Lt,
    Le,
    Gt,
    Ge,
    EqEq,
    NotEq,
    EqEqEq,
    NotEqEq,
    AndAnd,
    OrOr,
    Eof,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Number(n) => format!("number {}", n),
            Token::Str(s) => format!("string \"{}\"", s),
            Token::Ident(name) => format!("'{}'", name),
            Token::Eof => "end of formula".to_string(),
            other => format!("'{}'", other.symbol()),
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Comma => ",",
            Token::Dot => ".",
            Token::Colon => ":",
            Token::Question => "?",
            Token::Semicolon => ";",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::StarStar => "**",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Bang => "!",
            Token::Lt => "<",
            Token::Le => "<=",
            Token::Gt => ">",
            Token::Ge => ">=",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::EqEqEq => "===",
            Token::NotEqEq => "!==",
            Token::AndAnd => "&&",
            Token::OrOr => "||",
            Token::Number(_) | Token::Str(_) | Token::Ident(_) | Token::Eof => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub start: usize,
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

pub(crate) fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ParseError> {
    let mut lexer = Lexer { chars: source.char_indices().peekable(), len: source.len(), tokens: Vec::new() };
    lexer.run(source)?;
    Ok(lexer.tokens)
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    len: usize,
    tokens: Vec<Spanned>,
}

impl<'a> Lexer<'a> {
    fn run(&mut self, source: &str) -> Result<(), ParseError> {
        while let Some(&(start, c)) = self.chars.peek() {
            if c.is_whitespace() {
                self.chars.next();
                continue;
            }

            let token = if c.is_ascii_digit() || (c == '.' && self.next_is_digit(source, start)) {
                self.number(source, start)?
            } else if is_ident_start(c) {
                self.identifier(source, start)
            } else if c == '"' || c == '\'' {
                self.string(start, c)?
            } else {
                self.chars.next();
                self.punctuation(start, c)?
            };
            self.tokens.push(Spanned { token, start });
        }
        self.tokens.push(Spanned { token: Token::Eof, start: self.len });
        Ok(())
    }

    fn next_is_digit(&self, source: &str, dot_at: usize) -> bool {
        source[dot_at + 1..].chars().next().map_or(false, |c| c.is_ascii_digit())
    }

    fn eat(&mut self, expected: char) -> bool {
        if matches!(self.chars.peek(), Some(&(_, c)) if c == expected) {
            self.chars.next();
            true
        } else {
            false
        }
    }

    fn end_of_run(&mut self, pred: impl Fn(char) -> bool) -> usize {
        while let Some(&(_, c)) = self.chars.peek() {
            if !pred(c) { break; }
            self.chars.next();
        }
        self.chars.peek().map_or(self.len, |&(i, _)| i)
    }

    fn number(&mut self, source: &str, start: usize) -> Result<Token, ParseError> {
        let mut end = self.end_of_run(|c| c.is_ascii_digit());
        if self.eat('.') {
            end = self.end_of_run(|c| c.is_ascii_digit());
        }
        if matches!(self.chars.peek(), Some(&(_, 'e' | 'E'))) {
            self.chars.next();
            if matches!(self.chars.peek(), Some(&(_, '+' | '-'))) {
                self.chars.next();
            }
            end = self.end_of_run(|c| c.is_ascii_digit());
        }
        // "12abc" is one malformed token, not a number followed by a name.
        if matches!(self.chars.peek(), Some(&(_, c)) if is_ident_continue(c)) {
            end = self.end_of_run(is_ident_continue);
            return Err(ParseError::new(start, format!("invalid numeric literal '{}'", &source[start..end])));
        }
        let text = &source[start..end];
        text.parse::<f64>()
            .map(Token::Number)
            .map_err(|_| ParseError::new(start, format!("invalid numeric literal '{}'", text)))
    }

    fn identifier(&mut self, source: &str, start: usize) -> Token {
        let end = self.end_of_run(is_ident_continue);
        Token::Ident(source[start..end].to_string())
    }

    fn string(&mut self, start: usize, quote: char) -> Result<Token, ParseError> {
        self.chars.next();
        let mut value = String::new();
        loop {
            match self.chars.next() {
                None => return Err(ParseError::new(start, "unterminated string literal")),
                Some((_, c)) if c == quote => return Ok(Token::Str(value)),
                Some((at, '\\')) => match self.chars.next() {
                    Some((_, 'n')) => value.push('\n'),
                    Some((_, 't')) => value.push('\t'),
                    Some((_, 'r')) => value.push('\r'),
                    Some((_, c @ ('\\' | '\'' | '"'))) => value.push(c),
                    Some((_, other)) => {
                        return Err(ParseError::new(at, format!("unsupported escape sequence '\\{}'", other)))
                    }
                    None => return Err(ParseError::new(start, "unterminated string literal")),
                },
                Some((_, c)) => value.push(c),
            }
        }
    }

    fn punctuation(&mut self, start: usize, c: char) -> Result<Token, ParseError> {
        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            ',' => Token::Comma,
            '.' => Token::Dot,
            ':' => Token::Colon,
            '?' => Token::Question,
            ';' => Token::Semicolon,
            '+' => Token::Plus,
            '-' => Token::Minus,
            '/' => Token::Slash,
            '%' => Token::Percent,
            '*' => if self.eat('*') { Token::StarStar } else { Token::Star },
            '<' => if self.eat('=') { Token::Le } else { Token::Lt },
            '>' => if self.eat('=') { Token::Ge } else { Token::Gt },
            '!' => {
                if self.eat('=') {
                    if self.eat('=') { Token::NotEqEq } else { Token::NotEq }
                } else {
                    Token::Bang
                }
            }
            '=' => {
                if !self.eat('=') {
                    return Err(ParseError::new(start, "assignment is not allowed in formulas"));
                }
                if self.eat('=') { Token::EqEqEq } else { Token::EqEq }
            }
            '&' if self.eat('&') => Token::AndAnd,
            '|' if self.eat('|') => Token::OrOr,
            other => return Err(ParseError::new(start, format!("unexpected character '{}'", other))),
        };
        Ok(token)
    }
}

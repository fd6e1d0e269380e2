use super::ast::{BinaryOp, Constant, Expr, Function, UnaryOp};
use super::{Resolved, Symbols};
use crate::error::ParseError;
use std::fmt;

/// Deepest nesting of parentheses, calls, signs and chained operators.
pub const MAX_DEPTH: usize = 256;

/// Parses `input` into an AST over the names declared in `symbols`.
///
/// Grammar, lowest precedence first:
///
/// ```text
/// expr    := term (('+' | '-') term)*
/// term    := unary (('*' | '/') unary)*
/// unary   := ('+' | '-') unary | power
/// power   := primary (('^' | '**') unary)?
/// primary := number | name | name '(' expr ')' | '(' expr ')'
/// ```
pub fn parse(input: &str, symbols: &Symbols) -> Result<Expr, ParseError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
        symbols,
    };
    let expr = parser.parse_expression()?;
    match parser.peek() {
        None => Ok(expr),
        Some((token, position)) => Err(ParseError::UnexpectedToken {
            token: token.to_string(),
            position,
            expected: "an operator or the end of the expression",
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    LParen,
    RParen,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "{n}"),
            Token::Identifier(name) => f.write_str(name),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::Slash => f.write_str("/"),
            Token::Caret => f.write_str("^"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
        }
    }
}

type Spanned = (Token, usize);

fn tokenize(input: &str) -> Result<Vec<Spanned>, ParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let position = i + 1;
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            // Exponent only when digits follow, so `2e` stays `2` then `e`.
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                let mut j = i + 1;
                if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
                    j += 1;
                }
                if j < chars.len() && chars[j].is_ascii_digit() {
                    i = j;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = match text.parse::<f64>() {
                Ok(value) if value.is_finite() => value,
                _ => return Err(ParseError::InvalidNumber { text, position }),
            };
            tokens.push((Token::Number(value), position));
        } else if c.is_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push((Token::Identifier(chars[start..i].iter().collect()), position));
        } else {
            let token = match c {
                '+' => Token::Plus,
                '-' => Token::Minus,
                '*' if chars.get(i + 1) == Some(&'*') => {
                    i += 1;
                    Token::Caret
                }
                '*' => Token::Star,
                '/' => Token::Slash,
                '^' => Token::Caret,
                '(' => Token::LParen,
                ')' => Token::RParen,
                _ => return Err(ParseError::UnexpectedChar { ch: c, position }),
            };
            tokens.push((token, position));
            i += 1;
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    symbols: &'a Symbols,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Spanned> {
        self.tokens.get(self.pos).cloned()
    }

    fn consume(&mut self) -> Option<Spanned> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Bounds the height of the tree being built.
    fn descend(&mut self) -> Result<(), ParseError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let position = self
                .tokens
                .get(self.pos)
                .or_else(|| self.tokens.last())
                .map_or(1, |(_, position)| *position);
            return Err(ParseError::TooDeep {
                position,
                limit: MAX_DEPTH,
            });
        }
        Ok(())
    }

    fn expect_rparen(&mut self) -> Result<(), ParseError> {
        match self.consume() {
            Some((Token::RParen, _)) => Ok(()),
            Some((token, position)) => Err(ParseError::UnexpectedToken {
                token: token.to_string(),
                position,
                expected: "')'",
            }),
            None => Err(ParseError::UnexpectedEnd { expected: "')'" }),
        }
    }

    fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let entry = self.depth;
        let mut left = self.parse_term()?;
        while let Some((token, _)) = self.peek() {
            let op = match token {
                Token::Plus => BinaryOp::Add,
                Token::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.consume();
            // Each chained operator deepens the left operand by one.
            self.descend()?;
            let right = self.parse_term()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        self.depth = entry;
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, ParseError> {
        let entry = self.depth;
        let mut left = self.parse_unary()?;
        while let Some((token, _)) = self.peek() {
            let op = match token {
                Token::Star => BinaryOp::Mul,
                Token::Slash => BinaryOp::Div,
                _ => break,
            };
            self.consume();
            self.descend()?;
            let right = self.parse_unary()?;
            left = Expr::Binary(Box::new(left), op, Box::new(right));
        }
        self.depth = entry;
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let entry = self.depth;
        self.descend()?;
        let expr = self.parse_signed()?;
        self.depth = entry;
        Ok(expr)
    }

    fn parse_signed(&mut self) -> Result<Expr, ParseError> {
        match self.peek() {
            Some((Token::Minus, _)) => {
                self.consume();
                let operand = self.parse_unary()?;
                Ok(Expr::Unary(UnaryOp::Neg, Box::new(operand)))
            }
            Some((Token::Plus, _)) => {
                self.consume();
                self.parse_unary()
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<Expr, ParseError> {
        let base = self.parse_primary()?;
        if let Some((Token::Caret, _)) = self.peek() {
            self.consume();
            let exponent = self.parse_unary()?;
            return Ok(Expr::Binary(Box::new(base), BinaryOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.consume() {
            Some((Token::Number(n), _)) => Ok(Expr::Number(n)),
            Some((Token::Identifier(name), position)) => {
                if let Some((Token::LParen, _)) = self.peek() {
                    self.consume();
                    let function = Function::from_name(&name)
                        .ok_or(ParseError::UnknownFunction { name, position })?;
                    let arg = self.parse_expression()?;
                    self.expect_rparen()?;
                    Ok(Expr::Call(function, Box::new(arg)))
                } else {
                    self.resolve(name, position)
                }
            }
            Some((Token::LParen, _)) => {
                let expr = self.parse_expression()?;
                self.expect_rparen()?;
                Ok(expr)
            }
            Some((token, position)) => Err(ParseError::UnexpectedToken {
                token: token.to_string(),
                position,
                expected: "a number, a name or '('",
            }),
            None => Err(ParseError::UnexpectedEnd {
                expected: "a number, a name or '('",
            }),
        }
    }

    fn resolve(&self, name: String, position: usize) -> Result<Expr, ParseError> {
        if let Some(resolved) = self.symbols.resolve(&name) {
            return Ok(match resolved {
                Resolved::Variable(i) => Expr::Variable(i),
                Resolved::Parameter(i) => Expr::Parameter(i),
            });
        }
        if let Some(constant) = Constant::from_name(&name) {
            return Ok(Expr::Constant(constant));
        }
        if Function::from_name(&name).is_some() {
            return Err(ParseError::MissingCall { name, position });
        }
        Err(ParseError::UnknownIdentifier { name, position })
    }
}

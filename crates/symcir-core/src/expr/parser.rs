//! Expression parsing using recursive descent.

use std::f64::consts::PI;

use super::ast::{BinaryOp, Expr, UnaryOp};
use crate::error::{Error, Result};

/// Parse a symbolic expression from a string.
///
/// Identifiers become [`Expr::Symbol`]s, `name(args)` becomes a function
/// call, numbers accept SPICE suffixes (`1k`, `4.7u`, `10MEG`).
pub fn parse_expression(input: &str) -> Result<Expr> {
    let mut parser = ExprParser::new(input);
    parser.parse().map_err(|message| Error::InvalidExpression {
        input: input.to_string(),
        message,
    })
}

/// Parse a SPICE-style numeric literal with optional SI suffix.
///
/// Returns `None` unless the whole string is a number.
pub fn parse_value(s: &str) -> Option<f64> {
    let s = s.trim();
    if let Ok(v) = s.parse::<f64>() {
        return Some(v);
    }
    let mut parser = ExprParser::new(s);
    match parser.parse_number() {
        Ok(Expr::Constant(v)) if parser.pos == s.len() => Some(v),
        _ => None,
    }
}

/// Expression parser using recursive descent.
struct ExprParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(&mut self) -> std::result::Result<Expr, String> {
        self.skip_whitespace();
        let expr = self.parse_additive()?;
        self.skip_whitespace();
        if self.pos < self.input.len() {
            Err(format!("unexpected character at position {}", self.pos))
        } else {
            Ok(expr)
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.as_bytes().get(self.pos).map(|&b| b as char)
    }

    fn advance(&mut self) {
        if self.pos < self.input.len() {
            self.pos += 1;
        }
    }

    fn parse_additive(&mut self) -> std::result::Result<Expr, String> {
        let mut left = self.parse_multiplicative()?;

        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> std::result::Result<Expr, String> {
        let mut left = self.parse_power()?;

        loop {
            self.skip_whitespace();
            let op = match self.peek() {
                Some('*') if !self.check_str("**") => BinaryOp::Mul,
                Some('/') => BinaryOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_power()?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_power(&mut self) -> std::result::Result<Expr, String> {
        let base = self.parse_unary()?;

        self.skip_whitespace();
        if self.peek() == Some('^') || self.check_str("**") {
            if self.peek() == Some('*') {
                self.advance();
            }
            self.advance();
            // Right associative
            let exp = self.parse_power()?;
            Ok(Expr::BinaryOp {
                op: BinaryOp::Pow,
                left: Box::new(base),
                right: Box::new(exp),
            })
        } else {
            Ok(base)
        }
    }

    fn check_str(&self, s: &str) -> bool {
        self.input[self.pos..].starts_with(s)
    }

    fn parse_unary(&mut self) -> std::result::Result<Expr, String> {
        self.skip_whitespace();
        match self.peek() {
            Some('-') => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(Expr::UnaryOp {
                    op: UnaryOp::Neg,
                    operand: Box::new(operand),
                })
            }
            Some('+') => {
                self.advance();
                self.parse_unary()
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> std::result::Result<Expr, String> {
        self.skip_whitespace();

        match self.peek() {
            Some('(') => {
                self.advance();
                let expr = self.parse_additive()?;
                self.skip_whitespace();
                if self.peek() != Some(')') {
                    return Err("expected ')'".to_string());
                }
                self.advance();
                Ok(expr)
            }
            Some(c) if c.is_ascii_digit() || c == '.' => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() || c == '_' => self.parse_identifier(),
            Some(c) => Err(format!("unexpected character: '{}'", c)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_number(&mut self) -> std::result::Result<Expr, String> {
        let start = self.pos;
        let mut has_dot = false;
        let mut has_exp = false;

        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !has_dot && !has_exp {
                has_dot = true;
                self.advance();
            } else if (c == 'e' || c == 'E') && !has_exp && self.exponent_follows() {
                has_exp = true;
                self.advance();
                if self.peek() == Some('+') || self.peek() == Some('-') {
                    self.advance();
                }
            } else {
                break;
            }
        }

        let num_str = &self.input[start..self.pos];

        let suffix_start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphabetic() {
                self.advance();
            } else {
                break;
            }
        }
        let suffix = &self.input[suffix_start..self.pos];
        let multiplier = parse_spice_suffix(suffix)
            .ok_or_else(|| format!("unknown value suffix '{}'", suffix))?;

        let value: f64 = num_str
            .parse()
            .map_err(|_| format!("invalid number: {}", num_str))?;
        Ok(Expr::Constant(value * multiplier))
    }

    /// An `e`/`E` is an exponent only when followed by digits (optionally signed).
    fn exponent_follows(&self) -> bool {
        let rest = &self.input.as_bytes()[self.pos + 1..];
        match rest.first() {
            Some(b'+') | Some(b'-') => rest.get(1).is_some_and(|b| b.is_ascii_digit()),
            Some(b) => b.is_ascii_digit(),
            None => false,
        }
    }

    fn parse_identifier(&mut self) -> std::result::Result<Expr, String> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let ident = &self.input[start..self.pos];
        if ident == "pi" {
            return Ok(Expr::Constant(PI));
        }

        self.skip_whitespace();
        if self.peek() == Some('(') {
            self.advance();
            let args = self.parse_function_args()?;
            return Ok(Expr::Function {
                name: ident.to_lowercase(),
                args,
            });
        }

        Ok(Expr::Symbol(ident.to_string()))
    }

    fn parse_function_args(&mut self) -> std::result::Result<Vec<Expr>, String> {
        let mut args = Vec::new();

        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.advance();
            return Ok(args);
        }

        loop {
            let arg = self.parse_additive()?;
            args.push(arg);

            self.skip_whitespace();
            match self.peek() {
                Some(',') => {
                    self.advance();
                }
                Some(')') => {
                    self.advance();
                    break;
                }
                _ => return Err("expected ',' or ')' in function arguments".to_string()),
            }
        }

        Ok(args)
    }
}

/// Parse SPICE suffix to multiplier.
fn parse_spice_suffix(suffix: &str) -> Option<f64> {
    let multiplier = match suffix.to_uppercase().as_str() {
        "" => 1.0,
        "T" => 1e12,
        "G" => 1e9,
        "MEG" => 1e6,
        "K" => 1e3,
        "M" => 1e-3,
        "U" => 1e-6,
        "N" => 1e-9,
        "P" => 1e-12,
        "F" => 1e-15,
        _ => return None,
    };
    Some(multiplier)
}

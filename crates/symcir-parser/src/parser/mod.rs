//! Netlist parser: tokens to a nested, unresolved circuit tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use symcir_core::{Circuit, DiagnosticKind, Expr, parse_expression, parse_value};

use crate::context::CompilationContext;
use crate::lexer::{Lexer, SpannedToken, Token};

mod commands;
mod elements;

/// Parse netlist text into a circuit tree.
///
/// The first non-empty line is the title. Problems are recorded as
/// diagnostics on the circuit (or the subcircuit being defined) and the
/// offending line is dropped.
pub fn parse_netlist(input: &str, ctx: &mut CompilationContext, source_dir: Option<&Path>) -> Circuit {
    let (title, body, first_line) = split_title(input);
    let tokens = Lexer::with_first_line(body, first_line).tokenize();
    let mut top = Circuit::new(title);
    top.source_dir = source_dir.map(Path::to_path_buf);
    Parser::new(&tokens, ctx, top).parse_all()
}

fn split_title(input: &str) -> (String, &str, usize) {
    let mut offset = 0;
    for (i, line) in input.split_inclusive('\n').enumerate() {
        offset += line.len();
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let title = trimmed.trim_start_matches('*').trim().trim_matches('"');
        return (title.to_string(), &input[offset..], i + 2);
    }
    (String::new(), "", 1)
}

/// One field of a netlist line after the leading keyword.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Field {
    /// A bare name, number or `{expr}`.
    Positional(Token),
    /// `name=value`.
    Assign(String, Token),
}

/// Parser state.
pub(crate) struct Parser<'t, 'c> {
    tokens: &'t [SpannedToken],
    pos: usize,
    pub(crate) ctx: &'c mut CompilationContext,
    pub(crate) source_dir: Option<PathBuf>,
    pub(crate) top: Circuit,
    /// Open `.subckt` definitions, innermost last.
    pub(crate) open: Vec<Circuit>,
    /// Names of every `.model` in the input, collected before parsing.
    pub(crate) local_models: HashSet<String>,
    pub(crate) ended: bool,
}

impl<'t, 'c> Parser<'t, 'c> {
    fn new(tokens: &'t [SpannedToken], ctx: &'c mut CompilationContext, top: Circuit) -> Self {
        Self {
            tokens,
            pos: 0,
            ctx,
            source_dir: top.source_dir.clone(),
            top,
            open: Vec::new(),
            local_models: HashSet::new(),
            ended: false,
        }
    }

    fn parse_all(mut self) -> Circuit {
        // Model names are needed to tell `R1 a b RMOD` from `R1 a b Rvalue`,
        // and a .model may follow its first use.
        self.scan_models();

        while !self.is_at_end() && !self.ended {
            self.skip_eol();
            match self.peek().clone() {
                Token::Command(cmd) => self.parse_command(&cmd),
                Token::Name(name) => self.parse_element(&name),
                Token::Eof => break,
                other => {
                    let line = self.current_line();
                    self.syntax_error(line, format!("unexpected {} at start of line", describe(&other)));
                    self.skip_to_eol();
                }
            }
        }

        while let Some(sub) = self.open.pop() {
            let message = format!("missing .ends for subcircuit '{}'", sub.name);
            self.current().error(DiagnosticKind::Syntax, 0, message);
            self.close_subcircuit(sub, 0);
        }

        log::debug!(
            "parsed '{}': {} element(s), {} subcircuit(s)",
            self.top.title,
            self.top.elements.len(),
            self.top.subcircuits.len()
        );
        self.top
    }

    fn scan_models(&mut self) {
        for pair in self.tokens.windows(2) {
            if let (Token::Command(cmd), Token::Name(name)) = (&pair[0].token, &pair[1].token)
                && cmd == "MODEL"
            {
                self.local_models.insert(name.clone());
            }
        }
    }

    /// The circuit currently being filled.
    pub(crate) fn current(&mut self) -> &mut Circuit {
        self.open.last_mut().unwrap_or(&mut self.top)
    }

    pub(crate) fn syntax_error(&mut self, line: usize, message: impl Into<String>) {
        self.current().error(DiagnosticKind::Syntax, line, message);
    }

    // Utility methods

    pub(crate) fn peek(&self) -> &Token {
        self.tokens
            .get(self.pos)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    pub(crate) fn current_line(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.line).unwrap_or(0)
    }

    pub(crate) fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    pub(crate) fn skip_eol(&mut self) {
        while matches!(self.peek(), Token::Eol) {
            self.advance();
        }
    }

    pub(crate) fn skip_to_eol(&mut self) {
        while !matches!(self.peek(), Token::Eol | Token::Eof) {
            self.advance();
        }
        if matches!(self.peek(), Token::Eol) {
            self.advance();
        }
    }

    /// Collect the remaining fields of the current line and move past it.
    ///
    /// Returns `None` (after recording an error) if the line is malformed.
    pub(crate) fn collect_fields(&mut self, line: usize) -> Option<Vec<Field>> {
        let mut fields = Vec::new();
        loop {
            let token = self.peek().clone();
            match token {
                Token::Eol | Token::Eof => break,
                Token::Name(name) if self.peek_at(1) == &Token::Equals => {
                    self.advance();
                    self.advance();
                    match self.peek().clone() {
                        value @ (Token::Name(_) | Token::Value(_) | Token::CurlyExpr(_)) => {
                            self.advance();
                            fields.push(Field::Assign(name, value));
                        }
                        other => {
                            self.syntax_error(
                                line,
                                format!("expected value after '{}=', found {}", name, describe(&other)),
                            );
                            self.skip_to_eol();
                            return None;
                        }
                    }
                }
                Token::Name(_) | Token::Value(_) | Token::CurlyExpr(_) | Token::Path(_) => {
                    self.advance();
                    fields.push(Field::Positional(token));
                }
                other => {
                    self.syntax_error(line, format!("unexpected {}", describe(&other)));
                    self.skip_to_eol();
                    return None;
                }
            }
        }
        self.skip_to_eol();
        Some(fields)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.token)
            .unwrap_or(&Token::Eof)
    }

    /// Convert a value token to an expression.
    pub(crate) fn token_expr(&mut self, token: &Token, line: usize) -> Option<Expr> {
        match token {
            Token::Value(v) => {
                let value = parse_value(v);
                if value.is_none() {
                    self.syntax_error(line, format!("invalid value '{}'", v));
                }
                value.map(Expr::Constant)
            }
            Token::Name(n) => Some(Expr::symbol(n.clone())),
            Token::CurlyExpr(e) => match parse_expression(e) {
                Ok(expr) => Some(expr),
                Err(err) => {
                    self.syntax_error(line, err.to_string());
                    None
                }
            },
            other => {
                self.syntax_error(line, format!("expected a value, found {}", describe(other)));
                None
            }
        }
    }
}

/// Name and node fields as plain text.
pub(crate) fn token_text(token: &Token) -> Option<&str> {
    match token {
        Token::Name(s) | Token::Value(s) => Some(s),
        _ => None,
    }
}

pub(crate) fn describe(token: &Token) -> String {
    match token {
        Token::Name(s) => format!("'{}'", s),
        Token::Value(s) => format!("value '{}'", s),
        Token::Command(s) => format!("directive '.{}'", s.to_lowercase()),
        Token::CurlyExpr(s) => format!("expression '{{{}}}'", s),
        Token::Path(s) => format!("path '{}'", s),
        Token::Equals => "'='".to_string(),
        Token::Invalid(s) => format!("'{}'", s),
        Token::Eol => "end of line".to_string(),
        Token::Eof => "end of file".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use symcir_core::{Expr, Severity};

    fn parse(input: &str) -> Circuit {
        let mut ctx = CompilationContext::default();
        parse_netlist(input, &mut ctx, None)
    }

    #[test]
    fn test_title_and_elements() {
        let ckt = parse(
            "\"Voltage divider\"
V1 in 0 {V_s}
R1 in out R_a
R2 out 0 1k
.end",
        );
        assert_eq!(ckt.title, "Voltage divider");
        assert_eq!(ckt.errors(), 0);
        assert_eq!(ckt.elements.len(), 3);

        let r2 = ckt.element("R2").unwrap();
        assert_eq!(r2.nodes, vec!["out", "0"]);
        assert_eq!(r2.value(), Expr::Constant(1000.0));
        assert_eq!(r2.line, 4);

        let r1 = ckt.element("R1").unwrap();
        assert_eq!(r1.value(), Expr::symbol("R_a"));
        assert_eq!(r1.model_name, None);
    }

    #[test]
    fn test_model_or_value() {
        let ckt = parse(
            "models
R1 a 0 r value={R}
R2 a 0 RMOD
R3 a 0 Rx
.model RMOD r value=1k
",
        );
        assert_eq!(ckt.errors(), 0);
        assert_eq!(ckt.element("R1").unwrap().model_name.as_deref(), Some("r"));
        assert_eq!(ckt.element("R2").unwrap().model_name.as_deref(), Some("RMOD"));
        let r3 = ckt.element("R3").unwrap();
        assert_eq!(r3.model_name, None);
        assert_eq!(r3.value(), Expr::symbol("Rx"));
        assert_eq!(ckt.model_defs["RMOD"].base, "r");
    }

    #[test]
    fn test_bad_lines_are_dropped() {
        let ckt = parse(
            "bad
R1 a
Z1 a b 1
C1 a 0 1kohm
R2 a 0 1k
",
        );
        assert_eq!(ckt.errors(), 3);
        assert_eq!(ckt.elements.len(), 1);
        assert!(ckt.diagnostics.iter().all(|d| d.severity == Severity::Error));
    }

    #[test]
    fn test_subcircuit_definition() {
        let ckt = parse(
            "sub
.subckt AMP in out A=10 tau=1u
E1 out 0 in 0 {A/(1+s*tau)}
.param k=2
.ends AMP
X1 a b AMP A=100
",
        );
        assert_eq!(ckt.errors(), 0);
        let amp = &ckt.subcircuits["AMP"];
        assert_eq!(amp.ports, vec!["in", "out"]);
        assert_eq!(amp.formals["A"], Expr::Constant(10.0));
        assert_eq!(amp.param_defs["k"], Expr::Constant(2.0));
        assert_eq!(amp.elements.len(), 1);

        let x1 = ckt.element("X1").unwrap();
        assert_eq!(x1.nodes, vec!["a", "b"]);
        assert_eq!(x1.model_name.as_deref(), Some("AMP"));
        assert_eq!(x1.params["A"], Expr::Constant(100.0));
    }

    #[test]
    fn test_nested_definition_of_same_name_is_a_loop() {
        let ckt = parse(
            "loop
.subckt A p
.subckt A q
R1 q 0 1
.ends
.ends
",
        );
        assert!(
            ckt.diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::Hierarchy)
        );
    }

    #[test]
    fn test_missing_ends() {
        let ckt = parse("open\n.subckt A p\nR1 p 0 1\n");
        assert_eq!(ckt.errors(), 1);
        assert!(ckt.subcircuits.contains_key("A"));
    }

    #[test]
    fn test_end_stops_parsing() {
        let ckt = parse("t\nR1 a 0 1\n.end\nR2 a 0 1\n");
        assert_eq!(ckt.elements.len(), 1);
    }

    #[test]
    fn test_mutual_inductance_refs() {
        let ckt = parse("k\nL1 a 0 1m\nL2 b 0 4m\nK1 L1 L2 0.5\n");
        let k = ckt.element("K1").unwrap();
        assert!(k.nodes.is_empty());
        assert_eq!(k.refs, vec!["L1", "L2"]);
        assert_eq!(k.value(), Expr::Constant(0.5));
    }
}

//! Directive parsing (.param, .model, .subckt, .ends, .lib, .include, .end).

use indexmap::IndexMap;
use symcir_core::{Circuit, DiagnosticKind, Expr, ModelDef};

use super::{Field, Parser, describe, token_text};
use crate::lexer::Token;

impl Parser<'_, '_> {
    pub(super) fn parse_command(&mut self, cmd: &str) {
        let line = self.current_line();
        self.advance();

        match cmd {
            "END" => {
                self.ended = true;
            }
            "PARAM" => self.parse_param_command(line),
            "MODEL" => self.parse_model_command(line),
            "SUBCKT" => self.parse_subckt_command(line),
            "ENDS" => self.parse_ends_command(line),
            "LIB" | "INCLUDE" | "INC" => self.parse_library_command(cmd, line),
            _ => {
                self.syntax_error(line, format!("unknown directive '.{}'", cmd.to_lowercase()));
                self.skip_to_eol();
            }
        }
    }

    /// Split `name=value` fields into expressions; positional fields are
    /// returned untouched.
    fn assignments(&mut self, fields: Vec<Field>, line: usize) -> Option<(Vec<Token>, IndexMap<String, Expr>)> {
        let mut positional = Vec::new();
        let mut params = IndexMap::new();
        for field in fields {
            match field {
                Field::Positional(token) => positional.push(token),
                Field::Assign(name, token) => {
                    let value = self.token_expr(&token, line)?;
                    params.insert(name, value);
                }
            }
        }
        Some((positional, params))
    }

    /// .param name=value [name=value ...]
    fn parse_param_command(&mut self, line: usize) {
        let Some(fields) = self.collect_fields(line) else {
            return;
        };
        let Some((positional, params)) = self.assignments(fields, line) else {
            return;
        };
        if let Some(token) = positional.first() {
            self.syntax_error(line, format!(".param: expected name=value, found {}", describe(token)));
            return;
        }
        for (name, value) in params {
            if self.current().param_defs.insert(name.clone(), value).is_some() {
                let message = format!(".param '{}' redefined", name);
                self.current().warn(DiagnosticKind::Syntax, line, message);
            }
        }
    }

    /// .model NAME BASE [name=value ...]
    fn parse_model_command(&mut self, line: usize) {
        let Some(fields) = self.collect_fields(line) else {
            return;
        };
        let Some((positional, params)) = self.assignments(fields, line) else {
            return;
        };
        let (name, base) = match positional.as_slice() {
            [Token::Name(name), Token::Name(base)] => (name.clone(), base.clone()),
            _ => {
                self.syntax_error(line, ".model: expected model name and base model");
                return;
            }
        };

        let def = ModelDef {
            name: name.clone(),
            base,
            params,
            line,
        };
        if self.current().model_defs.insert(name.clone(), def).is_some() {
            self.syntax_error(line, format!("model '{}' defined twice", name));
        }
    }

    /// .subckt NAME port... [name=value ...]
    fn parse_subckt_command(&mut self, line: usize) {
        let Some(fields) = self.collect_fields(line) else {
            return;
        };
        let Some((positional, formals)) = self.assignments(fields, line) else {
            return;
        };
        let Some((Token::Name(name), ports)) = positional.split_first() else {
            self.syntax_error(line, ".subckt: expected subcircuit name");
            return;
        };

        let mut port_names = Vec::with_capacity(ports.len());
        for token in ports {
            match token_text(token) {
                Some(port) => port_names.push(port.to_string()),
                None => {
                    self.syntax_error(line, format!(".subckt {}: invalid port {}", name, describe(token)));
                    return;
                }
            }
        }

        if self.open.iter().any(|c| &c.name == name) {
            let message = format!("hierarchical loop: subcircuit '{}' defined inside itself", name);
            self.current().error(DiagnosticKind::Hierarchy, line, message);
        }

        let mut sub = Circuit::prototype(name.clone(), port_names);
        sub.formals = formals;
        sub.source_dir = self.source_dir.clone();
        log::debug!("opening subcircuit '{}'", name);
        self.open.push(sub);
    }

    /// .ends [NAME]
    fn parse_ends_command(&mut self, line: usize) {
        let Some(fields) = self.collect_fields(line) else {
            return;
        };
        let Some(sub) = self.open.pop() else {
            self.syntax_error(line, ".ends without matching .subckt");
            return;
        };
        if let Some(Field::Positional(Token::Name(end_name))) = fields.first()
            && *end_name != sub.name
        {
            let message = format!(".ends {} closes subcircuit '{}'", end_name, sub.name);
            self.current().warn(DiagnosticKind::Syntax, line, message);
        }
        self.close_subcircuit(sub, line);
    }

    /// Move a finished subcircuit into its parent.
    pub(super) fn close_subcircuit(&mut self, mut sub: Circuit, line: usize) {
        let diagnostics = std::mem::take(&mut sub.diagnostics);
        let name = sub.name.clone();
        let parent = self.current();
        parent.diagnostics.extend(diagnostics);
        if parent.subcircuits.insert(name.clone(), sub).is_some() {
            parent.error(
                DiagnosticKind::Syntax,
                line,
                format!("subcircuit '{}' defined twice", name),
            );
        }
    }

    /// .lib PATH / .include PATH
    fn parse_library_command(&mut self, cmd: &str, line: usize) {
        let path = match self.peek().clone() {
            Token::Path(path) => {
                self.advance();
                path
            }
            other => {
                self.syntax_error(line, format!(".{}: expected path, found {}", cmd.to_lowercase(), describe(&other)));
                self.skip_to_eol();
                return;
            }
        };
        self.skip_to_eol();

        let source_dir = self.source_dir.clone();
        match self.ctx.load_library(&path, source_dir.as_deref()) {
            Ok(diagnostics) => self.current().diagnostics.extend(diagnostics),
            Err(err) => self.current().error(DiagnosticKind::Reference, line, err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::context::CompilationContext;
    use crate::parser::parse_netlist;
    use symcir_core::{DiagnosticKind, Expr};

    fn parse(input: &str) -> symcir_core::Circuit {
        let mut ctx = CompilationContext::default();
        parse_netlist(input, &mut ctx, None)
    }

    #[test]
    fn test_param_directive() {
        let ckt = parse("p\n.param R=1k C={1/(2*pi*R*f_c)} f_c=1meg\n");
        assert_eq!(ckt.errors(), 0);
        assert_eq!(ckt.param_defs["R"], Expr::Constant(1000.0));
        assert!(ckt.param_defs["C"].contains_symbol("f_c"));
        assert_eq!(ckt.param_defs.len(), 3);
    }

    #[test]
    fn test_model_directive() {
        let ckt = parse(".model test\n.model BC547 QV gm=40m gpi={40m/200}\n.model bad\n");
        assert_eq!(ckt.errors(), 1);
        let def = &ckt.model_defs["BC547"];
        assert_eq!(def.base, "QV");
        assert_eq!(def.params.len(), 2);
    }

    #[test]
    fn test_ends_without_subckt() {
        let ckt = parse("e\n.ends\n");
        assert_eq!(ckt.errors(), 1);
    }

    #[test]
    fn test_unknown_directive() {
        let ckt = parse("u\n.tran 1n 1u\n");
        assert_eq!(ckt.errors(), 1);
    }

    #[test]
    fn test_missing_library_is_reference_error() {
        let ckt = parse("l\n.lib nowhere/none.lib\nR1 a 0 1\n");
        assert_eq!(ckt.errors(), 1);
        assert_eq!(ckt.diagnostics[0].kind, DiagnosticKind::Reference);
        assert_eq!(ckt.elements.len(), 1);
    }
}

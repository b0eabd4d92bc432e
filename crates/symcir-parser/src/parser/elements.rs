//! Element line parsing.

use symcir_core::catalog::{self, DeviceSpec, NodeCount};
use symcir_core::Element;

use super::{Field, Parser, describe, token_text};
use crate::lexer::Token;

impl Parser<'_, '_> {
    /// Parse `RefDes nodes... [refs...] [model-or-value] [name=value...]`.
    pub(super) fn parse_element(&mut self, name: &str) {
        let line = self.current_line();
        self.advance();
        let Some(fields) = self.collect_fields(line) else {
            return;
        };

        let letter = name.chars().next().unwrap_or('?');
        let Some(device) = catalog::device(letter) else {
            self.syntax_error(line, format!("unknown device type '{}' in '{}'", letter, name));
            return;
        };

        let mut positional = Vec::new();
        let mut assigns = Vec::new();
        for field in fields {
            match field {
                Field::Positional(token) => positional.push(token),
                Field::Assign(param, token) => assigns.push((param, token)),
            }
        }

        let element = match device.nodes {
            NodeCount::Variable => self.subcircuit_call(name, positional, line),
            NodeCount::Fixed(count) => self.fixed_element(name, device, count, positional, line),
        };
        let Some(mut element) = element else {
            return;
        };

        for (param, token) in assigns {
            let Some(value) = self.token_expr(&token, line) else {
                return;
            };
            if element.params.insert(param.clone(), value).is_some() {
                self.syntax_error(line, format!("{}: parameter '{}' given twice", name, param));
                return;
            }
        }

        element.line = line;
        self.current().add_element(element);
    }

    fn fixed_element(
        &mut self,
        name: &str,
        device: &DeviceSpec,
        count: usize,
        positional: Vec<Token>,
        line: usize,
    ) -> Option<Element> {
        let needed = count + device.refs;
        if positional.len() < needed {
            let mut message = format!("{}: expected {} node(s)", name, count);
            if device.refs > 0 {
                message = format!("{}: expected {} element reference(s)", name, device.refs);
            }
            self.syntax_error(line, message);
            return None;
        }

        let mut names = Vec::with_capacity(needed);
        for token in &positional[..needed] {
            match token_text(token) {
                Some(text) => names.push(text.to_string()),
                None => {
                    self.syntax_error(line, format!("{}: expected node name, found {}", name, describe(token)));
                    return None;
                }
            }
        }
        let refs = names.split_off(count);
        let mut element = Element::new(name, names).with_refs(refs);

        let (model, value) = match &positional[needed..] {
            [] => (None, None),
            [Token::Name(n)] if self.is_model_name(n, device) => (Some(n.clone()), None),
            [token] => (None, Some(token.clone())),
            [Token::Name(model), token] => (Some(model.clone()), Some(token.clone())),
            [other, _] => {
                self.syntax_error(line, format!("{}: expected model name, found {}", name, describe(other)));
                return None;
            }
            _ => {
                self.syntax_error(line, format!("{}: too many fields", name));
                return None;
            }
        };

        element.model_name = model;
        if let Some(token) = value {
            let value = self.token_expr(&token, line)?;
            element.params.insert("value".to_string(), value);
        }
        Some(element)
    }

    /// `Xname node... SUBCKT [name=value...]`
    fn subcircuit_call(&mut self, name: &str, mut positional: Vec<Token>, line: usize) -> Option<Element> {
        let Some(Token::Name(model)) = positional.pop() else {
            self.syntax_error(line, format!("{}: expected subcircuit name", name));
            return None;
        };
        let mut nodes = Vec::with_capacity(positional.len());
        for token in &positional {
            match token_text(token) {
                Some(text) => nodes.push(text.to_string()),
                None => {
                    self.syntax_error(line, format!("{}: expected node name, found {}", name, describe(token)));
                    return None;
                }
            }
        }
        let mut element = Element::new(name, nodes);
        element.model_name = Some(model);
        Some(element)
    }

    /// Whether a lone name after the nodes selects a model rather than a value.
    fn is_model_name(&self, name: &str, device: &DeviceSpec) -> bool {
        let takes_value = device
            .default_model()
            .and_then(catalog::model)
            .is_some_and(|m| m.param("value").is_some());
        device.accepts_model(name)
            || self.local_models.contains(name)
            || self.ctx.is_library_model(name)
            || !takes_value
    }
}

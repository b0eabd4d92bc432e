//! Netlist lexer.

/// Token types for netlists.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier: reference designator, node, model or parameter name.
    Name(String),
    /// Numeric literal with optional suffix (1k, 4.7u, -5, 1e-12).
    Value(String),
    /// Dot command without the dot, upper-cased (PARAM, SUBCKT, ...).
    Command(String),
    /// Expression inside `{...}`, braces stripped.
    CurlyExpr(String),
    /// Rest of a `.lib`/`.include` line.
    Path(String),
    /// Equal sign for parameters.
    Equals,
    /// Character that cannot start any token.
    Invalid(String),
    /// End of line.
    Eol,
    /// End of file.
    Eof,
}

/// A token with its source location.
#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub line: usize,
    pub column: usize,
}

/// Lexer for netlists.
///
/// Handles `*` comment lines, `;` inline comments and `+` continuation
/// lines. A continuation line does not produce an [`Token::Eol`] for the
/// line it continues.
pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    line: usize,
    column: usize,
    at_line_start: bool,
    /// Set after `.lib`/`.include`; the rest of the line is one path token.
    path_pending: bool,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given input.
    pub fn new(input: &'a str) -> Self {
        Self::with_first_line(input, 1)
    }

    /// Create a lexer whose first line is numbered `line`.
    pub fn with_first_line(input: &'a str, line: usize) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            line,
            column: 1,
            at_line_start: true,
            path_pending: false,
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> SpannedToken {
        self.skip_whitespace();

        let line = self.line;
        let column = self.column;
        let spanned = |token| SpannedToken {
            token,
            line,
            column,
        };

        if self.path_pending && !matches!(self.peek_char(), None | Some('\n')) {
            self.path_pending = false;
            let path = self.read_to_eol();
            let path = path.trim().trim_matches('"').to_string();
            return spanned(Token::Path(path));
        }

        match self.peek_char() {
            None => spanned(Token::Eof),
            Some('\n') => {
                self.advance();
                self.line += 1;
                self.column = 1;
                self.at_line_start = true;
                self.path_pending = false;
                if self.continuation_follows() {
                    return self.next_token();
                }
                spanned(Token::Eol)
            }
            Some('*') if self.at_line_start => {
                self.skip_to_eol();
                self.next_token()
            }
            Some(';') => {
                self.skip_to_eol();
                self.next_token()
            }
            Some('+') if self.at_line_start => {
                self.advance();
                self.at_line_start = false;
                self.next_token()
            }
            Some('.') if !self.digit_after_dot() => {
                self.advance();
                self.at_line_start = false;
                let cmd = self.read_identifier().to_uppercase();
                self.path_pending = cmd == "LIB" || cmd == "INCLUDE" || cmd == "INC";
                spanned(Token::Command(cmd))
            }
            Some('=') => {
                self.advance();
                spanned(Token::Equals)
            }
            Some('{') => {
                self.at_line_start = false;
                match self.read_curly() {
                    Some(expr) => spanned(Token::CurlyExpr(expr)),
                    None => spanned(Token::Invalid("unterminated '{'".to_string())),
                }
            }
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.at_line_start = false;
                spanned(Token::Name(self.read_identifier()))
            }
            Some(c) if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' => {
                self.at_line_start = false;
                let value = self.read_value();
                if value == "-" || value == "+" {
                    spanned(Token::Invalid(value))
                } else {
                    spanned(Token::Value(value))
                }
            }
            Some(c) => {
                self.advance();
                self.at_line_start = false;
                spanned(Token::Invalid(c.to_string()))
            }
        }
    }

    /// Tokenize the entire input.
    pub fn tokenize(mut self) -> Vec<SpannedToken> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let is_eof = token.token == Token::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        tokens
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn advance(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        self.column += 1;
        Some(c)
    }

    /// Whether the next line (after blank and comment lines) starts with `+`.
    fn continuation_follows(&self) -> bool {
        let mut it = self.chars.clone().map(|(_, c)| c);
        loop {
            let first = it.by_ref().find(|c| !matches!(c, ' ' | '\t' | '\r'));
            match first {
                Some('+') => return true,
                Some('\n') => continue,
                Some('*') => {
                    if !it.by_ref().any(|c| c == '\n') {
                        return false;
                    }
                }
                _ => return false,
            }
        }
    }

    fn digit_after_dot(&self) -> bool {
        let mut it = self.chars.clone();
        it.next();
        it.next().is_some_and(|(_, c)| c.is_ascii_digit())
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_to_eol(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.advance();
        }
    }

    fn read_to_eol(&mut self) -> String {
        let mut text = String::new();
        while let Some(c) = self.peek_char() {
            if c == '\n' || c == ';' {
                break;
            }
            text.push(c);
            self.advance();
        }
        text
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    fn read_curly(&mut self) -> Option<String> {
        self.advance();
        let mut depth = 1;
        let mut expr = String::new();
        while let Some(c) = self.peek_char() {
            match c {
                '\n' => return None,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        return Some(expr.trim().to_string());
                    }
                }
                _ => {}
            }
            expr.push(c);
            self.advance();
        }
        None
    }

    fn read_value(&mut self) -> String {
        let mut value = String::new();

        if let Some(c) = self.peek_char()
            && (c == '-' || c == '+')
        {
            value.push(c);
            self.advance();
        }

        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || c == '.' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        // Exponent only when digits follow, so `2meg` keeps its suffix.
        if let Some(c) = self.peek_char()
            && (c == 'e' || c == 'E')
            && self.exponent_follows()
        {
            value.push(c);
            self.advance();
            if let Some(c) = self.peek_char()
                && (c == '-' || c == '+')
            {
                value.push(c);
                self.advance();
            }
            while let Some(c) = self.peek_char() {
                if c.is_ascii_digit() {
                    value.push(c);
                    self.advance();
                } else {
                    break;
                }
            }
        }

        // SI suffix, or the tail of a numeric node name such as `1a`
        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                value.push(c);
                self.advance();
            } else {
                break;
            }
        }

        value
    }

    fn exponent_follows(&self) -> bool {
        let mut it = self.chars.clone().map(|(_, c)| c);
        it.next();
        match it.next() {
            Some('+') | Some('-') => it.next().is_some_and(|c| c.is_ascii_digit()),
            Some(c) => c.is_ascii_digit(),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(input: &str) -> Vec<Token> {
        Lexer::new(input)
            .tokenize()
            .into_iter()
            .map(|t| t.token)
            .collect()
    }

    #[test]
    fn test_simple_resistor() {
        assert_eq!(
            tokens("R1 1 0 1k"),
            vec![
                Token::Name("R1".into()),
                Token::Value("1".into()),
                Token::Value("0".into()),
                Token::Value("1k".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_comments() {
        let toks = tokens("* comment\nR1 a 0 1k ; trailing\n");
        assert_eq!(toks[0], Token::Eol);
        assert_eq!(toks[1], Token::Name("R1".into()));
        assert_eq!(toks[4], Token::Value("1k".into()));
        assert_eq!(toks[5], Token::Eol);
    }

    #[test]
    fn test_continuation() {
        let toks = tokens("E1 out 0\n* note\n+ in 0 {A}\nR1 a b 1");
        let eol_pos = toks.iter().position(|t| *t == Token::Eol);
        assert_eq!(
            &toks[..eol_pos.unwrap()],
            &[
                Token::Name("E1".into()),
                Token::Name("out".into()),
                Token::Value("0".into()),
                Token::Name("in".into()),
                Token::Value("0".into()),
                Token::CurlyExpr("A".into()),
            ]
        );
    }

    #[test]
    fn test_param_assignment_and_curly() {
        assert_eq!(
            tokens(".param tau={R*C} n=2"),
            vec![
                Token::Command("PARAM".into()),
                Token::Name("tau".into()),
                Token::Equals,
                Token::CurlyExpr("R*C".into()),
                Token::Name("n".into()),
                Token::Equals,
                Token::Value("2".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_library_path() {
        assert_eq!(
            tokens(".lib models/opamp.lib\n.end"),
            vec![
                Token::Command("LIB".into()),
                Token::Path("models/opamp.lib".into()),
                Token::Eol,
                Token::Command("END".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn test_values() {
        let toks = tokens("V1 1 0 -5 .5 1e-12 2meg");
        assert!(toks.contains(&Token::Value("-5".into())));
        assert!(toks.contains(&Token::Value(".5".into())));
        assert!(toks.contains(&Token::Value("1e-12".into())));
        assert!(toks.contains(&Token::Value("2meg".into())));
    }

    #[test]
    fn test_unterminated_curly() {
        let toks = tokens("R1 a b {R\n");
        assert!(matches!(toks[3], Token::Invalid(_)));
    }
}

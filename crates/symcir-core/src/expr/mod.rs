//! Symbolic expressions used for element values, parameter definitions and
//! matrix entries.
//!
//! Supports expressions like:
//! - `1/(2*pi*R*C)` - parameters with arithmetic
//! - `A0/(1+s*tau)` - Laplace-rational values
//! - `sqrt(L1*L2)` - built-in functions

mod ast;
mod eval;
mod functions;
mod parser;

pub use ast::{BinaryOp, Expr, UnaryOp};
pub use eval::EvalContext;
pub use functions::eval_function;
pub use parser::{parse_expression, parse_value};

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::f64::consts::PI;

    use super::*;

    #[test]
    fn test_parse_constant_with_suffix() {
        assert_eq!(parse_expression("1k").unwrap(), Expr::Constant(1000.0));
        assert_eq!(parse_value("4.7u"), Some(4.7e-6));
        assert_eq!(parse_value("10MEG"), Some(10e6));
        assert_eq!(parse_value("1e-3"), Some(1e-3));
        assert_eq!(parse_value("R1"), None);
        assert_eq!(parse_value("1kohm"), None);
    }

    #[test]
    fn test_parse_precedence() {
        let expr = parse_expression("2 + 3 * 4^2").unwrap();
        assert_eq!(expr.eval(&EvalContext::new()), Some(50.0));
    }

    #[test]
    fn test_parse_symbols_and_functions() {
        let expr = parse_expression("1/(2*pi*R*C)").unwrap();
        let symbols: Vec<String> = expr.free_symbols().into_iter().collect();
        assert_eq!(symbols, vec!["C".to_string(), "R".to_string()]);

        let ctx = EvalContext::new().with("R", 1e3).with("C", 1e-6);
        let f = expr.eval(&ctx).unwrap();
        assert!((f - 1.0 / (2.0 * PI * 1e-3)).abs() < 1e-9);

        let expr = parse_expression("sqrt(L1*L2)").unwrap();
        assert!(matches!(expr, Expr::Function { ref name, .. } if name == "sqrt"));
    }

    #[test]
    fn test_exponent_versus_symbol() {
        // `2e` is not an exponent, so this is a parse error rather than 2e0
        assert!(parse_expression("2e").is_err());
        assert_eq!(parse_expression("2e3").unwrap(), Expr::Constant(2000.0));
    }

    #[test]
    fn test_unresolved_symbol_does_not_evaluate() {
        let expr = parse_expression("R + 1").unwrap();
        assert_eq!(expr.eval(&EvalContext::new()), None);
    }

    #[test]
    fn test_substitute_folds_constants() {
        let expr = parse_expression("A*s/(1 + s*tau)").unwrap();
        let mut bindings = HashMap::new();
        bindings.insert("A".to_string(), Expr::Constant(0.0));
        assert!(expr.substitute(&bindings).is_zero());

        let expr = parse_expression("2*x + 3").unwrap();
        let folded = expr.substitute_one("x", &Expr::Constant(4.0));
        assert_eq!(folded, Expr::Constant(11.0));
    }

    #[test]
    fn test_rename_symbols() {
        let expr = parse_expression("gm*R + s").unwrap();
        let renamed = expr.rename_symbols(&|name| {
            (name != "s").then(|| format!("{}_X1", name))
        });
        let symbols: Vec<String> = renamed.free_symbols().into_iter().collect();
        assert_eq!(symbols, vec!["R_X1", "gm_X1", "s"]);
    }

    #[test]
    fn test_display_round_trip() {
        for input in ["a-(b-c)", "(a+b)*c", "a/(b*c)", "-(a+b)", "2^(-1)", "sqrt(L1*L2)*k"] {
            let expr = parse_expression(input).unwrap();
            let printed = expr.to_string();
            let reparsed = parse_expression(&printed).unwrap();
            let ctx = EvalContext::new()
                .with("a", 1.5)
                .with("b", -2.0)
                .with("c", 0.25)
                .with("k", 0.5)
                .with("L1", 2.0)
                .with("L2", 8.0);
            assert_eq!(expr.eval(&ctx), reparsed.eval(&ctx), "{} -> {}", input, printed);
        }
    }

    #[test]
    fn test_arithmetic_folding() {
        let x = Expr::symbol("x");
        assert_eq!(x.clone() * Expr::one(), x);
        assert!((x.clone() * Expr::zero()).is_zero());
        assert_eq!(Expr::zero() - x.clone(), -x.clone());
        assert_eq!(-(-x.clone()), x);
        assert_eq!(Expr::Constant(2.0) + Expr::Constant(3.0), Expr::Constant(5.0));
    }
}

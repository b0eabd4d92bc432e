//! Built-in function evaluation.

/// Evaluate a built-in function.
///
/// Returns `None` for unknown functions or a wrong number of arguments.
pub fn eval_function(name: &str, args: &[f64]) -> Option<f64> {
    let unary = |f: fn(f64) -> f64| match args {
        [x] => Some(f(*x)),
        _ => None,
    };
    match name {
        "sin" => unary(f64::sin),
        "cos" => unary(f64::cos),
        "tan" => unary(f64::tan),
        "asin" => unary(f64::asin),
        "acos" => unary(f64::acos),
        "atan" => unary(f64::atan),
        "sinh" => unary(f64::sinh),
        "cosh" => unary(f64::cosh),
        "tanh" => unary(f64::tanh),
        "exp" => unary(f64::exp),
        "ln" => unary(f64::ln),
        "log" | "log10" => unary(f64::log10),
        "sqrt" => unary(f64::sqrt),
        "abs" => unary(f64::abs),
        "atan2" => match args {
            [y, x] => Some(y.atan2(*x)),
            _ => None,
        },
        "pow" => match args {
            [base, exp] => Some(base.powf(*exp)),
            _ => None,
        },
        "min" if !args.is_empty() => Some(args.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" if !args.is_empty() => {
            Some(args.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unary_functions() {
        assert_eq!(eval_function("sqrt", &[9.0]), Some(3.0));
        assert_eq!(eval_function("abs", &[-2.5]), Some(2.5));
        assert!((eval_function("ln", &[std::f64::consts::E]).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_arity_and_unknown() {
        assert_eq!(eval_function("sqrt", &[1.0, 2.0]), None);
        assert_eq!(eval_function("frobnicate", &[1.0]), None);
        assert_eq!(eval_function("max", &[1.0, 4.0, 2.0]), Some(4.0));
    }
}

use super::ast::{BinaryOp, Expr, Function, UnaryOp};

/// Exact symbolic derivative of `expr` with respect to variable `var`.
///
/// Parameters and constants differentiate to zero. The result is built with
/// the folding constructors on [`Expr`], so repeated differentiation stays
/// reasonably small.
pub fn derive(expr: &Expr, var: usize) -> Expr {
    match expr {
        Expr::Number(_) | Expr::Parameter(_) | Expr::Constant(_) => Expr::Number(0.0),
        Expr::Variable(i) => Expr::Number(if *i == var { 1.0 } else { 0.0 }),
        Expr::Unary(UnaryOp::Neg, inner) => Expr::neg(derive(inner, var)),
        Expr::Binary(u, op, v) => derive_binary(u, *op, v, var),
        Expr::Call(function, arg) => {
            let outer = derive_call(*function, arg);
            Expr::mul(outer, derive(arg, var))
        }
    }
}

fn derive_binary(u: &Expr, op: BinaryOp, v: &Expr, var: usize) -> Expr {
    match op {
        BinaryOp::Add => Expr::add(derive(u, var), derive(v, var)),
        BinaryOp::Sub => Expr::sub(derive(u, var), derive(v, var)),
        BinaryOp::Mul => Expr::add(
            Expr::mul(derive(u, var), v.clone()),
            Expr::mul(u.clone(), derive(v, var)),
        ),
        BinaryOp::Div => Expr::div(
            Expr::sub(
                Expr::mul(derive(u, var), v.clone()),
                Expr::mul(u.clone(), derive(v, var)),
            ),
            Expr::pow(v.clone(), Expr::Number(2.0)),
        ),
        BinaryOp::Pow if !v.depends_on(var) => {
            // d(u^c) = c * u^(c - 1) * du
            let lowered = Expr::pow(u.clone(), Expr::sub(v.clone(), Expr::Number(1.0)));
            Expr::mul(Expr::mul(v.clone(), lowered), derive(u, var))
        }
        BinaryOp::Pow => {
            // d(u^v) = u^v * (dv * ln(u) + v * du / u)
            let log_term = Expr::mul(derive(v, var), Expr::call(Function::Log, u.clone()));
            let base_term = Expr::div(Expr::mul(v.clone(), derive(u, var)), u.clone());
            Expr::mul(
                Expr::pow(u.clone(), v.clone()),
                Expr::add(log_term, base_term),
            )
        }
    }
}

/// Outer derivative `f'(arg)` of a whitelisted function.
fn derive_call(function: Function, arg: &Expr) -> Expr {
    let arg = arg.clone();
    match function {
        Function::Sin => Expr::call(Function::Cos, arg),
        Function::Cos => Expr::neg(Expr::call(Function::Sin, arg)),
        Function::Tan => Expr::add(
            Expr::Number(1.0),
            Expr::pow(Expr::call(Function::Tan, arg), Expr::Number(2.0)),
        ),
        Function::Exp => Expr::call(Function::Exp, arg),
        Function::Log => Expr::div(Expr::Number(1.0), arg),
        Function::Sqrt => Expr::div(
            Expr::Number(1.0),
            Expr::mul(Expr::Number(2.0), Expr::call(Function::Sqrt, arg)),
        ),
        Function::Abs => Expr::call(Function::Sign, arg),
        Function::Sign => Expr::Number(0.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::compiler::{compile, VM};
    use crate::expression::{parser::parse, Symbols};
    use approx::assert_relative_eq;

    fn symbols() -> Symbols {
        Symbols::new(&["x", "y"], &["r"]).unwrap()
    }

    fn eval(expr: &Expr, x: f64, y: f64, r: f64) -> f64 {
        VM::execute(&compile(expr), &[x, y], &[r], &mut Vec::new())
    }

    fn d_dx(source: &str) -> Expr {
        derive(&parse(source, &symbols()).unwrap(), 0)
    }

    #[test]
    fn polynomial_derivatives_fold() {
        let s = symbols();
        assert_eq!(d_dx("r + x^2").display(&s).to_string(), "2 * x");
        assert_eq!(d_dx("r*x - x^3").display(&s).to_string(), "r - 3 * x ^ 2");
        assert_eq!(d_dx("y^2 + r").display(&s).to_string(), "0");
    }

    #[test]
    fn chain_rule_through_functions() {
        let cases: [(&str, fn(f64) -> f64); 7] = [
            ("sin(2*x)", |x| 2.0 * (2.0 * x).cos()),
            ("cos(x^2)", |x| -2.0 * x * (x * x).sin()),
            ("tan(x)", |x| 1.0 / x.cos().powi(2)),
            ("exp(-x)", |x| -(-x).exp()),
            ("log(1 + x^2)", |x| 2.0 * x / (1.0 + x * x)),
            ("sqrt(x)", |x| 0.5 / x.sqrt()),
            ("abs(x - 3)", |x| (x - 3.0).signum()),
        ];
        for (source, expected) in cases {
            let derivative = d_dx(source);
            for x in [0.3, 0.9, 1.7] {
                assert_relative_eq!(eval(&derivative, x, 0.0, 0.0), expected(x), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn quotient_and_variable_power() {
        let quotient = d_dx("x / (1 + x)");
        assert_relative_eq!(eval(&quotient, 2.0, 0.0, 0.0), 1.0 / 9.0, epsilon = 1e-14);

        // d(x^x) = x^x (ln x + 1)
        let power = d_dx("x^x");
        let x: f64 = 1.5;
        assert_relative_eq!(
            eval(&power, x, 0.0, 0.0),
            x.powf(x) * (x.ln() + 1.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn higher_derivatives_of_a_cubic() {
        // x*(1-x)*(x-r): third derivative is the constant -6.
        let f = parse("x*(1-x)*(x-r)", &symbols()).unwrap();
        let third = derive(&derive(&derive(&f, 0), 0), 0);
        assert_relative_eq!(eval(&third, 0.4, 0.0, 2.0), -6.0, epsilon = 1e-12);
        let fourth = derive(&third, 0);
        assert_relative_eq!(eval(&fourth, 0.4, 0.0, 2.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn abs_differentiates_to_sign() {
        let s = symbols();
        let derivative = d_dx("x*abs(x)");
        assert_eq!(derivative.display(&s).to_string(), "abs(x) + x * sign(x)");
        assert_eq!(eval(&derivative, 0.0, 0.0, 0.0), 0.0);
        assert_relative_eq!(eval(&derivative, -1.5, 0.0, 0.0), 3.0, epsilon = 1e-14);
        assert_eq!(d_dx("sign(x)"), Expr::Number(0.0));
    }

    #[test]
    fn other_variables_are_constant() {
        let d_dy = derive(&parse("x*y + sin(y)", &symbols()).unwrap(), 1);
        assert_relative_eq!(eval(&d_dy, 2.0, 0.0, 0.0), 3.0, epsilon = 1e-14);
    }
}

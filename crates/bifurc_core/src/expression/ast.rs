use super::Symbols;
use crate::traits::Scalar;
use std::fmt;

/// Whitelisted elementary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Exp,
    Log,
    Sqrt,
    Abs,
    /// `-1`, `0` or `1`; the derivative of `abs`.
    Sign,
}

impl Function {
    /// Looks up a function by its source name. `sen` and `ln` are aliases
    /// of `sin` and `log`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sin" | "sen" => Some(Self::Sin),
            "cos" => Some(Self::Cos),
            "tan" => Some(Self::Tan),
            "exp" => Some(Self::Exp),
            "log" | "ln" => Some(Self::Log),
            "sqrt" => Some(Self::Sqrt),
            "abs" => Some(Self::Abs),
            "sign" => Some(Self::Sign),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Sin => "sin",
            Self::Cos => "cos",
            Self::Tan => "tan",
            Self::Exp => "exp",
            Self::Log => "log",
            Self::Sqrt => "sqrt",
            Self::Abs => "abs",
            Self::Sign => "sign",
        }
    }

    pub fn apply(self, x: f64) -> f64 {
        match self {
            Self::Sin => x.sin(),
            Self::Cos => x.cos(),
            Self::Tan => x.tan(),
            Self::Exp => x.exp(),
            Self::Log => x.ln(),
            Self::Sqrt => x.sqrt(),
            Self::Abs => x.abs(),
            Self::Sign => sign(x),
        }
    }
}

/// Sign with `sign(0) = 0`, unlike `f64::signum`. NaN stays NaN.
pub fn sign<T: Scalar>(value: T) -> T {
    match value.to_f64() {
        Some(v) if v > 0.0 => T::one(),
        Some(v) if v < 0.0 => -T::one(),
        Some(v) if v == 0.0 => T::zero(),
        _ => T::nan(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Constant {
    Pi,
    E,
}

impl Constant {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "pi" => Some(Self::Pi),
            "e" => Some(Self::E),
            _ => None,
        }
    }

    pub fn value(self) -> f64 {
        match self {
            Self::Pi => std::f64::consts::PI,
            Self::E => std::f64::consts::E,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Pi => "pi",
            Self::E => "e",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Pow => "^",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div => 2,
            Self::Pow => 4,
        }
    }

    fn fold(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Mul => a * b,
            Self::Div => a / b,
            Self::Pow => a.powf(b),
        }
    }
}

/// Abstract syntax tree of a parsed expression.
///
/// Variables and parameters are stored by index into the owning
/// [`Symbols`]; names are only needed for display.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Variable(usize),
    Parameter(usize),
    Constant(Constant),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
    Call(Function, Box<Expr>),
}

const PREC_UNARY: u8 = 3;
const PREC_ATOM: u8 = 5;

impl Expr {
    pub fn number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn is_number(&self, value: f64) -> bool {
        self.number() == Some(value)
    }

    /// Whether the expression mentions variable `index` anywhere.
    pub fn depends_on(&self, index: usize) -> bool {
        match self {
            Self::Variable(i) => *i == index,
            Self::Number(_) | Self::Parameter(_) | Self::Constant(_) => false,
            Self::Unary(_, inner) | Self::Call(_, inner) => inner.depends_on(index),
            Self::Binary(lhs, _, rhs) => lhs.depends_on(index) || rhs.depends_on(index),
        }
    }

    pub fn neg(inner: Expr) -> Expr {
        match inner {
            Self::Number(n) => Self::Number(-n),
            Self::Unary(UnaryOp::Neg, inner) => *inner,
            other => Self::Unary(UnaryOp::Neg, Box::new(other)),
        }
    }

    pub fn call(function: Function, arg: Expr) -> Expr {
        if let Some(n) = arg.number() {
            let value = function.apply(n);
            if value.is_finite() {
                return Self::Number(value);
            }
        }
        Self::Call(function, Box::new(arg))
    }

    /// Builds `lhs op rhs`, folding identities and numeric subterms.
    pub fn binary(lhs: Expr, op: BinaryOp, rhs: Expr) -> Expr {
        if let (Some(a), Some(b)) = (lhs.number(), rhs.number()) {
            let value = op.fold(a, b);
            if value.is_finite() {
                return Self::Number(value);
            }
        }
        match op {
            BinaryOp::Add if lhs.is_number(0.0) => rhs,
            BinaryOp::Add | BinaryOp::Sub if rhs.is_number(0.0) => lhs,
            BinaryOp::Sub if lhs.is_number(0.0) => Self::neg(rhs),
            BinaryOp::Mul if lhs.is_number(0.0) || rhs.is_number(0.0) => Self::Number(0.0),
            BinaryOp::Mul if lhs.is_number(1.0) => rhs,
            BinaryOp::Mul | BinaryOp::Div if rhs.is_number(1.0) => lhs,
            BinaryOp::Div if lhs.is_number(0.0) => Self::Number(0.0),
            BinaryOp::Pow if rhs.is_number(1.0) => lhs,
            BinaryOp::Pow if rhs.is_number(0.0) => Self::Number(1.0),
            _ => Self::Binary(Box::new(lhs), op, Box::new(rhs)),
        }
    }

    pub fn add(lhs: Expr, rhs: Expr) -> Expr {
        Self::binary(lhs, BinaryOp::Add, rhs)
    }

    pub fn sub(lhs: Expr, rhs: Expr) -> Expr {
        Self::binary(lhs, BinaryOp::Sub, rhs)
    }

    pub fn mul(lhs: Expr, rhs: Expr) -> Expr {
        Self::binary(lhs, BinaryOp::Mul, rhs)
    }

    pub fn div(lhs: Expr, rhs: Expr) -> Expr {
        Self::binary(lhs, BinaryOp::Div, rhs)
    }

    pub fn pow(lhs: Expr, rhs: Expr) -> Expr {
        Self::binary(lhs, BinaryOp::Pow, rhs)
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Number(n) if n.is_sign_negative() => PREC_UNARY,
            Self::Unary(..) => PREC_UNARY,
            Self::Binary(_, op, _) => op.precedence(),
            _ => PREC_ATOM,
        }
    }

    /// Renders the expression with the names declared in `symbols`.
    pub fn display<'a>(&'a self, symbols: &'a Symbols) -> DisplayExpr<'a> {
        DisplayExpr { expr: self, symbols }
    }
}

/// Borrowing adapter that prints an [`Expr`] as a parseable string.
pub struct DisplayExpr<'a> {
    expr: &'a Expr,
    symbols: &'a Symbols,
}

impl DisplayExpr<'_> {
    fn child<'b>(&'b self, expr: &'b Expr) -> DisplayExpr<'b> {
        DisplayExpr {
            expr,
            symbols: self.symbols,
        }
    }

    fn write_operand(&self, f: &mut fmt::Formatter<'_>, expr: &Expr, min: u8) -> fmt::Result {
        if expr.precedence() < min {
            write!(f, "({})", self.child(expr))
        } else {
            write!(f, "{}", self.child(expr))
        }
    }
}

impl fmt::Display for DisplayExpr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expr {
            Expr::Number(n) => write!(f, "{n}"),
            Expr::Variable(i) => f.write_str(self.symbols.variable_name(*i)),
            Expr::Parameter(i) => f.write_str(self.symbols.parameter_name(*i)),
            Expr::Constant(c) => f.write_str(c.name()),
            Expr::Unary(UnaryOp::Neg, inner) => {
                f.write_str("-")?;
                // `--x` would not re-parse the same way after a negative literal.
                self.write_operand(f, inner, PREC_UNARY + 1)
            }
            Expr::Binary(lhs, op, rhs) => {
                let prec = op.precedence();
                let (left_min, right_min) = match op {
                    BinaryOp::Pow => (PREC_ATOM, PREC_UNARY),
                    _ => (prec, prec + 1),
                };
                self.write_operand(f, lhs, left_min)?;
                write!(f, " {} ", op.symbol())?;
                self.write_operand(f, rhs, right_min)
            }
            Expr::Call(function, arg) => write!(f, "{}({})", function.name(), self.child(arg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folding_removes_identities() {
        let x = Expr::Variable(0);
        assert_eq!(Expr::add(Expr::Number(0.0), x.clone()), x);
        assert_eq!(Expr::mul(Expr::Number(1.0), x.clone()), x);
        assert_eq!(Expr::mul(x.clone(), Expr::Number(0.0)), Expr::Number(0.0));
        assert_eq!(Expr::pow(x.clone(), Expr::Number(1.0)), x);
        assert_eq!(Expr::sub(Expr::Number(0.0), x.clone()), Expr::neg(x.clone()));
        assert_eq!(Expr::neg(Expr::neg(x.clone())), x);
        assert_eq!(
            Expr::mul(Expr::Number(2.0), Expr::Number(3.0)),
            Expr::Number(6.0)
        );
    }

    #[test]
    fn folding_keeps_non_finite_results_symbolic() {
        let folded = Expr::div(Expr::Number(1.0), Expr::Number(0.0));
        assert!(matches!(folded, Expr::Binary(_, BinaryOp::Div, _)));
        let folded = Expr::call(Function::Log, Expr::Number(-1.0));
        assert!(matches!(folded, Expr::Call(Function::Log, _)));
    }

    #[test]
    fn function_aliases_resolve() {
        assert_eq!(Function::from_name("sen"), Some(Function::Sin));
        assert_eq!(Function::from_name("ln"), Some(Function::Log));
        assert_eq!(Function::from_name("sene"), None);
    }

    #[test]
    fn sign_is_zero_at_zero() {
        assert_eq!(Function::Sign.apply(0.0), 0.0);
        assert_eq!(Function::Sign.apply(-0.0), 0.0);
        assert_eq!(Function::Sign.apply(-3.5), -1.0);
        assert_eq!(Function::Sign.apply(2.0), 1.0);
        assert!(Function::Sign.apply(f64::NAN).is_nan());
        assert_eq!(Expr::call(Function::Sign, Expr::Number(0.0)), Expr::Number(0.0));
    }
}

//! User-facing algebraic expressions.
//!
//! Source strings are parsed once into an AST, compiled to bytecode for the
//! stack VM, and kept immutable afterwards. Derivatives are taken on the AST,
//! so `partial` returns another exact `Expression`.

pub mod ast;
pub mod compiler;
pub mod derive;
pub mod parser;

use crate::error::{EvaluationError, ParseError};
use crate::traits::Scalar;
use ast::Expr;
use compiler::{Bytecode, VM};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// The names an expression may refer to.
///
/// Variables and parameters are positional: their declaration order is the
/// order of the slices passed to [`Expression::eval`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbols {
    variables: Vec<String>,
    parameters: Vec<String>,
    aliases: Vec<(String, usize)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Resolved {
    Variable(usize),
    Parameter(usize),
}

impl Symbols {
    pub fn new(variables: &[&str], parameters: &[&str]) -> Result<Self, ParseError> {
        let mut symbols = Self {
            variables: Vec::with_capacity(variables.len()),
            parameters: Vec::with_capacity(parameters.len()),
            aliases: Vec::new(),
        };
        for name in variables {
            symbols.ensure_fresh(name)?;
            symbols.variables.push(name.to_string());
        }
        for name in parameters {
            symbols.ensure_fresh(name)?;
            symbols.parameters.push(name.to_string());
        }
        Ok(symbols)
    }

    /// Declares `alias` as another spelling of the variable `target`.
    pub fn with_alias(mut self, alias: &str, target: &str) -> Result<Self, ParseError> {
        let index = self
            .variables
            .iter()
            .position(|v| v == target)
            .ok_or_else(|| ParseError::UnknownVariable {
                name: target.to_string(),
            })?;
        self.ensure_fresh(alias)?;
        self.aliases.push((alias.to_string(), index));
        Ok(self)
    }

    fn ensure_fresh(&self, name: &str) -> Result<(), ParseError> {
        if self.resolve(name).is_some() {
            return Err(ParseError::DuplicateSymbol {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn resolve(&self, name: &str) -> Option<Resolved> {
        if let Some(i) = self.variable_index(name) {
            return Some(Resolved::Variable(i));
        }
        self.parameters
            .iter()
            .position(|p| p == name)
            .map(Resolved::Parameter)
    }

    /// Index of a variable by name or alias.
    pub fn variable_index(&self, name: &str) -> Option<usize> {
        self.variables.iter().position(|v| v == name).or_else(|| {
            self.aliases
                .iter()
                .find(|(alias, _)| alias == name)
                .map(|(_, i)| *i)
        })
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub(crate) fn variable_name(&self, index: usize) -> &str {
        self.variables.get(index).map_or("?", String::as_str)
    }

    pub(crate) fn parameter_name(&self, index: usize) -> &str {
        self.parameters.get(index).map_or("?", String::as_str)
    }
}

/// A parsed, compiled scalar formula.
///
/// Cloning is cheap: the symbol table is shared.
#[derive(Debug, Clone)]
pub struct Expression {
    source: String,
    ast: Expr,
    bytecode: Bytecode,
    symbols: Arc<Symbols>,
}

impl Expression {
    /// Parses `source` over the given free variables and parameters.
    pub fn parse(source: &str, variables: &[&str], parameters: &[&str]) -> Result<Self, ParseError> {
        let symbols = Symbols::new(variables, parameters)?;
        Self::parse_with(source, Arc::new(symbols))
    }

    /// Parses `source` against an existing symbol table.
    pub fn parse_with(source: &str, symbols: Arc<Symbols>) -> Result<Self, ParseError> {
        let ast = parser::parse(source, &symbols)?;
        Ok(Self::from_ast(source.trim().to_string(), ast, symbols))
    }

    fn from_ast(source: String, ast: Expr, symbols: Arc<Symbols>) -> Self {
        let bytecode = compiler::compile(&ast);
        Self {
            source,
            ast,
            bytecode,
            symbols,
        }
    }

    /// The text this expression was parsed from, or the rendered form for
    /// derived expressions.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr {
        &self.ast
    }

    pub fn symbols(&self) -> &Symbols {
        &self.symbols
    }

    pub fn shared_symbols(&self) -> Arc<Symbols> {
        Arc::clone(&self.symbols)
    }

    /// Whether the expression mentions the named variable.
    pub fn depends_on(&self, variable: &str) -> bool {
        self.symbols
            .variable_index(variable)
            .is_some_and(|i| self.ast.depends_on(i))
    }

    /// Positional evaluation. Values that cannot be computed come back as NaN.
    pub fn eval(&self, vars: &[f64], params: &[f64]) -> f64 {
        self.eval_scalar(vars, params)
    }

    /// Positional evaluation over any scalar, e.g. dual numbers.
    pub fn eval_scalar<T: Scalar>(&self, vars: &[T], params: &[T]) -> T {
        let mut stack = Vec::with_capacity(self.bytecode.max_stack());
        VM::execute(&self.bytecode, vars, params, &mut stack)
    }

    /// Positional evaluation that rejects wrong arity and non-finite results.
    pub fn try_eval(&self, vars: &[f64], params: &[f64]) -> Result<f64, EvaluationError> {
        self.check_arity(vars.len(), params.len())?;
        let value = self.eval(vars, params);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvaluationError::NonFinite {
                expression: self.source.clone(),
                value,
                point: self.describe_point(vars, params),
            })
        }
    }

    /// Evaluation by name. Aliases are accepted for variables.
    pub fn evaluate(&self, values: &HashMap<&str, f64>) -> Result<f64, EvaluationError> {
        let mut vars = vec![f64::NAN; self.symbols.variables.len()];
        for (i, slot) in vars.iter_mut().enumerate() {
            *slot = self.lookup_variable(values, i)?;
        }
        let params = self
            .symbols
            .parameters
            .iter()
            .map(|name| {
                values
                    .get(name.as_str())
                    .copied()
                    .ok_or_else(|| EvaluationError::MissingBinding { name: name.clone() })
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.try_eval(&vars, &params)
    }

    fn lookup_variable(&self, values: &HashMap<&str, f64>, index: usize) -> Result<f64, EvaluationError> {
        let name = &self.symbols.variables[index];
        if let Some(value) = values.get(name.as_str()) {
            return Ok(*value);
        }
        self.symbols
            .aliases
            .iter()
            .filter(|(_, target)| *target == index)
            .find_map(|(alias, _)| values.get(alias.as_str()).copied())
            .ok_or_else(|| EvaluationError::MissingBinding { name: name.clone() })
    }

    /// Element-wise evaluation over one column per variable.
    ///
    /// Non-finite entries are returned as-is so plotting code can mask them.
    pub fn evaluate_columns(&self, columns: &[&[f64]], params: &[f64]) -> Result<Vec<f64>, EvaluationError> {
        self.check_arity(columns.len(), params.len())?;
        let len = columns.first().map_or(1, |c| c.len());
        if let Some(bad) = columns.iter().find(|c| c.len() != len) {
            return Err(EvaluationError::DimensionMismatch {
                expected: len,
                got: bad.len(),
            });
        }

        let mut stack = Vec::with_capacity(self.bytecode.max_stack());
        let mut point = vec![0.0; columns.len()];
        let values = (0..len)
            .map(|row| {
                for (slot, column) in point.iter_mut().zip(columns) {
                    *slot = column[row];
                }
                VM::execute(&self.bytecode, &point, params, &mut stack)
            })
            .collect();
        Ok(values)
    }

    /// Exact partial derivative with respect to a variable (or its alias).
    pub fn partial(&self, variable: &str) -> Result<Expression, ParseError> {
        let index = self
            .symbols
            .variable_index(variable)
            .ok_or_else(|| ParseError::UnknownVariable {
                name: variable.to_string(),
            })?;
        let ast = derive::derive(&self.ast, index);
        let source = ast.display(&self.symbols).to_string();
        Ok(Self::from_ast(source, ast, self.shared_symbols()))
    }

    fn check_arity(&self, vars: usize, params: usize) -> Result<(), EvaluationError> {
        let expected_vars = self.symbols.variables.len();
        if vars != expected_vars {
            return Err(EvaluationError::DimensionMismatch {
                expected: expected_vars,
                got: vars,
            });
        }
        let expected_params = self.symbols.parameters.len();
        if params != expected_params {
            return Err(EvaluationError::DimensionMismatch {
                expected: expected_params,
                got: params,
            });
        }
        Ok(())
    }

    fn describe_point(&self, vars: &[f64], params: &[f64]) -> String {
        let names = self.symbols.variables.iter().chain(&self.symbols.parameters);
        let values = vars.iter().chain(params);
        let parts: Vec<String> = names.zip(values).map(|(n, v)| format!("{n}={v}")).collect();
        format!("({})", parts.join(", "))
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ast.display(&self.symbols))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autodiff::Dual;
    use approx::assert_relative_eq;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn expressions_are_thread_safe() {
        assert_send_sync::<Expression>();
    }

    #[test]
    fn evaluates_by_name_and_position() {
        let f = Expression::parse("r + x^2", &["x"], &["r"]).unwrap();
        let values = HashMap::from([("x", 3.0), ("r", -1.0)]);
        assert_relative_eq!(f.evaluate(&values).unwrap(), 8.0);
        assert_relative_eq!(f.eval(&[3.0], &[-1.0]), 8.0);

        let missing = f.evaluate(&HashMap::from([("x", 3.0)])).unwrap_err();
        assert_eq!(
            missing,
            EvaluationError::MissingBinding {
                name: "r".to_string()
            }
        );
    }

    #[test]
    fn aliases_bind_like_their_targets() {
        let symbols = Symbols::new(&["x", "y", "t"], &[])
            .unwrap()
            .with_alias("x1", "x")
            .unwrap()
            .with_alias("x2", "y")
            .unwrap();
        let f = Expression::parse_with("x2 - x1^2", Arc::new(symbols)).unwrap();
        assert_eq!(f.to_string(), "y - x ^ 2");
        let values = HashMap::from([("x1", 2.0), ("x2", 5.0), ("t", 0.0)]);
        assert_relative_eq!(f.evaluate(&values).unwrap(), 1.0);
        assert!(f.depends_on("x1"));
        assert!(!f.depends_on("t"));
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        assert_eq!(
            Symbols::new(&["x"], &["x"]),
            Err(ParseError::DuplicateSymbol {
                name: "x".to_string()
            })
        );
        let err = Symbols::new(&["x", "y"], &[])
            .unwrap()
            .with_alias("y", "x")
            .unwrap_err();
        assert!(matches!(err, ParseError::DuplicateSymbol { .. }));
    }

    #[test]
    fn non_finite_results_are_errors_when_checked() {
        let f = Expression::parse("log(x)", &["x"], &[]).unwrap();
        assert!(f.eval(&[-1.0], &[]).is_nan());
        let err = f.try_eval(&[-1.0], &[]).unwrap_err();
        match err {
            EvaluationError::NonFinite { point, .. } => assert_eq!(point, "(x=-1)"),
            other => panic!("unexpected error {other:?}"),
        }
        assert!(matches!(
            f.try_eval(&[1.0, 2.0], &[]),
            Err(EvaluationError::DimensionMismatch { expected: 1, got: 2 })
        ));
    }

    #[test]
    fn evaluates_columns_element_wise() {
        let f = Expression::parse("x * y + r", &["x", "y"], &["r"]).unwrap();
        let xs: &[f64] = &[1.0, 2.0, 3.0];
        let ys: &[f64] = &[4.0, 5.0, 6.0];
        let out = f.evaluate_columns(&[xs, ys], &[0.5]).unwrap();
        assert_eq!(out, vec![4.5, 10.5, 18.5]);

        let short: &[f64] = &[1.0];
        assert!(matches!(
            f.evaluate_columns(&[xs, short], &[0.5]),
            Err(EvaluationError::DimensionMismatch { expected: 3, got: 1 })
        ));
    }

    #[test]
    fn partial_derivatives_are_exact_and_reparse() {
        let f = Expression::parse("sen(x) * exp(r * x)", &["x"], &["r"]).unwrap();
        let df = f.partial("x").unwrap();
        let (x, r) = (0.7_f64, -0.3_f64);
        let expected = x.cos() * (r * x).exp() + x.sin() * r * (r * x).exp();
        assert_relative_eq!(df.eval(&[x], &[r]), expected, epsilon = 1e-14);

        let reparsed = Expression::parse(df.source(), &["x"], &["r"]).unwrap();
        assert_relative_eq!(reparsed.eval(&[x], &[r]), expected, epsilon = 1e-14);

        assert!(matches!(
            f.partial("r"),
            Err(ParseError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn dual_evaluation_matches_symbolic_derivative() {
        let f = Expression::parse("x^3 - 2*x + sqrt(1 + x^2)", &["x"], &[]).unwrap();
        let df = f.partial("x").unwrap();
        for x in [-1.5, 0.0, 0.8, 2.2] {
            let dual = f.eval_scalar(&[Dual::new(x, 1.0)], &[]);
            assert_relative_eq!(dual.val, f.eval(&[x], &[]), epsilon = 1e-14);
            assert_relative_eq!(dual.eps, df.eval(&[x], &[]), epsilon = 1e-12);
        }
    }
}

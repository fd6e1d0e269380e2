//! Planar systems `dx/dt = f1(x, y, t)`, `dy/dt = f2(x, y, t)`.
//!
//! A system is either linear with an optional forcing term or a custom field
//! given by two expressions. Equilibria come from a fixed constellation of
//! Newton seeds; each one is classified from the Jacobian at that point.

use crate::classification::{Classification, JacobianResult};
use crate::error::{EvaluationError, ParseError};
use crate::expression::{Expression, Symbols};
use crate::newton::{self, NewtonSettings};
use crate::scalar::linspace;
use crate::traits::{DynamicalSystem, Scalar};
use anyhow::{bail, Result};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Newton seeds: origin, axis and diagonal points at 1 and 2, plus four
/// points on the main diagonal.
pub const SEED_POINTS: [[f64; 2]; 21] = [
    [0.0, 0.0],
    [1.0, 0.0],
    [-1.0, 0.0],
    [0.0, 1.0],
    [0.0, -1.0],
    [1.0, 1.0],
    [-1.0, -1.0],
    [1.0, -1.0],
    [-1.0, 1.0],
    [2.0, 0.0],
    [-2.0, 0.0],
    [0.0, 2.0],
    [0.0, -2.0],
    [2.0, 2.0],
    [-2.0, -2.0],
    [2.0, -2.0],
    [-2.0, 2.0],
    [0.5, 0.5],
    [-0.5, -0.5],
    [1.5, 1.5],
    [-1.5, -1.5],
];

/// What to do when a custom field evaluates to NaN or infinity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NonFinitePolicy {
    /// Surface an [`EvaluationError::NonFinite`].
    #[default]
    Reject,
    /// Log a warning and use `[0, 0]` instead.
    SubstituteZero,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarSearchSettings {
    /// Residual bound per component and merge distance between equilibria.
    pub tolerance: f64,
    pub non_finite: NonFinitePolicy,
    pub newton: NewtonSettings,
}

impl Default for PlanarSearchSettings {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            non_finite: NonFinitePolicy::Reject,
            newton: NewtonSettings::default(),
        }
    }
}

/// Rectangular search window `((x_min, x_max), (y_min, y_max))`.
pub type SearchBox = ((f64, f64), (f64, f64));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForcingKind {
    Constant,
    Exponential,
    Sine,
    Cosine,
}

/// Additive term `(c1, c2) · g(param · t)` of a linear system.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Forcing {
    pub kind: ForcingKind,
    pub c1: f64,
    pub c2: f64,
    #[serde(default)]
    pub param: f64,
}

impl Forcing {
    fn profile<T: Scalar>(&self, t: T) -> T {
        let arg = T::constant(self.param) * t;
        match self.kind {
            ForcingKind::Constant => T::one(),
            ForcingKind::Exponential => arg.exp(),
            ForcingKind::Sine => arg.sin(),
            ForcingKind::Cosine => arg.cos(),
        }
    }

    pub fn at(&self, t: f64) -> [f64; 2] {
        let g = self.profile(t);
        [self.c1 * g, self.c2 * g]
    }
}

/// A nonlinear field over `x`, `y` (also `x1`, `x2`), `t` and named
/// parameters, with its exact Jacobian entries.
#[derive(Debug, Clone)]
pub struct CustomField {
    components: [Expression; 2],
    jacobian: [[Expression; 2]; 2],
    param_values: Vec<f64>,
}

impl CustomField {
    fn parse(f1: &str, f2: &str, parameters: &[(&str, f64)]) -> Result<Self, ParseError> {
        let names: Vec<&str> = parameters.iter().map(|(name, _)| *name).collect();
        let symbols = Symbols::new(&["x", "y", "t"], &names)?
            .with_alias("x1", "x")?
            .with_alias("x2", "y")?;
        let symbols = Arc::new(symbols);
        let f1 = Expression::parse_with(f1, Arc::clone(&symbols))?;
        let f2 = Expression::parse_with(f2, symbols)?;
        let jacobian = [
            [f1.partial("x")?, f1.partial("y")?],
            [f2.partial("x")?, f2.partial("y")?],
        ];
        Ok(Self {
            components: [f1, f2],
            jacobian,
            param_values: parameters.iter().map(|(_, value)| *value).collect(),
        })
    }

    pub fn components(&self) -> &[Expression; 2] {
        &self.components
    }

    pub fn parameter_names(&self) -> &[String] {
        self.components[0].symbols().parameters()
    }

    pub fn parameter_values(&self) -> &[f64] {
        &self.param_values
    }

    fn eval<T: Scalar>(&self, x: T, y: T, t: T, out: &mut [T]) {
        let params: Vec<T> = self.param_values.iter().map(|&p| T::constant(p)).collect();
        let vars = [x, y, t];
        out[0] = self.components[0].eval_scalar(&vars, &params);
        out[1] = self.components[1].eval_scalar(&vars, &params);
    }
}

#[derive(Debug, Clone)]
pub enum PlanarSystem {
    Linear {
        matrix: [[f64; 2]; 2],
        forcing: Option<Forcing>,
    },
    Custom(CustomField),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanarEquilibrium {
    pub position: [f64; 2],
    pub jacobian: JacobianResult,
    pub classification: Classification,
}

impl PlanarSystem {
    pub fn linear(matrix: [[f64; 2]; 2]) -> Self {
        Self::Linear {
            matrix,
            forcing: None,
        }
    }

    pub fn forced(matrix: [[f64; 2]; 2], forcing: Forcing) -> Self {
        Self::Linear {
            matrix,
            forcing: Some(forcing),
        }
    }

    pub fn custom(f1: &str, f2: &str) -> Result<Self, ParseError> {
        Self::custom_with_parameters(f1, f2, &[])
    }

    /// A custom field whose parameters are fixed at the given values.
    pub fn custom_with_parameters(
        f1: &str,
        f2: &str,
        parameters: &[(&str, f64)],
    ) -> Result<Self, ParseError> {
        Ok(Self::Custom(CustomField::parse(f1, f2, parameters)?))
    }

    pub fn is_homogeneous_linear(&self) -> bool {
        matches!(self, Self::Linear { forcing: None, .. })
    }

    /// The single classification of a linear system, which holds at every
    /// equilibrium. Custom fields have none.
    pub fn linear_classification(&self) -> Option<Classification> {
        match self {
            Self::Linear { matrix, .. } => Some(JacobianResult::new(*matrix).classification()),
            Self::Custom(_) => None,
        }
    }

    /// The vector field at `(x, y, t)` under the given non-finite policy.
    pub fn evaluate(&self, point: [f64; 2], t: f64, policy: NonFinitePolicy) -> Result<[f64; 2], EvaluationError> {
        let mut out = [0.0; 2];
        DynamicalSystem::<f64>::apply(self, t, &point, &mut out);
        if out.iter().all(|v| v.is_finite()) {
            return Ok(out);
        }
        let expression = match self {
            Self::Custom(field) => format!(
                "({}, {})",
                field.components[0].source(),
                field.components[1].source()
            ),
            Self::Linear { .. } => "linear field".to_string(),
        };
        match policy {
            NonFinitePolicy::Reject => Err(EvaluationError::NonFinite {
                expression,
                value: out.into_iter().find(|v| !v.is_finite()).unwrap_or(f64::NAN),
                point: format!("(x={}, y={}, t={})", point[0], point[1], t),
            }),
            NonFinitePolicy::SubstituteZero => {
                warn!(
                    "{expression} is not finite at ({}, {}), t = {t}; using [0, 0]",
                    point[0], point[1]
                );
                Ok([0.0; 2])
            }
        }
    }

    /// Equilibria inside `search_box`.
    ///
    /// A homogeneous linear system returns `[(0, 0)]` without searching. A
    /// linear system for which the search finds nothing also falls back to
    /// the origin; a custom field returns an empty list.
    pub fn find_equilibria(&self, search_box: SearchBox, settings: &PlanarSearchSettings) -> Result<Vec<[f64; 2]>> {
        if self.is_homogeneous_linear() {
            return Ok(vec![[0.0, 0.0]]);
        }
        let ((x_min, x_max), (y_min, y_max)) = search_box;
        if ![x_min, x_max, y_min, y_max].iter().all(|v| v.is_finite()) || x_max <= x_min || y_max <= y_min {
            bail!("search box must be finite with max > min on both axes.");
        }
        if !(settings.tolerance > 0.0 && settings.tolerance.is_finite()) {
            bail!("tolerance must be positive.");
        }
        settings.newton.validate()?;

        let flow = PlanarFlow {
            system: self,
            t: 0.0,
            policy: settings.non_finite,
        };
        let mut found: Vec<[f64; 2]> = Vec::new();
        for seed in SEED_POINTS {
            let candidate = match newton::solve(&flow, &seed, settings.newton) {
                Ok(result) => [result.state[0], result.state[1]],
                Err(err) => {
                    debug!("seed {seed:?}: {err:#}");
                    continue;
                }
            };
            let [x, y] = candidate;
            if !((x_min..=x_max).contains(&x) && (y_min..=y_max).contains(&y)) {
                continue;
            }
            let residual = match self.evaluate(candidate, 0.0, settings.non_finite) {
                Ok(residual) => residual,
                Err(err) => {
                    debug!("seed {seed:?}: {err}");
                    continue;
                }
            };
            if residual.iter().any(|r| !(r.abs() < settings.tolerance)) {
                continue;
            }
            let is_new = found
                .iter()
                .all(|p| (p[0] - x).hypot(p[1] - y) >= settings.tolerance);
            if is_new {
                found.push(candidate);
            }
        }

        if found.is_empty() && matches!(self, Self::Linear { .. }) {
            found.push([0.0, 0.0]);
        }
        Ok(found)
    }

    /// Jacobian at `point` (with `t = 0` for custom fields).
    pub fn jacobian_at(&self, point: [f64; 2], policy: NonFinitePolicy) -> Result<JacobianResult, EvaluationError> {
        let field = match self {
            Self::Linear { matrix, .. } => return Ok(JacobianResult::new(*matrix)),
            Self::Custom(field) => field,
        };
        let vars = [point[0], point[1], 0.0];
        let mut matrix = [[0.0; 2]; 2];
        for (i, row) in field.jacobian.iter().enumerate() {
            for (j, entry) in row.iter().enumerate() {
                let value = entry.eval(&vars, &field.param_values);
                if !value.is_finite() {
                    match policy {
                        NonFinitePolicy::Reject => {
                            return Err(EvaluationError::NonFinite {
                                expression: entry.source().to_string(),
                                value,
                                point: format!("(x={}, y={})", point[0], point[1]),
                            })
                        }
                        NonFinitePolicy::SubstituteZero => {
                            warn!(
                                "Jacobian entry {} is not finite at ({}, {}); using 0",
                                entry.source(),
                                point[0],
                                point[1]
                            );
                        }
                    }
                } else {
                    matrix[i][j] = value;
                }
            }
        }
        Ok(JacobianResult::new(matrix))
    }

    /// Equilibria with the Jacobian re-evaluated and classified at each one.
    ///
    /// Under [`NonFinitePolicy::Reject`] an equilibrium whose Jacobian is not
    /// finite is left out with a warning; the others are still reported.
    pub fn analyze_equilibria(&self, search_box: SearchBox, settings: &PlanarSearchSettings) -> Result<Vec<PlanarEquilibrium>> {
        let mut equilibria = Vec::new();
        for position in self.find_equilibria(search_box, settings)? {
            let jacobian = match self.jacobian_at(position, settings.non_finite) {
                Ok(jacobian) => jacobian,
                Err(err) => {
                    warn!("skipping equilibrium at ({}, {}): {err}", position[0], position[1]);
                    continue;
                }
            };
            let classification = jacobian.classification();
            equilibria.push(PlanarEquilibrium {
                position,
                jacobian,
                classification,
            });
        }
        Ok(equilibria)
    }

    /// Raw partial derivatives at `(x, y)` and `t = 0`, NaN included.
    fn partials_at(&self, x: f64, y: f64) -> [[f64; 2]; 2] {
        match self {
            Self::Linear { matrix, .. } => *matrix,
            Self::Custom(field) => {
                let vars = [x, y, 0.0];
                let entry = |i: usize, j: usize| field.jacobian[i][j].eval(&vars, &field.param_values);
                [[entry(0, 0), entry(0, 1)], [entry(1, 0), entry(1, 1)]]
            }
        }
    }

    /// `∂f1/∂x + ∂f2/∂y` at `(x, y)`.
    pub fn divergence_at(&self, x: f64, y: f64) -> f64 {
        let [[a, _], [_, d]] = self.partials_at(x, y);
        a + d
    }

    /// Whether the divergence vanishes on a `samples × samples` grid over
    /// `window`. Non-finite samples count as non-zero.
    ///
    /// A divergence-free planar field is Hamiltonian: `f = (∂H/∂y, −∂H/∂x)`
    /// for some `H` on a simply connected window.
    pub fn is_divergence_free(&self, window: SearchBox, samples: usize, tolerance: f64) -> Result<bool> {
        holds_on_grid(window, samples, |x, y| self.divergence_at(x, y).abs() < tolerance)
    }

    /// Gradient flow test: `∂f1/∂y = ∂f2/∂x` and negative divergence at
    /// every grid point, i.e. `f = −∇V` with `V` decreasing along orbits.
    pub fn is_gradient(&self, window: SearchBox, samples: usize, tolerance: f64) -> Result<bool> {
        holds_on_grid(window, samples, |x, y| {
            let [[a, b], [c, d]] = self.partials_at(x, y);
            (b - c).abs() < tolerance && a + d < 0.0
        })
    }

    /// Time-reversal symmetry under `(x, y, t) ↦ (x, −y, −t)`:
    /// `f1(x, −y) = −f1(x, y)` and `f2(x, −y) = f2(x, y)` at `t = 0`.
    pub fn is_reversible(&self, window: SearchBox, samples: usize, tolerance: f64) -> Result<bool> {
        holds_on_grid(window, samples, |x, y| {
            let mut value = [0.0; 2];
            let mut mirrored = [0.0; 2];
            DynamicalSystem::<f64>::apply(self, 0.0, &[x, y], &mut value);
            DynamicalSystem::<f64>::apply(self, 0.0, &[x, -y], &mut mirrored);
            (mirrored[0] + value[0]).abs() < tolerance && (mirrored[1] - value[1]).abs() < tolerance
        })
    }

    /// All three structural checks over the same grid.
    pub fn field_properties(&self, window: SearchBox, samples: usize, tolerance: f64) -> Result<FieldProperties> {
        Ok(FieldProperties {
            hamiltonian: self.is_divergence_free(window, samples, tolerance)?,
            gradient: self.is_gradient(window, samples, tolerance)?,
            reversible: self.is_reversible(window, samples, tolerance)?,
        })
    }
}

/// Structural properties of a planar field, sampled on a grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProperties {
    /// Divergence-free, hence conservative.
    pub hamiltonian: bool,
    pub gradient: bool,
    pub reversible: bool,
}

/// Evaluates `predicate` on a `samples × samples` grid over `window`.
fn holds_on_grid(window: SearchBox, samples: usize, predicate: impl Fn(f64, f64) -> bool) -> Result<bool> {
    let ((x_min, x_max), (y_min, y_max)) = window;
    if samples < 2 {
        bail!("at least two samples per axis are required.");
    }
    if !(x_max > x_min && y_max > y_min) {
        bail!("window must have max > min on both axes.");
    }
    let xs = linspace(x_min, x_max, samples);
    let ys = linspace(y_min, y_max, samples);
    Ok(xs.iter().all(|&x| ys.iter().all(|&y| predicate(x, y))))
}

impl<T: Scalar> DynamicalSystem<T> for PlanarSystem {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, t: T, x: &[T], out: &mut [T]) {
        match self {
            Self::Linear { matrix, forcing } => {
                let m = |i: usize, j: usize| T::constant(matrix[i][j]);
                out[0] = m(0, 0) * x[0] + m(0, 1) * x[1];
                out[1] = m(1, 0) * x[0] + m(1, 1) * x[1];
                if let Some(forcing) = forcing {
                    let g = forcing.profile(t);
                    out[0] = out[0] + T::constant(forcing.c1) * g;
                    out[1] = out[1] + T::constant(forcing.c2) * g;
                }
            }
            Self::Custom(field) => field.eval(x[0], x[1], t, out),
        }
    }
}

/// The field at a fixed time with the non-finite policy applied, as seen by
/// the Newton solver.
struct PlanarFlow<'a> {
    system: &'a PlanarSystem,
    t: f64,
    policy: NonFinitePolicy,
}

impl<T: Scalar> DynamicalSystem<T> for PlanarFlow<'_> {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        self.system.apply(T::constant(self.t), x, out);
        if self.policy == NonFinitePolicy::SubstituteZero && out.iter().any(|v| !v.is_finite()) {
            warn!("vector field is not finite at {x:?}; using [0, 0]");
            out.iter_mut().for_each(|v| *v = T::zero());
        }
    }
}

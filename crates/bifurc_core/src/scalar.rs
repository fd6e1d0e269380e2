//! Scalar flows `dx/dt = f(x, r)`: equilibria, their stability and the
//! phase-line helpers.

use crate::classification::{Stability, ZERO_TOLERANCE};
use crate::error::ParseError;
use crate::expression::Expression;
use crate::newton::{self, NewtonSettings};
use crate::traits::{DynamicalSystem, Scalar};
use anyhow::{bail, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Highest derivative order kept for multiplicity detection.
pub const MAX_DERIVATIVE_ORDER: usize = 4;

/// Upper bound on multiplicity-corrected Newton steps per root.
const POLISH_STEPS: usize = 8;

/// The state variable of every scalar system.
pub const STATE_VARIABLE: &str = "x";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalarSearchSettings {
    /// Number of evenly spaced Newton seeds across the search range.
    pub resolution: usize,
    /// Residual bound for accepting a root and distance for merging roots.
    pub tolerance: f64,
    pub newton: NewtonSettings,
}

impl Default for ScalarSearchSettings {
    fn default() -> Self {
        Self {
            resolution: 50,
            tolerance: 1e-6,
            newton: NewtonSettings::default(),
        }
    }
}

impl ScalarSearchSettings {
    pub fn validate(&self) -> Result<()> {
        if self.resolution == 0 {
            bail!("resolution must be greater than zero.");
        }
        if !(self.tolerance > 0.0 && self.tolerance.is_finite()) {
            bail!("tolerance must be positive.");
        }
        self.newton.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarEquilibrium {
    pub position: f64,
    pub param_value: f64,
    pub stability: Stability,
    /// Order of the first non-vanishing derivative at the root.
    pub multiplicity: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowDirection {
    Increasing,
    Decreasing,
    Stationary,
}

/// Stability of a scalar equilibrium from the sign of `f'(x*)`.
pub fn classify_sign(derivative: f64) -> Stability {
    if !derivative.is_finite() {
        Stability::Undetermined
    } else if derivative.abs() < ZERO_TOLERANCE {
        Stability::Neutral
    } else if derivative < 0.0 {
        Stability::Stable
    } else {
        Stability::Unstable
    }
}

/// `f(x)` or `f(x, r)` together with its exact derivatives in `x`.
#[derive(Debug, Clone)]
pub struct ScalarSystem {
    f: Expression,
    /// `derivatives[k]` is the `(k + 1)`-th derivative.
    derivatives: Vec<Expression>,
    parameter: Option<String>,
}

impl ScalarSystem {
    pub fn new(source: &str) -> Result<Self, ParseError> {
        Self::from_expression(Expression::parse(source, &[STATE_VARIABLE], &[])?)
    }

    pub fn with_parameter(source: &str, parameter: &str) -> Result<Self, ParseError> {
        Self::from_expression(Expression::parse(source, &[STATE_VARIABLE], &[parameter])?)
    }

    fn from_expression(f: Expression) -> Result<Self, ParseError> {
        let mut derivatives = Vec::with_capacity(MAX_DERIVATIVE_ORDER);
        let mut current = f.clone();
        for _ in 0..MAX_DERIVATIVE_ORDER {
            current = current.partial(STATE_VARIABLE)?;
            derivatives.push(current.clone());
        }
        let parameter = f.symbols().parameters().first().cloned();
        Ok(Self {
            f,
            derivatives,
            parameter,
        })
    }

    pub fn expression(&self) -> &Expression {
        &self.f
    }

    /// `f'`, the expression the stability rule looks at.
    pub fn derivative(&self) -> &Expression {
        &self.derivatives[0]
    }

    pub fn parameter(&self) -> Option<&str> {
        self.parameter.as_deref()
    }

    fn params(&self, r: f64) -> Vec<f64> {
        if self.parameter.is_some() {
            vec![r]
        } else {
            Vec::new()
        }
    }

    pub fn value(&self, x: f64, r: f64) -> f64 {
        self.f.eval(&[x], &self.params(r))
    }

    pub fn slope(&self, x: f64, r: f64) -> f64 {
        self.derivative().eval(&[x], &self.params(r))
    }

    /// The vector field with the parameter frozen at `r`.
    pub fn at(&self, r: f64) -> ScalarFlow<'_> {
        ScalarFlow {
            system: self,
            params: self.params(r),
        }
    }

    /// All real roots of `f(·, r)` in `search_range`, ascending.
    ///
    /// Seeds that fail to converge, leave the range or keep a residual above
    /// the tolerance are skipped. An empty result is not an error.
    pub fn find_equilibria(
        &self,
        r: f64,
        search_range: (f64, f64),
        settings: &ScalarSearchSettings,
    ) -> Result<Vec<f64>> {
        let (lo, hi) = search_range;
        if !(lo.is_finite() && hi.is_finite() && hi > lo) {
            bail!("search range must be finite with max > min, got ({lo}, {hi}).");
        }
        settings.validate()?;

        let flow = self.at(r);
        let mut roots: Vec<f64> = Vec::new();
        for seed in linspace(lo, hi, settings.resolution) {
            let x = match newton::solve(&flow, &[seed], settings.newton) {
                Ok(result) => self.polish(result.state[0], r, settings.tolerance),
                Err(err) => {
                    debug!("seed {seed} at r = {r}: {err:#}");
                    continue;
                }
            };
            if !(lo..=hi).contains(&x) {
                continue;
            }
            if !(self.value(x, r).abs() < settings.tolerance) {
                debug!("seed {seed} at r = {r}: residual too large at x = {x}");
                continue;
            }
            if roots.iter().all(|root| (root - x).abs() >= settings.tolerance) {
                roots.push(x);
            }
        }
        roots.sort_by(f64::total_cmp);
        Ok(roots)
    }

    /// Multiplicity as seen from a point that may sit slightly off the root:
    /// `f^(k)` counts as vanishing when a root of it could lie within
    /// `radius`, i.e. `|f^(k)| <= |f^(k+1)| · radius`.
    fn local_multiplicity(&self, x: f64, params: &[f64], radius: f64) -> usize {
        let magnitudes: Vec<f64> = self
            .derivatives
            .iter()
            .map(|d| d.eval(&[x], params).abs())
            .collect();
        magnitudes
            .windows(2)
            .position(|pair| !(pair[0] <= ZERO_TOLERANCE.max(pair[1] * radius)))
            .map_or(magnitudes.len(), |k| k + 1)
    }

    /// Refines a converged Newton iterate at a multiple root.
    ///
    /// Plain Newton only converges linearly there and stops a little short,
    /// which leaves `f'` large enough to look hyperbolic when the leading
    /// coefficient is large. The step `x -= m·f/f'` converges quadratically
    /// for multiplicity `m`; a step that does not shrink `|f|` ends it.
    fn polish(&self, x: f64, r: f64, radius: f64) -> f64 {
        let params = self.params(r);
        let m = self.local_multiplicity(x, &params, radius);
        if m < 2 {
            return x;
        }
        let mut x = x;
        let mut fx = self.f.eval(&[x], &params);
        for _ in 0..POLISH_STEPS {
            let slope = self.derivatives[0].eval(&[x], &params);
            if fx == 0.0 || slope == 0.0 || !slope.is_finite() {
                break;
            }
            let next = x - m as f64 * fx / slope;
            let f_next = self.f.eval(&[next], &params);
            if !(f_next.abs() < fx.abs()) {
                break;
            }
            x = next;
            fx = f_next;
        }
        x
    }

    pub fn classify(&self, x: f64, r: f64) -> Stability {
        classify_sign(self.slope(x, r))
    }

    /// Order of the first derivative with `|f^(k)(x)| > 1e-10`, up to
    /// [`MAX_DERIVATIVE_ORDER`].
    pub fn multiplicity(&self, x: f64, r: f64) -> Option<usize> {
        let params = self.params(r);
        self.derivatives
            .iter()
            .position(|d| d.eval(&[x], &params).abs() > ZERO_TOLERANCE)
            .map(|k| k + 1)
    }

    /// Equilibria with stability and multiplicity attached.
    pub fn analyze_equilibria(
        &self,
        r: f64,
        search_range: (f64, f64),
        settings: &ScalarSearchSettings,
    ) -> Result<Vec<ScalarEquilibrium>> {
        let roots = self.find_equilibria(r, search_range, settings)?;
        Ok(roots
            .into_iter()
            .map(|position| ScalarEquilibrium {
                position,
                param_value: r,
                stability: self.classify(position, r),
                multiplicity: self.multiplicity(position, r),
            })
            .collect())
    }

    /// Phase-line arrow at `x`.
    pub fn flow_direction(&self, x: f64, r: f64) -> FlowDirection {
        let value = self.value(x, r);
        if value.abs() < ZERO_TOLERANCE || value.is_nan() {
            FlowDirection::Stationary
        } else if value > 0.0 {
            FlowDirection::Increasing
        } else {
            FlowDirection::Decreasing
        }
    }

    /// Whether nearby states contract towards each other (`f'(x) < 0`).
    pub fn is_attracting_region(&self, x: f64, r: f64) -> bool {
        self.slope(x, r) < 0.0
    }
}

/// A [`ScalarSystem`] with its parameter fixed, usable by the solvers.
pub struct ScalarFlow<'a> {
    system: &'a ScalarSystem,
    params: Vec<f64>,
}

impl<T: Scalar> DynamicalSystem<T> for ScalarFlow<'_> {
    fn dimension(&self) -> usize {
        1
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let params: Vec<T> = self.params.iter().map(|&p| T::constant(p)).collect();
        out[0] = self.system.f.eval_scalar(x, &params);
    }
}

/// `count` evenly spaced points from `lo` to `hi` inclusive.
pub(crate) fn linspace(lo: f64, hi: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![lo],
        _ => {
            let step = (hi - lo) / (count - 1) as f64;
            (0..count)
                .map(|i| if i + 1 == count { hi } else { lo + step * i as f64 })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    const WINDOW: (f64, f64) = (-3.0, 3.0);

    fn saddle_node() -> ScalarSystem {
        ScalarSystem::with_parameter("r + x^2", "r").unwrap()
    }

    fn pitchfork() -> ScalarSystem {
        ScalarSystem::with_parameter("r*x - x^3", "r").unwrap()
    }

    fn analyze(system: &ScalarSystem, r: f64) -> Vec<ScalarEquilibrium> {
        system
            .analyze_equilibria(r, WINDOW, &ScalarSearchSettings::default())
            .unwrap()
    }

    #[test]
    fn saddle_node_counts() {
        let system = saddle_node();

        let below = analyze(&system, -1.0);
        assert_eq!(below.len(), 2);
        assert_abs_diff_eq!(below[0].position, -1.0, epsilon = 1e-9);
        assert_eq!(below[0].stability, Stability::Stable);
        assert_abs_diff_eq!(below[1].position, 1.0, epsilon = 1e-9);
        assert_eq!(below[1].stability, Stability::Unstable);

        let at = analyze(&system, 0.0);
        assert_eq!(at.len(), 1);
        assert_abs_diff_eq!(at[0].position, 0.0, epsilon = 1e-9);
        assert_eq!(at[0].stability, Stability::Neutral);
        assert_eq!(at[0].multiplicity, Some(2));

        assert!(analyze(&system, 1.0).is_empty());
    }

    #[test]
    fn supercritical_pitchfork_counts() {
        let system = pitchfork();

        let below = analyze(&system, -1.0);
        assert_eq!(below.len(), 1);
        assert_abs_diff_eq!(below[0].position, 0.0, epsilon = 1e-9);
        assert_eq!(below[0].stability, Stability::Stable);

        let at = analyze(&system, 0.0);
        assert_eq!(at.len(), 1);
        assert_eq!(at[0].stability, Stability::Neutral);
        assert_eq!(at[0].multiplicity, Some(3));

        let above = analyze(&system, 1.0);
        let positions: Vec<f64> = above.iter().map(|e| e.position).collect();
        let stabilities: Vec<Stability> = above.iter().map(|e| e.stability).collect();
        assert_eq!(positions.len(), 3);
        assert_abs_diff_eq!(positions[0], -1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(positions[1], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(positions[2], 1.0, epsilon = 1e-9);
        assert_eq!(
            stabilities,
            vec![Stability::Stable, Stability::Unstable, Stability::Stable]
        );
        assert!(above.iter().all(|e| e.multiplicity == Some(1)));
    }

    #[test]
    fn cubic_with_double_root() {
        let system = ScalarSystem::with_parameter("x*(1-x)*(x-r)", "r").unwrap();
        let found = analyze(&system, 0.0);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].multiplicity, Some(2));
        assert_eq!(found[0].stability, Stability::Neutral);
        assert_abs_diff_eq!(found[1].position, 1.0, epsilon = 1e-9);
        assert_eq!(found[1].stability, Stability::Stable);
    }

    #[test]
    fn fold_stays_neutral_under_scaling() {
        for source in ["r + 100*x^2", "100*(r + x^2)", "r + 1e6*x^2", "1000*(r*x - x^3)"] {
            let system = ScalarSystem::with_parameter(source, "r").unwrap();
            let at = analyze(&system, 0.0);
            assert_eq!(at.len(), 1, "{source}");
            assert_abs_diff_eq!(at[0].position, 0.0, epsilon = 1e-9);
            assert_eq!(at[0].stability, Stability::Neutral, "{source}");
            assert!(at[0].multiplicity.is_some_and(|m| m >= 2), "{source}");
        }
        let scaled = ScalarSystem::with_parameter("100*(r + x^2)", "r").unwrap();
        assert_eq!(analyze(&scaled, 0.0)[0].multiplicity, Some(2));
    }

    #[test]
    fn polishing_leaves_simple_roots_alone() {
        let system = ScalarSystem::with_parameter("100*(r + x^2)", "r").unwrap();
        let below = analyze(&system, -1.0);
        assert_eq!(below.len(), 2);
        assert_abs_diff_eq!(below[0].position, -1.0, epsilon = 1e-12);
        assert_eq!(below[0].stability, Stability::Stable);
        assert_eq!(below[0].multiplicity, Some(1));
        assert_eq!(below[1].stability, Stability::Unstable);
    }

    #[test]
    fn abs_kink_is_neutral() {
        let system = ScalarSystem::new("x*abs(x)").unwrap();
        assert_eq!(system.classify(0.0, 0.0), Stability::Neutral);
        let roots = analyze(&system, 0.0);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].stability, Stability::Neutral);
    }

    #[test]
    fn repeated_searches_are_identical() {
        let system = pitchfork();
        let settings = ScalarSearchSettings::default();
        let first = system.find_equilibria(0.7, WINDOW, &settings).unwrap();
        let second = system.find_equilibria(0.7, WINDOW, &settings).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn parameter_free_systems() {
        let system = ScalarSystem::new("sin(x)").unwrap();
        assert_eq!(system.parameter(), None);
        let roots = system
            .find_equilibria(0.0, (-4.0, 4.0), &ScalarSearchSettings::default())
            .unwrap();
        assert_eq!(roots.len(), 3);
        assert_abs_diff_eq!(roots[0], -std::f64::consts::PI, epsilon = 1e-9);
        assert_eq!(system.classify(std::f64::consts::PI, 0.0), Stability::Stable);
    }

    #[test]
    fn identically_zero_field_terminates() {
        let system = ScalarSystem::new("0*x").unwrap();
        let roots = system
            .find_equilibria(0.0, WINDOW, &ScalarSearchSettings::default())
            .unwrap();
        // Every seed is already an exact root; they are merged only when close.
        assert_eq!(roots.len(), 50);
    }

    #[test]
    fn invalid_input_is_rejected() {
        assert!(ScalarSystem::with_parameter("r + y", "r").is_err());
        let system = saddle_node();
        let settings = ScalarSearchSettings::default();
        assert!(system.find_equilibria(0.0, (1.0, -1.0), &settings).is_err());
        assert!(system
            .find_equilibria(0.0, (f64::NEG_INFINITY, 1.0), &settings)
            .is_err());
        let bad = ScalarSearchSettings {
            resolution: 0,
            ..settings
        };
        assert!(system.find_equilibria(0.0, WINDOW, &bad).is_err());
    }

    #[test]
    fn phase_line_helpers() {
        let system = saddle_node();
        assert_eq!(system.flow_direction(0.0, -1.0), FlowDirection::Decreasing);
        assert_eq!(system.flow_direction(2.0, -1.0), FlowDirection::Increasing);
        assert_eq!(system.flow_direction(1.0, -1.0), FlowDirection::Stationary);
        assert!(system.is_attracting_region(-0.5, -1.0));
        assert!(!system.is_attracting_region(0.5, -1.0));
    }

    #[test]
    fn sign_rule() {
        assert_eq!(classify_sign(-0.3), Stability::Stable);
        assert_eq!(classify_sign(2.0), Stability::Unstable);
        assert_eq!(classify_sign(5e-11), Stability::Neutral);
        assert_eq!(classify_sign(f64::NAN), Stability::Undetermined);
    }

    #[test]
    fn linspace_hits_both_ends() {
        let points = linspace(-1.0, 1.0, 5);
        assert_eq!(points, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(linspace(2.0, 3.0, 1), vec![2.0]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn reported_stability_matches_derivative_sign(
            r in -2.0f64..2.0,
            family in 0usize..4,
        ) {
            let source = ["r + x^2", "r*x - x^3", "r*x + x^3", "r*x - x^2"][family];
            let system = ScalarSystem::with_parameter(source, "r").unwrap();
            for eq in analyze(&system, r) {
                prop_assert!(system.value(eq.position, r).abs() < 1e-6);
                prop_assert_eq!(eq.stability, classify_sign(system.slope(eq.position, r)));
            }
        }
    }
}

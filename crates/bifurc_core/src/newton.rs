use crate::autodiff::{forward_jacobian, Dual};
use crate::traits::DynamicalSystem;
use anyhow::{anyhow, bail, Context, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewtonSettings {
    pub max_steps: usize,
    pub damping: f64,
    /// Converged once `‖Δx‖ <= step_tolerance * (1 + ‖x‖)`.
    pub step_tolerance: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            max_steps: 100,
            damping: 1.0,
            step_tolerance: 1e-12,
        }
    }
}

impl NewtonSettings {
    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            bail!("max_steps must be greater than zero.");
        }
        if !(self.damping > 0.0 && self.damping.is_finite()) {
            bail!("damping must be positive.");
        }
        if !(self.step_tolerance > 0.0 && self.step_tolerance.is_finite()) {
            bail!("step_tolerance must be positive.");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewtonResult {
    pub state: Vec<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
}

/// Newton's method for `f(x) = 0` with the Jacobian from dual numbers.
///
/// Convergence is judged on the step, not the residual: near a multiple root
/// the residual is tiny long before the iterate settles. Callers decide
/// afterwards whether the residual is small enough to accept the root.
pub fn solve<S>(system: &S, initial_guess: &[f64], settings: NewtonSettings) -> Result<NewtonResult>
where
    S: DynamicalSystem<f64> + DynamicalSystem<Dual> + ?Sized,
{
    let dim = DynamicalSystem::<f64>::dimension(system);
    if dim == 0 {
        bail!("System has zero dimension.");
    }
    if initial_guess.len() != dim {
        bail!(
            "Initial guess dimension mismatch. Expected {}, got {}.",
            dim,
            initial_guess.len()
        );
    }
    settings.validate()?;

    let mut state = initial_guess.to_vec();
    let mut residual = vec![0.0; dim];
    let mut iterations = 0usize;

    loop {
        DynamicalSystem::<f64>::apply(system, 0.0, &state, &mut residual);
        if residual.iter().any(|r| !r.is_finite()) {
            bail!("Residual is not finite at {:?}.", state);
        }
        let residual_norm = l2_norm(&residual);
        if residual_norm == 0.0 {
            return Ok(NewtonResult {
                state,
                residual_norm,
                iterations,
            });
        }
        if iterations >= settings.max_steps {
            bail!(
                "Newton solver failed to converge in {} steps (‖f(x)‖ = {}).",
                settings.max_steps,
                residual_norm
            );
        }

        let jacobian = forward_jacobian(system, 0.0, &state);
        if jacobian.iter().any(|v| !v.is_finite()) {
            bail!("Jacobian is not finite at {:?}.", state);
        }
        let delta = solve_linear_system(dim, &jacobian, &residual)
            .context("Failed to solve linear system during Newton iteration.")?;

        let mut step_norm = 0.0_f64;
        for (x, d) in state.iter_mut().zip(&delta) {
            let step = settings.damping * d;
            *x -= step;
            step_norm += step * step;
        }
        iterations += 1;

        if step_norm.sqrt() <= settings.step_tolerance * (1.0 + l2_norm(&state)) {
            DynamicalSystem::<f64>::apply(system, 0.0, &state, &mut residual);
            let residual_norm = l2_norm(&residual);
            if !residual_norm.is_finite() {
                bail!("Residual is not finite at {:?}.", state);
            }
            return Ok(NewtonResult {
                state,
                residual_norm,
                iterations,
            });
        }
    }
}

fn solve_linear_system(dim: usize, jacobian: &[f64], residual: &[f64]) -> Result<Vec<f64>> {
    let j_matrix = DMatrix::from_row_slice(dim, dim, jacobian);
    let rhs = DVector::from_column_slice(residual);
    let delta = j_matrix
        .lu()
        .solve(&rhs)
        .ok_or_else(|| anyhow!("Jacobian is singular."))?;
    if delta.iter().any(|v| !v.is_finite()) {
        bail!("Jacobian is singular.");
    }
    Ok(delta.iter().copied().collect())
}

pub(crate) fn l2_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Scalar;
    use approx::assert_abs_diff_eq;

    /// f(x) = x^2 - c in one dimension.
    struct SquareRoot(f64);

    impl<T: Scalar> DynamicalSystem<T> for SquareRoot {
        fn dimension(&self) -> usize {
            1
        }
        fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
            out[0] = x[0] * x[0] - T::constant(self.0);
        }
    }

    /// Intersection of the unit circle with the line y = x.
    struct CircleLine;

    impl<T: Scalar> DynamicalSystem<T> for CircleLine {
        fn dimension(&self) -> usize {
            2
        }
        fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
            out[0] = x[0] * x[0] + x[1] * x[1] - T::one();
            out[1] = x[1] - x[0];
        }
    }

    #[test]
    fn converges_to_simple_root() {
        let result = solve(&SquareRoot(2.0), &[1.0], NewtonSettings::default()).unwrap();
        assert_abs_diff_eq!(result.state[0], 2f64.sqrt(), epsilon = 1e-14);
        assert!(result.iterations < 10);
    }

    #[test]
    fn drives_double_root_to_machine_precision() {
        let result = solve(&SquareRoot(0.0), &[3.0], NewtonSettings::default()).unwrap();
        assert!(result.state[0].abs() < 1e-10);
        assert!(result.residual_norm < 1e-20);
    }

    #[test]
    fn solves_planar_system() {
        let result = solve(&CircleLine, &[2.0, 0.5], NewtonSettings::default()).unwrap();
        let h = 0.5f64.sqrt();
        assert_abs_diff_eq!(result.state[0], h, epsilon = 1e-12);
        assert_abs_diff_eq!(result.state[1], h, epsilon = 1e-12);
    }

    #[test]
    fn singular_jacobian_is_an_error() {
        // f'(0) = 0 for x^2 + 1 at the seed.
        let err = solve(&SquareRoot(-1.0), &[0.0], NewtonSettings::default()).unwrap_err();
        assert!(format!("{err:#}").contains("singular"));
    }

    #[test]
    fn no_real_root_hits_the_step_cap() {
        let settings = NewtonSettings {
            max_steps: 20,
            ..NewtonSettings::default()
        };
        assert!(solve(&SquareRoot(-1.0), &[0.3], settings).is_err());
    }

    #[test]
    fn rejects_bad_input() {
        assert!(solve(&SquareRoot(1.0), &[1.0, 2.0], NewtonSettings::default()).is_err());
        let settings = NewtonSettings {
            damping: 0.0,
            ..NewtonSettings::default()
        };
        assert!(solve(&SquareRoot(1.0), &[1.0], settings).is_err());
    }
}

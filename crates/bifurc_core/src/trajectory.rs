//! Fixed-step trajectories of scalar and planar flows.

use crate::solvers::RK4;
use crate::traits::{DynamicalSystem, Steppable};
use anyhow::{bail, Result};
use log::debug;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<Vec<f64>>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn last_state(&self) -> Option<&[f64]> {
        self.states.last().map(Vec::as_slice)
    }
}

/// Integrates `system` with RK4 from `t_span.0` to `t_span.1`, recording
/// `samples` evenly spaced states including both ends.
///
/// Integration stops at the first non-finite state; the trajectory then ends
/// at the last finite one. `t_span.1 < t_span.0` integrates backwards.
pub fn integrate<S: DynamicalSystem<f64>>(
    system: &S,
    initial_state: &[f64],
    t_span: (f64, f64),
    samples: usize,
) -> Result<Trajectory> {
    let (t0, t1) = t_span;
    let dim = system.dimension();
    if initial_state.len() != dim {
        bail!(
            "initial state has {} components, system has dimension {}.",
            initial_state.len(),
            dim
        );
    }
    if !(t0.is_finite() && t1.is_finite()) || t0 == t1 {
        bail!("time span must be finite and non-empty, got ({t0}, {t1}).");
    }
    if samples < 2 {
        bail!("at least two samples are required, got {samples}.");
    }
    if initial_state.iter().any(|v| !v.is_finite()) {
        bail!("initial state must be finite, got {initial_state:?}.");
    }

    let dt = (t1 - t0) / (samples - 1) as f64;
    let mut solver = RK4::<f64>::new(dim);
    let mut t = t0;
    let mut state = initial_state.to_vec();
    let mut trajectory = Trajectory {
        times: Vec::with_capacity(samples),
        states: Vec::with_capacity(samples),
    };
    trajectory.times.push(t);
    trajectory.states.push(state.clone());

    for i in 1..samples {
        solver.step(system, &mut t, &mut state, dt);
        if state.iter().any(|v| !v.is_finite()) {
            debug!("trajectory left the finite domain near t = {t}; stopping after {i} samples");
            break;
        }
        // Pin the grid so rounding does not accumulate in the time stamps.
        t = t0 + dt * i as f64;
        trajectory.times.push(t);
        trajectory.states.push(state.clone());
    }
    Ok(trajectory)
}

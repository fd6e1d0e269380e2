//! Predator-prey dynamics `dx/dt = αx − βxy`, `dy/dt = γxy − δy`.

use crate::classification::JacobianResult;
use crate::error::ParseError;
use crate::planar::PlanarSystem;
use crate::traits::{DynamicalSystem, Scalar};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LotkaVolterraParams {
    /// Prey growth rate.
    pub alpha: f64,
    /// Predation rate.
    pub beta: f64,
    /// Predator growth per prey eaten.
    pub gamma: f64,
    /// Predator death rate.
    pub delta: f64,
}

impl Default for LotkaVolterraParams {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.1,
            gamma: 0.1,
            delta: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LotkaVolterra {
    params: LotkaVolterraParams,
}

impl LotkaVolterra {
    pub fn new(params: LotkaVolterraParams) -> Result<Self> {
        let LotkaVolterraParams {
            alpha,
            beta,
            gamma,
            delta,
        } = params;
        for (name, value) in [("alpha", alpha), ("beta", beta), ("gamma", gamma), ("delta", delta)] {
            if !(value.is_finite() && value > 0.0) {
                bail!("{name} must be positive and finite, got {value}.");
            }
        }
        Ok(Self { params })
    }

    pub fn params(&self) -> &LotkaVolterraParams {
        &self.params
    }

    /// Extinction of both species.
    pub fn trivial_equilibrium(&self) -> [f64; 2] {
        [0.0, 0.0]
    }

    /// Coexistence point `(δ/γ, α/β)`.
    pub fn interior_equilibrium(&self) -> [f64; 2] {
        let p = &self.params;
        [p.delta / p.gamma, p.alpha / p.beta]
    }

    pub fn jacobian(&self, point: [f64; 2]) -> [[f64; 2]; 2] {
        let p = &self.params;
        let [x, y] = point;
        [
            [p.alpha - p.beta * y, -p.beta * x],
            [p.gamma * y, p.gamma * x - p.delta],
        ]
    }

    /// Linear stability at `point`.
    pub fn analyze(&self, point: [f64; 2]) -> JacobianResult {
        JacobianResult::new(self.jacobian(point))
    }

    /// Period of small oscillations around the interior equilibrium.
    pub fn approximate_period(&self) -> f64 {
        TAU / (self.params.alpha * self.params.delta).sqrt()
    }

    /// The same field as a custom planar system.
    pub fn to_planar(&self) -> Result<PlanarSystem, ParseError> {
        let p = &self.params;
        PlanarSystem::custom_with_parameters(
            "alpha*x - beta*x*y",
            "gamma*x*y - delta*y",
            &[
                ("alpha", p.alpha),
                ("beta", p.beta),
                ("gamma", p.gamma),
                ("delta", p.delta),
            ],
        )
    }
}

impl<T: Scalar> DynamicalSystem<T> for LotkaVolterra {
    fn dimension(&self) -> usize {
        2
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let p = &self.params;
        let (alpha, beta) = (T::constant(p.alpha), T::constant(p.beta));
        let (gamma, delta) = (T::constant(p.gamma), T::constant(p.delta));
        out[0] = alpha * x[0] - beta * x[0] * x[1];
        out[1] = gamma * x[0] * x[1] - delta * x[1];
    }
}

//! Logistic infection model `dP/dt = K·P·(N − P)`.

use crate::error::ParseError;
use crate::scalar::{ScalarEquilibrium, ScalarSystem};
use crate::traits::{DynamicalSystem, Scalar};
use crate::trajectory::{integrate, Trajectory};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfectionModel {
    /// Infection constant `K`.
    rate: f64,
    /// Total population `N`.
    population: f64,
    /// Infected at `t = 0`.
    initial: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InfectionStatistics {
    pub initial: f64,
    pub population: f64,
    pub rate: f64,
    pub inflection_time: f64,
    pub inflection_population: f64,
    pub t50: f64,
    pub t90: f64,
    pub t99: f64,
    /// Largest infection rate reached for `t >= 0`.
    pub peak_rate: f64,
}

impl InfectionModel {
    pub fn new(rate: f64, population: f64, initial: f64) -> Result<Self> {
        if !(rate.is_finite() && rate > 0.0) {
            bail!("infection constant K must be positive, got {rate}.");
        }
        if !(population.is_finite() && population > 0.0) {
            bail!("population N must be positive, got {population}.");
        }
        if !(initial.is_finite() && (0.0..=population).contains(&initial)) {
            bail!("initial infected P0 must lie in [0, {population}], got {initial}.");
        }
        Ok(Self {
            rate,
            population,
            initial,
        })
    }

    pub fn rate(&self) -> f64 {
        self.rate
    }

    pub fn population(&self) -> f64 {
        self.population
    }

    pub fn initial(&self) -> f64 {
        self.initial
    }

    pub fn rate_of_change(&self, p: f64) -> f64 {
        self.rate * p * (self.population - p)
    }

    /// Closed-form `P(t) = N / (1 + ((N − P0)/P0)·e^(−KNt))`.
    pub fn population_at(&self, t: f64) -> f64 {
        if self.initial == 0.0 {
            return 0.0;
        }
        let a = (self.population - self.initial) / self.initial;
        self.population / (1.0 + a * (-self.rate * self.population * t).exp())
    }

    /// Time until `percentage` percent of the population is infected.
    ///
    /// Zero if already reached, `+∞` for 100% or when nobody is infected.
    pub fn time_to_percentage(&self, percentage: f64) -> Result<f64> {
        if !(percentage > 0.0 && percentage <= 100.0) {
            bail!("percentage must lie in (0, 100], got {percentage}.");
        }
        let target = self.population * percentage / 100.0;
        if self.initial >= target {
            return Ok(0.0);
        }
        if target >= self.population || self.initial == 0.0 {
            return Ok(f64::INFINITY);
        }
        let n = self.population;
        let ratio = (target / self.initial) * ((n - self.initial) / (n - target));
        Ok(ratio.ln() / (self.rate * n))
    }

    /// `(t, P)` where the infection rate peaks. Already past `N/2` means
    /// the peak is at `t = 0`.
    pub fn inflection_point(&self) -> Result<(f64, f64)> {
        let half = self.population / 2.0;
        if self.initial >= half {
            return Ok((0.0, self.initial));
        }
        Ok((self.time_to_percentage(50.0)?, half))
    }

    pub fn statistics(&self) -> Result<InfectionStatistics> {
        let (inflection_time, inflection_population) = self.inflection_point()?;
        Ok(InfectionStatistics {
            initial: self.initial,
            population: self.population,
            rate: self.rate,
            inflection_time,
            inflection_population,
            t50: self.time_to_percentage(50.0)?,
            t90: self.time_to_percentage(90.0)?,
            t99: self.time_to_percentage(99.0)?,
            peak_rate: self.rate_of_change(inflection_population),
        })
    }

    /// The model as `K*x*(N - x)` with `K` as the parameter.
    pub fn to_scalar(&self) -> Result<ScalarSystem, ParseError> {
        ScalarSystem::with_parameter(&format!("K*x*({} - x)", self.population), "K")
    }

    /// `P = 0` and `P = N`, classified by the sign of `f'`.
    pub fn equilibria(&self) -> Result<Vec<ScalarEquilibrium>> {
        let system = self.to_scalar()?;
        Ok([0.0, self.population]
            .into_iter()
            .map(|position| ScalarEquilibrium {
                position,
                param_value: self.rate,
                stability: system.classify(position, self.rate),
                multiplicity: system.multiplicity(position, self.rate),
            })
            .collect())
    }

    /// Numerical solution on `[0, t_max]`.
    pub fn simulate(&self, t_max: f64, samples: usize) -> Result<Trajectory> {
        if !(t_max.is_finite() && t_max > 0.0) {
            bail!("t_max must be positive, got {t_max}.");
        }
        integrate(self, &[self.initial], (0.0, t_max), samples)
    }
}

impl<T: Scalar> DynamicalSystem<T> for InfectionModel {
    fn dimension(&self) -> usize {
        1
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        out[0] = T::constant(self.rate) * x[0] * (T::constant(self.population) - x[0]);
    }
}

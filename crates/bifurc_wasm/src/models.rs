//! Lotka-Volterra and infection model summaries.

use crate::{js_error, to_js};
use anyhow::Result;
use bifurc_core::classification::JacobianResult;
use bifurc_core::models::{InfectionModel, InfectionStatistics, LotkaVolterra, LotkaVolterraParams};
use bifurc_core::scalar::ScalarEquilibrium;
use bifurc_core::trajectory::Trajectory;
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[derive(Debug, Serialize)]
struct LotkaVolterraReport {
    params: LotkaVolterraParams,
    trivial: [f64; 2],
    interior: [f64; 2],
    trivial_jacobian: JacobianResult,
    interior_jacobian: JacobianResult,
    approximate_period: f64,
    trajectory: Trajectory,
}

#[derive(Debug, Serialize)]
struct InfectionReport {
    statistics: InfectionStatistics,
    equilibria: Vec<ScalarEquilibrium>,
    trajectory: Trajectory,
}

fn lotka_volterra(params: LotkaVolterraParams, start: [f64; 2], t_max: f64, samples: u32) -> Result<LotkaVolterraReport> {
    let model = LotkaVolterra::new(params)?;
    let trajectory = bifurc_core::trajectory::integrate(&model, &start, (0.0, t_max), samples as usize)?;
    Ok(LotkaVolterraReport {
        params,
        trivial: model.trivial_equilibrium(),
        interior: model.interior_equilibrium(),
        trivial_jacobian: model.analyze(model.trivial_equilibrium()),
        interior_jacobian: model.analyze(model.interior_equilibrium()),
        approximate_period: model.approximate_period(),
        trajectory,
    })
}

fn infection(rate: f64, population: f64, initial: f64, t_max: f64, samples: u32) -> Result<InfectionReport> {
    let model = InfectionModel::new(rate, population, initial)?;
    Ok(InfectionReport {
        statistics: model.statistics()?,
        equilibria: model.equilibria()?,
        trajectory: model.simulate(t_max, samples as usize)?,
    })
}

/// Equilibria, their linearizations and one orbit from `(x0, y0)`.
#[allow(clippy::too_many_arguments)]
#[wasm_bindgen]
pub fn lotka_volterra_report(
    alpha: f64,
    beta: f64,
    gamma: f64,
    delta: f64,
    x0: f64,
    y0: f64,
    t_max: f64,
    samples: u32,
) -> Result<JsValue, JsValue> {
    let params = LotkaVolterraParams {
        alpha,
        beta,
        gamma,
        delta,
    };
    let report = lotka_volterra(params, [x0, y0], t_max, samples)
        .map_err(|e| js_error("Lotka-Volterra analysis failed", e))?;
    to_js(&report)
}

#[wasm_bindgen]
pub fn infection_report(
    rate: f64,
    population: f64,
    initial: f64,
    t_max: f64,
    samples: u32,
) -> Result<JsValue, JsValue> {
    let report = infection(rate, population, initial, t_max, samples)
        .map_err(|e| js_error("Infection model failed", e))?;
    to_js(&report)
}

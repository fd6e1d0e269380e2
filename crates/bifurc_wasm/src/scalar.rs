//! Scalar systems `dx/dt = f(x, r)`: equilibria, phase lines and
//! bifurcation diagrams.

use crate::{js_error, to_js};
use anyhow::{bail, Result};
use bifurc_core::continuation::{
    bifurcation_diagram, sweep, BifurcationDataset, BifurcationDiagram, BranchMatching,
    SweepSettings,
};
use bifurc_core::scalar::{FlowDirection, ScalarEquilibrium, ScalarSearchSettings, ScalarSystem};
use bifurc_core::trajectory::{integrate, Trajectory};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmScalarSystem {
    system: ScalarSystem,
}

pub(crate) fn parse_matching(name: &str) -> Result<BranchMatching> {
    match name {
        "rank" => Ok(BranchMatching::Rank),
        "nearest" | "nearest_neighbor" => Ok(BranchMatching::NearestNeighbor),
        other => bail!("Unknown branch matching '{other}' (expected 'rank' or 'nearest')."),
    }
}

fn search_settings(resolution: u32) -> ScalarSearchSettings {
    ScalarSearchSettings {
        resolution: resolution as usize,
        ..ScalarSearchSettings::default()
    }
}

fn sweep_settings(num_points: u32, resolution: u32) -> SweepSettings {
    SweepSettings {
        num_points: num_points as usize,
        search: search_settings(resolution),
        ..SweepSettings::default()
    }
}

impl WasmScalarSystem {
    fn build(expression: &str, parameter: Option<&str>) -> Result<Self> {
        let system = match parameter.map(str::trim).filter(|p| !p.is_empty()) {
            Some(name) => ScalarSystem::with_parameter(expression, name)?,
            None => ScalarSystem::new(expression)?,
        };
        Ok(Self { system })
    }

    fn equilibria(
        &self,
        r: f64,
        x_min: f64,
        x_max: f64,
        resolution: u32,
    ) -> Result<Vec<ScalarEquilibrium>> {
        self.system
            .analyze_equilibria(r, (x_min, x_max), &search_settings(resolution))
    }

    fn dataset(
        &self,
        range: [f64; 4],
        num_points: u32,
        resolution: u32,
    ) -> Result<BifurcationDataset> {
        let [r_min, r_max, x_min, x_max] = range;
        sweep(
            &self.system,
            (r_min, r_max),
            (x_min, x_max),
            &sweep_settings(num_points, resolution),
        )
    }

    fn diagram(
        &self,
        range: [f64; 4],
        num_points: u32,
        resolution: u32,
        matching: &str,
    ) -> Result<BifurcationDiagram> {
        let [r_min, r_max, x_min, x_max] = range;
        bifurcation_diagram(
            &self.system,
            (r_min, r_max),
            (x_min, x_max),
            &sweep_settings(num_points, resolution),
            parse_matching(matching)?,
        )
    }

    fn orbit(&self, r: f64, x0: f64, t_max: f64, samples: u32) -> Result<Trajectory> {
        integrate(&self.system.at(r), &[x0], (0.0, t_max), samples as usize)
    }
}

#[wasm_bindgen]
impl WasmScalarSystem {
    /// `parameter` may be empty for a system without one.
    #[wasm_bindgen(constructor)]
    pub fn new(expression: &str, parameter: Option<String>) -> Result<WasmScalarSystem, JsValue> {
        console_error_panic_hook::set_once();
        Self::build(expression, parameter.as_deref())
            .map_err(|e| js_error("Invalid expression", e))
    }

    pub fn expression(&self) -> String {
        self.system.expression().to_string()
    }

    pub fn derivative(&self) -> String {
        self.system.derivative().to_string()
    }

    pub fn value(&self, x: f64, r: f64) -> f64 {
        self.system.value(x, r)
    }

    pub fn stability(&self, x: f64, r: f64) -> String {
        self.system.classify(x, r).label().to_string()
    }

    /// `1`, `-1` or `0` for the phase-line arrow at `x`.
    pub fn flow_direction(&self, x: f64, r: f64) -> i32 {
        match self.system.flow_direction(x, r) {
            FlowDirection::Increasing => 1,
            FlowDirection::Decreasing => -1,
            FlowDirection::Stationary => 0,
        }
    }

    pub fn find_equilibria(
        &self,
        r: f64,
        x_min: f64,
        x_max: f64,
        resolution: u32,
    ) -> Result<JsValue, JsValue> {
        let equilibria = self
            .equilibria(r, x_min, x_max, resolution)
            .map_err(|e| js_error("Equilibrium search failed", e))?;
        to_js(&equilibria)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn sweep(
        &self,
        r_min: f64,
        r_max: f64,
        x_min: f64,
        x_max: f64,
        num_points: u32,
        resolution: u32,
    ) -> Result<JsValue, JsValue> {
        let dataset = self
            .dataset([r_min, r_max, x_min, x_max], num_points, resolution)
            .map_err(|e| js_error("Sweep failed", e))?;
        to_js(&dataset)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn bifurcation_diagram(
        &self,
        r_min: f64,
        r_max: f64,
        x_min: f64,
        x_max: f64,
        num_points: u32,
        resolution: u32,
        matching: &str,
    ) -> Result<JsValue, JsValue> {
        let diagram = self
            .diagram([r_min, r_max, x_min, x_max], num_points, resolution, matching)
            .map_err(|e| js_error("Bifurcation diagram failed", e))?;
        to_js(&diagram)
    }

    pub fn trajectory(&self, r: f64, x0: f64, t_max: f64, samples: u32) -> Result<JsValue, JsValue> {
        let trajectory = self
            .orbit(r, x0, t_max, samples)
            .map_err(|e| js_error("Integration failed", e))?;
        to_js(&trajectory)
    }
}


#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::WasmScalarSystem;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn constructor_reports_parse_errors_as_strings() {
        let result = WasmScalarSystem::new("r +", Some("r".to_string()));
        let message = result
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.starts_with("Invalid expression"));
    }

    #[wasm_bindgen_test]
    fn sweep_returns_a_js_object() {
        let system = WasmScalarSystem::new("r + x^2", Some("r".to_string())).expect("system");
        let value = system.sweep(-2.0, 2.0, -3.0, 3.0, 21, 50).expect("sweep");
        assert!(value.is_object());
    }
}

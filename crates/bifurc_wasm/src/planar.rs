//! Planar systems: linear, forced linear and custom nonlinear fields.

use crate::{js_error, to_js};
use anyhow::{bail, Result};
use bifurc_core::classification::{classify, JacobianResult};
use bifurc_core::planar::{
    FieldProperties, Forcing, ForcingKind, NonFinitePolicy, PlanarEquilibrium,
    PlanarSearchSettings, PlanarSystem,
};
use bifurc_core::trajectory::{integrate, Trajectory};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmPlanarSystem {
    system: PlanarSystem,
    settings: PlanarSearchSettings,
}

/// Classification of a matrix in the shape the front-end draws.
#[derive(Debug, Serialize)]
struct MatrixReport {
    label: &'static str,
    description: &'static str,
    jacobian: JacobianResult,
}

fn parse_forcing_kind(name: &str) -> Result<ForcingKind> {
    match name {
        "constant" => Ok(ForcingKind::Constant),
        "exponential" => Ok(ForcingKind::Exponential),
        "sine" | "sin" => Ok(ForcingKind::Sine),
        "cosine" | "cos" => Ok(ForcingKind::Cosine),
        other => bail!(
            "Unknown forcing '{other}' (expected constant, exponential, sine or cosine)."
        ),
    }
}

fn matrix(a: f64, b: f64, c: f64, d: f64) -> Result<[[f64; 2]; 2]> {
    if ![a, b, c, d].iter().all(|v| v.is_finite()) {
        bail!("Matrix entries must be finite.");
    }
    Ok([[a, b], [c, d]])
}

impl WasmPlanarSystem {
    fn from_system(system: PlanarSystem) -> Self {
        Self {
            system,
            settings: PlanarSearchSettings::default(),
        }
    }

    fn build_custom(f1: &str, f2: &str, param_names: &[String], param_values: &[f64]) -> Result<Self> {
        if param_names.len() != param_values.len() {
            bail!(
                "Got {} parameter names but {} values.",
                param_names.len(),
                param_values.len()
            );
        }
        let params: Vec<(&str, f64)> = param_names
            .iter()
            .map(String::as_str)
            .zip(param_values.iter().copied())
            .collect();
        Ok(Self::from_system(PlanarSystem::custom_with_parameters(f1, f2, &params)?))
    }

    fn build_forced(entries: [f64; 4], kind: &str, c1: f64, c2: f64, rate: f64) -> Result<Self> {
        let [a, b, c, d] = entries;
        let forcing = Forcing {
            kind: parse_forcing_kind(kind)?,
            c1,
            c2,
            param: rate,
        };
        Ok(Self::from_system(PlanarSystem::forced(matrix(a, b, c, d)?, forcing)))
    }

    fn search_box(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> ((f64, f64), (f64, f64)) {
        ((x_min, x_max), (y_min, y_max))
    }

    fn equilibria(&self, search_box: ((f64, f64), (f64, f64))) -> Result<Vec<PlanarEquilibrium>> {
        self.system.analyze_equilibria(search_box, &self.settings)
    }

    fn properties(&self, window: ((f64, f64), (f64, f64)), samples: u32) -> Result<FieldProperties> {
        self.system
            .field_properties(window, samples as usize, self.settings.tolerance)
    }

    fn orbit(&self, start: [f64; 2], t_max: f64, samples: u32) -> Result<Trajectory> {
        integrate(&self.system, &start, (0.0, t_max), samples as usize)
    }
}

#[wasm_bindgen]
impl WasmPlanarSystem {
    /// Homogeneous linear system with matrix `[[a, b], [c, d]]`.
    pub fn linear(a: f64, b: f64, c: f64, d: f64) -> Result<WasmPlanarSystem, JsValue> {
        console_error_panic_hook::set_once();
        let m = matrix(a, b, c, d).map_err(|e| js_error("Invalid matrix", e))?;
        Ok(Self::from_system(PlanarSystem::linear(m)))
    }

    /// Linear system plus `(c1, c2) · g(rate · t)`.
    #[allow(clippy::too_many_arguments)]
    pub fn forced(
        a: f64,
        b: f64,
        c: f64,
        d: f64,
        kind: &str,
        c1: f64,
        c2: f64,
        rate: f64,
    ) -> Result<WasmPlanarSystem, JsValue> {
        console_error_panic_hook::set_once();
        Self::build_forced([a, b, c, d], kind, c1, c2, rate)
            .map_err(|e| js_error("Invalid forced system", e))
    }

    /// Custom field over `x`, `y` (or `x1`, `x2`), `t` and named parameters.
    pub fn custom(
        f1: &str,
        f2: &str,
        param_names: Vec<String>,
        param_values: Vec<f64>,
    ) -> Result<WasmPlanarSystem, JsValue> {
        console_error_panic_hook::set_once();
        Self::build_custom(f1, f2, &param_names, &param_values)
            .map_err(|e| js_error("Invalid vector field", e))
    }

    /// Replace non-finite field values with zero (with a logged warning)
    /// instead of failing.
    pub fn set_substitute_zero(&mut self, enabled: bool) {
        self.settings.non_finite = if enabled {
            NonFinitePolicy::SubstituteZero
        } else {
            NonFinitePolicy::Reject
        };
    }

    pub fn set_tolerance(&mut self, tolerance: f64) -> Result<(), JsValue> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return Err(JsValue::from_str("Tolerance must be positive."));
        }
        self.settings.tolerance = tolerance;
        Ok(())
    }

    pub fn find_equilibria(
        &self,
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
    ) -> Result<JsValue, JsValue> {
        let equilibria = self
            .equilibria(Self::search_box(x_min, x_max, y_min, y_max))
            .map_err(|e| js_error("Equilibrium search failed", e))?;
        to_js(&equilibria)
    }

    pub fn jacobian_at(&self, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let jacobian = self
            .system
            .jacobian_at([x, y], self.settings.non_finite)
            .map_err(|e| js_error("Jacobian evaluation failed", e))?;
        to_js(&jacobian)
    }

    /// Field value at `(x, y)` and `t = 0`.
    pub fn evaluate(&self, x: f64, y: f64) -> Result<Vec<f64>, JsValue> {
        self.system
            .evaluate([x, y], 0.0, self.settings.non_finite)
            .map(|v| v.to_vec())
            .map_err(|e| js_error("Evaluation failed", e))
    }

    pub fn divergence_at(&self, x: f64, y: f64) -> f64 {
        self.system.divergence_at(x, y)
    }

    /// Hamiltonian, gradient and reversibility checks on a
    /// `samples × samples` grid, using the search tolerance.
    pub fn field_properties(
        &self,
        x_min: f64,
        x_max: f64,
        y_min: f64,
        y_max: f64,
        samples: u32,
    ) -> Result<JsValue, JsValue> {
        let properties = self
            .properties(Self::search_box(x_min, x_max, y_min, y_max), samples)
            .map_err(|e| js_error("Field analysis failed", e))?;
        to_js(&properties)
    }

    pub fn trajectory(&self, x0: f64, y0: f64, t_max: f64, samples: u32) -> Result<JsValue, JsValue> {
        let trajectory = self
            .orbit([x0, y0], t_max, samples)
            .map_err(|e| js_error("Integration failed", e))?;
        to_js(&trajectory)
    }
}

fn matrix_report(m: [[f64; 2]; 2]) -> MatrixReport {
    let classification = classify(m);
    MatrixReport {
        label: classification.label(),
        description: classification.description(),
        jacobian: JacobianResult::new(m),
    }
}

/// Eigen-decomposition and topological type of `[[a, b], [c, d]]`.
#[wasm_bindgen]
pub fn classify_matrix(a: f64, b: f64, c: f64, d: f64) -> Result<JsValue, JsValue> {
    let m = matrix(a, b, c, d).map_err(|e| js_error("Invalid matrix", e))?;
    to_js(&matrix_report(m))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bifurc_core::classification::TopologyType;

    #[test]
    fn pendulum_through_the_bridge() {
        let system =
            WasmPlanarSystem::build_custom("y", "-sin(x)", &[], &[]).expect("pendulum");
        let equilibria = system
            .equilibria(WasmPlanarSystem::search_box(-4.0, 4.0, -2.0, 2.0))
            .expect("equilibria");
        assert_eq!(equilibria.len(), 3);
        let origin = equilibria
            .iter()
            .find(|eq| eq.position[0].abs() < 1e-9)
            .expect("origin");
        assert_eq!(origin.classification.topology, TopologyType::Center);
        let saddles = equilibria
            .iter()
            .filter(|eq| eq.classification.topology == TopologyType::Saddle)
            .count();
        assert_eq!(saddles, 2);
    }

    #[test]
    fn custom_parameters_must_pair_up() {
        let names = vec!["mu".to_string()];
        assert!(WasmPlanarSystem::build_custom("y", "mu*(1-x^2)*y - x", &names, &[]).is_err());
        let system =
            WasmPlanarSystem::build_custom("y", "mu*(1-x^2)*y - x", &names, &[1.0]).expect("vdp");
        assert_eq!(system.divergence_at(0.0, 0.0), 1.0);
    }

    #[test]
    fn field_properties_through_the_bridge() {
        let mut system = WasmPlanarSystem::build_custom("y", "-sin(x)", &[], &[]).expect("pendulum");
        system.settings.tolerance = 1e-9;
        let window = WasmPlanarSystem::search_box(-3.0, 3.0, -2.0, 2.0);
        let properties = system.properties(window, 9).expect("properties");
        assert!(properties.hamiltonian && properties.reversible && !properties.gradient);
        assert!(system.properties(window, 1).is_err());
    }

    #[test]
    fn forced_system_parses_its_kind() {
        assert!(WasmPlanarSystem::build_forced([0.0, 1.0, -1.0, 0.0], "sine", 1.0, 0.0, 2.0).is_ok());
        let err = WasmPlanarSystem::build_forced([0.0, 1.0, -1.0, 0.0], "square", 1.0, 0.0, 2.0)
            .err()
            .expect("error");
        assert!(err.to_string().contains("square"));
    }

    #[test]
    fn forced_constant_shifts_the_equilibrium() {
        // x' = -x + 1, y' = -y + 2.
        let system =
            WasmPlanarSystem::build_forced([-1.0, 0.0, 0.0, -1.0], "constant", 1.0, 2.0, 0.0)
                .expect("forced");
        let equilibria = system
            .equilibria(WasmPlanarSystem::search_box(-5.0, 5.0, -5.0, 5.0))
            .expect("equilibria");
        assert_eq!(equilibria.len(), 1);
        assert!((equilibria[0].position[0] - 1.0).abs() < 1e-9);
        assert!((equilibria[0].position[1] - 2.0).abs() < 1e-9);
    }

    #[test]
    fn matrix_report_labels() {
        assert_eq!(matrix_report([[1.0, 0.0], [0.0, -1.0]]).label, "Saddle");
        assert_eq!(matrix_report([[0.0, 1.0], [-1.0, 0.0]]).label, "Center");
        assert!(matrix(f64::NAN, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn circle_orbit_through_the_bridge() {
        let m = matrix(0.0, 1.0, -1.0, 0.0).expect("matrix");
        let system = WasmPlanarSystem::from_system(PlanarSystem::linear(m));
        let orbit = system.orbit([1.0, 0.0], 1.0, 11).expect("orbit");
        assert_eq!(orbit.len(), 11);
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn custom_field_errors_become_strings() {
        let result = WasmPlanarSystem::custom("y", "-sin(", Vec::new(), Vec::new());
        let message = result
            .err()
            .and_then(|err| err.as_string())
            .unwrap_or_default();
        assert!(message.starts_with("Invalid vector field"));
    }

    #[wasm_bindgen_test]
    fn log_field_is_rejected_unless_substitution_is_enabled() {
        let mut system =
            WasmPlanarSystem::custom("log(x)", "y", Vec::new(), Vec::new()).expect("system");
        assert!(system.evaluate(-1.0, 0.0).is_err());
        system.set_substitute_zero(true);
        assert_eq!(system.evaluate(-1.0, 0.0).expect("value"), vec![0.0, 0.0]);
    }

    #[wasm_bindgen_test]
    fn classify_matrix_returns_an_object() {
        assert!(classify_matrix(-1.0, 0.0, 0.0, -2.0).expect("report").is_object());
    }
}

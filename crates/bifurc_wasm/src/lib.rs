//! Browser bridge for `bifurc_core`.
//!
//! Every entry point takes plain strings and numbers, turns any failure into
//! a readable `JsValue` string and returns results through
//! `serde-wasm-bindgen`.

use serde::Serialize;
use serde_wasm_bindgen::to_value;
use std::fmt::Display;
use wasm_bindgen::prelude::*;

mod catalog;
mod models;
mod planar;
mod scalar;

pub use catalog::{
    bifurcation_examples, example_keys, find_example, linear_examples, nonlinear_examples,
};
pub use models::{infection_report, lotka_volterra_report};
pub use planar::{classify_matrix, WasmPlanarSystem};
pub use scalar::WasmScalarSystem;

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// `"{context}: {err}"`, with the full cause chain for `anyhow` errors.
pub(crate) fn error_message(context: &str, err: impl Display) -> String {
    format!("{context}: {err:#}")
}

pub(crate) fn js_error(context: &str, err: impl Display) -> JsValue {
    JsValue::from_str(&error_message(context, err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn error_messages_keep_the_cause_chain() {
        let err = Err::<(), _>(anyhow!("Jacobian is singular."))
            .context("seed (0, 0)")
            .unwrap_err();
        assert_eq!(
            error_message("Equilibrium search failed", err),
            "Equilibrium search failed: seed (0, 0): Jacobian is singular."
        );
    }

    #[test]
    fn bridge_reexports_are_wired() {
        assert!(std::any::type_name::<WasmScalarSystem>().ends_with("WasmScalarSystem"));
        assert!(std::any::type_name::<WasmPlanarSystem>().ends_with("WasmPlanarSystem"));
    }
}

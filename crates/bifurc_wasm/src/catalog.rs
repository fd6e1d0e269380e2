//! Read-only access to the example catalog.

use crate::to_js;
use bifurc_core::catalog::{
    bifurcation_example, linear_example, nonlinear_example, BIFURCATION_EXAMPLES, LINEAR_EXAMPLES,
    NONLINEAR_EXAMPLES,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub fn bifurcation_examples() -> Result<JsValue, JsValue> {
    to_js(BIFURCATION_EXAMPLES)
}

#[wasm_bindgen]
pub fn linear_examples() -> Result<JsValue, JsValue> {
    to_js(LINEAR_EXAMPLES)
}

#[wasm_bindgen]
pub fn nonlinear_examples() -> Result<JsValue, JsValue> {
    to_js(NONLINEAR_EXAMPLES)
}

#[derive(Debug, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
enum Example {
    Bifurcation(&'static bifurc_core::catalog::BifurcationExample),
    Linear(&'static bifurc_core::catalog::LinearExample),
    Nonlinear(&'static bifurc_core::catalog::NonlinearExample),
}

fn lookup(family: &str, key: &str) -> Option<Example> {
    match family {
        "bifurcation" => bifurcation_example(key).map(Example::Bifurcation),
        "linear" => linear_example(key).map(Example::Linear),
        "nonlinear" => nonlinear_example(key).map(Example::Nonlinear),
        _ => None,
    }
}

fn keys(family: &str) -> Vec<&'static str> {
    match family {
        "bifurcation" => BIFURCATION_EXAMPLES.iter().map(|e| e.key).collect(),
        "linear" => LINEAR_EXAMPLES.iter().map(|e| e.key).collect(),
        "nonlinear" => NONLINEAR_EXAMPLES.iter().map(|e| e.key).collect(),
        _ => Vec::new(),
    }
}

/// Keys of one family, in catalog order.
#[wasm_bindgen]
pub fn example_keys(family: &str) -> js_sys::Array {
    keys(family).into_iter().map(JsValue::from_str).collect()
}

/// One example by family (`bifurcation`, `linear`, `nonlinear`) and key;
/// `undefined` when there is no such entry.
#[wasm_bindgen]
pub fn find_example(family: &str, key: &str) -> Result<JsValue, JsValue> {
    match lookup(family, key) {
        Some(example) => to_js(&example),
        None => Ok(JsValue::UNDEFINED),
    }
}

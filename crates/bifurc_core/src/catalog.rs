//! Named example systems: scalar bifurcation families, linear planar
//! matrices and nonlinear planar fields.
//!
//! Pure data. Every entry builds into an ordinary [`ScalarSystem`] or
//! [`PlanarSystem`]; nothing here is special-cased by the solvers.

use crate::error::ParseError;
use crate::planar::PlanarSystem;
use crate::scalar::ScalarSystem;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BifurcationExample {
    pub key: &'static str,
    pub name: &'static str,
    pub expression: &'static str,
    pub parameter: &'static str,
    pub param_range: (f64, f64),
    pub state_range: (f64, f64),
    /// Parameter values worth drawing a phase line for.
    pub param_values: [f64; 3],
    pub description: &'static str,
}

impl BifurcationExample {
    pub fn system(&self) -> Result<ScalarSystem, ParseError> {
        ScalarSystem::with_parameter(self.expression, self.parameter)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearExample {
    pub key: &'static str,
    pub name: &'static str,
    pub matrix: [[f64; 2]; 2],
    pub description: &'static str,
}

impl LinearExample {
    pub fn system(&self) -> PlanarSystem {
        PlanarSystem::linear(self.matrix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NonlinearExample {
    pub key: &'static str,
    pub name: &'static str,
    pub f1: &'static str,
    pub f2: &'static str,
    pub description: &'static str,
}

impl NonlinearExample {
    pub fn system(&self) -> Result<PlanarSystem, ParseError> {
        PlanarSystem::custom(self.f1, self.f2)
    }
}

const FAMILY_PARAM_RANGE: (f64, f64) = (-2.0, 2.0);
const FAMILY_STATE_RANGE: (f64, f64) = (-3.0, 3.0);

pub const BIFURCATION_EXAMPLES: &[BifurcationExample] = &[
    BifurcationExample {
        key: "saddle_node",
        name: "Saddle-node",
        expression: "r + x^2",
        parameter: "r",
        param_range: FAMILY_PARAM_RANGE,
        state_range: FAMILY_STATE_RANGE,
        param_values: [-1.0, 0.0, 1.0],
        description: "Two equilibria collide and annihilate as r crosses 0.",
    },
    BifurcationExample {
        key: "supercritical_pitchfork",
        name: "Supercritical pitchfork",
        expression: "r*x - x^3",
        parameter: "r",
        param_range: FAMILY_PARAM_RANGE,
        state_range: FAMILY_STATE_RANGE,
        param_values: [-1.0, 0.0, 1.0],
        description: "The origin loses stability and two stable equilibria are born.",
    },
    BifurcationExample {
        key: "subcritical_pitchfork",
        name: "Subcritical pitchfork",
        expression: "r*x + x^3",
        parameter: "r",
        param_range: FAMILY_PARAM_RANGE,
        state_range: FAMILY_STATE_RANGE,
        param_values: [-1.0, 0.0, 1.0],
        description: "Two unstable equilibria merge into the origin, which becomes unstable.",
    },
    BifurcationExample {
        key: "transcritical",
        name: "Transcritical",
        expression: "r*x - x^2",
        parameter: "r",
        param_range: FAMILY_PARAM_RANGE,
        state_range: FAMILY_STATE_RANGE,
        param_values: [-1.0, 0.0, 1.0],
        description: "Two equilibria pass through each other and exchange stability.",
    },
    BifurcationExample {
        key: "cubic",
        name: "Cubic with moving root",
        expression: "x*(1-x)*(x-r)",
        parameter: "r",
        param_range: FAMILY_PARAM_RANGE,
        state_range: FAMILY_STATE_RANGE,
        param_values: [0.0, 0.5, 1.0],
        description: "The root x = r meets the fixed roots 0 and 1, giving double roots there.",
    },
];

pub const LINEAR_EXAMPLES: &[LinearExample] = &[
    LinearExample {
        key: "stable_node",
        name: "Stable node",
        matrix: [[-1.0, 0.0], [0.0, -2.0]],
        description: "Both eigenvalues negative.",
    },
    LinearExample {
        key: "unstable_node",
        name: "Unstable node",
        matrix: [[1.0, 0.0], [0.0, 2.0]],
        description: "Both eigenvalues positive.",
    },
    LinearExample {
        key: "saddle",
        name: "Saddle point",
        matrix: [[1.0, 0.0], [0.0, -1.0]],
        description: "Eigenvalues of opposite sign.",
    },
    LinearExample {
        key: "stable_spiral",
        name: "Stable spiral",
        matrix: [[-0.5, 1.0], [-1.0, -0.5]],
        description: "Complex eigenvalues with negative real part.",
    },
    LinearExample {
        key: "unstable_spiral",
        name: "Unstable spiral",
        matrix: [[0.5, 1.0], [-1.0, 0.5]],
        description: "Complex eigenvalues with positive real part.",
    },
    LinearExample {
        key: "center",
        name: "Center",
        matrix: [[0.0, 1.0], [-1.0, 0.0]],
        description: "Purely imaginary eigenvalues.",
    },
    LinearExample {
        key: "degenerate_node",
        name: "Degenerate node",
        matrix: [[-1.0, 1.0], [0.0, -1.0]],
        description: "Repeated eigenvalue with a single eigenvector.",
    },
    LinearExample {
        key: "stable_star",
        name: "Uniform contraction",
        matrix: [[-1.0, 0.0], [0.0, -1.0]],
        description: "Every direction contracts at the same rate.",
    },
    LinearExample {
        key: "unstable_star",
        name: "Uniform expansion",
        matrix: [[2.0, 0.0], [0.0, 2.0]],
        description: "Every direction expands at the same rate.",
    },
    LinearExample {
        key: "harmonic_oscillator",
        name: "Harmonic oscillator",
        matrix: [[0.0, 1.0], [-1.0, 0.0]],
        description: "Frictionless oscillation on circular orbits.",
    },
    LinearExample {
        key: "underdamped_oscillator",
        name: "Underdamped oscillator",
        matrix: [[0.0, 1.0], [-4.0, -2.0]],
        description: "Decaying oscillations.",
    },
    LinearExample {
        key: "overdamped_oscillator",
        name: "Overdamped oscillator",
        matrix: [[0.0, 1.0], [-1.0, -4.0]],
        description: "Returns to rest without oscillating.",
    },
    LinearExample {
        key: "inverted_pendulum",
        name: "Linearized inverted pendulum",
        matrix: [[0.0, 1.0], [1.0, 0.0]],
        description: "Upright equilibrium of a pendulum.",
    },
];

pub const NONLINEAR_EXAMPLES: &[NonlinearExample] = &[
    NonlinearExample {
        key: "pendulum",
        name: "Pendulum",
        f1: "y",
        f2: "-sin(x)",
        description: "Undamped, unforced pendulum.",
    },
    NonlinearExample {
        key: "van_der_pol",
        name: "Van der Pol",
        f1: "y",
        f2: "y*(1-x^2)-x",
        description: "Oscillator with nonlinear damping.",
    },
    NonlinearExample {
        key: "lotka_volterra",
        name: "Lotka-Volterra",
        f1: "x*(1-y)",
        f2: "-y*(1-x)",
        description: "Predator-prey interaction.",
    },
    NonlinearExample {
        key: "duffing",
        name: "Duffing",
        f1: "y",
        f2: "x - x^3",
        description: "Oscillator with nonlinear stiffness.",
    },
];

pub fn bifurcation_example(key: &str) -> Option<&'static BifurcationExample> {
    BIFURCATION_EXAMPLES.iter().find(|e| e.key == key)
}

pub fn linear_example(key: &str) -> Option<&'static LinearExample> {
    LINEAR_EXAMPLES.iter().find(|e| e.key == key)
}

pub fn nonlinear_example(key: &str) -> Option<&'static NonlinearExample> {
    NONLINEAR_EXAMPLES.iter().find(|e| e.key == key)
}

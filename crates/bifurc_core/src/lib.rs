//! The `bifurc_core` crate finds and classifies equilibria of scalar and
//! planar continuous-time systems and traces how they change with a parameter.
//!
//! Key components:
//! - **Expression**: parser, symbolic derivatives and a bytecode VM generic over `Scalar`.
//! - **Scalar / Planar**: multi-start Newton equilibrium finders with stability classification.
//! - **Classification**: eigenvalues and topological type of 2x2 Jacobians.
//! - **Continuation**: parameter sweeps and reconstruction of bifurcation branches.
//! - **Trajectory**: fixed-step RK4 orbits of any `DynamicalSystem`.

pub mod autodiff;
pub mod catalog;
pub mod classification;
pub mod continuation;
pub mod error;
pub mod expression;
pub mod models;
pub mod newton;
pub mod planar;
pub mod scalar;
pub mod solvers;
pub mod traits;
pub mod trajectory;

pub use classification::{Classification, JacobianResult, Stability, TopologyType};
pub use error::{EvaluationError, ParseError};
pub use expression::Expression;
pub use planar::PlanarSystem;
pub use scalar::ScalarSystem;

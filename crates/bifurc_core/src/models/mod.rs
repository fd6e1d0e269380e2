//! Closed-form population models that also plug into the generic solvers.

pub mod infection;
pub mod lotka_volterra;

pub use infection::{InfectionModel, InfectionStatistics};
pub use lotka_volterra::{LotkaVolterra, LotkaVolterraParams};

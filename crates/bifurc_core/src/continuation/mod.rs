//! Parameter sweeps over scalar systems and reconstruction of the branches
//! of a bifurcation diagram.

pub mod branches;
pub mod sweep;
pub mod types;

pub use branches::{bifurcation_diagram, build_branches, build_branches_with};
pub use sweep::sweep;
pub use types::{
    BifurcationDataset, BifurcationDiagram, Branch, BranchMatching, BranchSample, SweepSettings,
};

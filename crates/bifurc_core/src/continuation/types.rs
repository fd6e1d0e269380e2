//! Core types for bifurcation sweeps.
//!
//! A sweep produces a [`BifurcationDataset`]; branch reconstruction turns it
//! into the [`Branch`] curves of a [`BifurcationDiagram`].

use crate::scalar::ScalarSearchSettings;
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// Settings controlling a parameter sweep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepSettings {
    /// Evenly spaced parameter samples, both ends included.
    pub num_points: usize,
    pub search: ScalarSearchSettings,
    /// Analyze samples on the rayon pool. Ignored on wasm32.
    pub parallel: bool,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            num_points: 500,
            search: ScalarSearchSettings::default(),
            parallel: true,
        }
    }
}

impl SweepSettings {
    pub fn validate(&self) -> Result<()> {
        if self.num_points == 0 {
            bail!("num_points must be greater than zero.");
        }
        self.search.validate()
    }
}

/// One equilibrium observed at one parameter sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BranchSample {
    pub param: f64,
    pub position: f64,
}

/// Stable and unstable equilibria of a sweep, in sweep order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BifurcationDataset {
    pub stable: Vec<BranchSample>,
    pub unstable: Vec<BranchSample>,
    /// Equilibria left out of both lists because `f'` vanished (or could not
    /// be evaluated) there.
    pub neutral_dropped: usize,
}

/// How same-parameter samples are chained into branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BranchMatching {
    /// The k-th smallest position at every sample goes to branch k.
    #[default]
    Rank,
    /// Each position continues the closest branch alive at the previous
    /// sample; unmatched positions open new branches.
    NearestNeighbor,
}

/// One continuous curve of a bifurcation diagram.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub params: Vec<f64>,
    pub positions: Vec<f64>,
}

impl Branch {
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub(crate) fn push(&mut self, param: f64, position: f64) {
        self.params.push(param);
        self.positions.push(position);
    }

    pub(crate) fn last_position(&self) -> Option<f64> {
        self.positions.last().copied()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BifurcationDiagram {
    pub stable: Vec<Branch>,
    pub unstable: Vec<Branch>,
}

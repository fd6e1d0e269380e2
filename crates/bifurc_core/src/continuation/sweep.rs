use super::types::{BifurcationDataset, BranchSample, SweepSettings};
use crate::classification::Stability;
use crate::scalar::{linspace, ScalarEquilibrium, ScalarSystem};
use anyhow::{bail, Context, Result};
use log::debug;

/// Samples `param_range` at `settings.num_points` values and splits every
/// equilibrium found in `search_range` into the stable or unstable list.
///
/// Neutral equilibria are counted but kept out of both lists. Samples may
/// have any number of equilibria, including none.
pub fn sweep(
    system: &ScalarSystem,
    param_range: (f64, f64),
    search_range: (f64, f64),
    settings: &SweepSettings,
) -> Result<BifurcationDataset> {
    let (r_min, r_max) = param_range;
    if !(r_min.is_finite() && r_max.is_finite() && r_max > r_min) {
        bail!("parameter range must be finite with max > min, got ({r_min}, {r_max}).");
    }
    settings.validate()?;

    let params = linspace(r_min, r_max, settings.num_points);
    let per_sample = analyze_samples(system, &params, search_range, settings)?;

    let mut dataset = BifurcationDataset::default();
    for equilibria in per_sample {
        for eq in equilibria {
            let sample = BranchSample {
                param: eq.param_value,
                position: eq.position,
            };
            match eq.stability {
                Stability::Stable => dataset.stable.push(sample),
                Stability::Unstable => dataset.unstable.push(sample),
                Stability::Neutral | Stability::Undetermined => dataset.neutral_dropped += 1,
            }
        }
    }

    debug!(
        "sweep over r in [{r_min}, {r_max}]: {} samples, {} stable, {} unstable, {} neutral",
        params.len(),
        dataset.stable.len(),
        dataset.unstable.len(),
        dataset.neutral_dropped
    );
    Ok(dataset)
}

fn analyze_one(
    system: &ScalarSystem,
    r: f64,
    search_range: (f64, f64),
    settings: &SweepSettings,
) -> Result<Vec<ScalarEquilibrium>> {
    system
        .analyze_equilibria(r, search_range, &settings.search)
        .with_context(|| format!("Failed to analyze equilibria at r = {r}."))
}

/// Results come back in the order of `params` either way.
#[cfg(not(target_arch = "wasm32"))]
fn analyze_samples(
    system: &ScalarSystem,
    params: &[f64],
    search_range: (f64, f64),
    settings: &SweepSettings,
) -> Result<Vec<Vec<ScalarEquilibrium>>> {
    use rayon::prelude::*;

    if settings.parallel {
        params
            .par_iter()
            .map(|&r| analyze_one(system, r, search_range, settings))
            .collect()
    } else {
        params
            .iter()
            .map(|&r| analyze_one(system, r, search_range, settings))
            .collect()
    }
}

#[cfg(target_arch = "wasm32")]
fn analyze_samples(
    system: &ScalarSystem,
    params: &[f64],
    search_range: (f64, f64),
    settings: &SweepSettings,
) -> Result<Vec<Vec<ScalarEquilibrium>>> {
    params
        .iter()
        .map(|&r| analyze_one(system, r, search_range, settings))
        .collect()
}

use super::sweep::sweep;
use super::types::{BifurcationDiagram, Branch, BranchMatching, BranchSample, SweepSettings};
use crate::scalar::ScalarSystem;
use anyhow::Result;
use ordered_float::OrderedFloat;
use std::collections::BTreeMap;

/// Groups positions by exact parameter value, both ascending.
fn group_by_param(samples: &[BranchSample]) -> BTreeMap<OrderedFloat<f64>, Vec<f64>> {
    let mut groups: BTreeMap<OrderedFloat<f64>, Vec<f64>> = BTreeMap::new();
    for sample in samples {
        groups
            .entry(OrderedFloat(sample.param))
            .or_default()
            .push(sample.position);
    }
    for positions in groups.values_mut() {
        positions.sort_by(f64::total_cmp);
    }
    groups
}

/// Rank matching: the k-th smallest position at each parameter joins branch k.
///
/// Correct while branches do not cross; at a crossing the two branches
/// silently swap identity.
pub fn build_branches(samples: &[BranchSample]) -> Vec<Branch> {
    let groups = group_by_param(samples);
    let max_branches = groups.values().map(Vec::len).max().unwrap_or(0);
    let mut branches = vec![Branch::default(); max_branches];

    for (param, positions) in &groups {
        for (branch, &position) in branches.iter_mut().zip(positions) {
            branch.push(param.0, position);
        }
    }
    branches.retain(|b| !b.is_empty());
    branches
}

pub fn build_branches_with(samples: &[BranchSample], matching: BranchMatching) -> Vec<Branch> {
    match matching {
        BranchMatching::Rank => build_branches(samples),
        BranchMatching::NearestNeighbor => build_branches_nearest(samples),
    }
}

/// Greedy nearest-neighbor continuation from one parameter sample to the next.
fn build_branches_nearest(samples: &[BranchSample]) -> Vec<Branch> {
    let mut branches: Vec<Branch> = Vec::new();
    // Branches extended at the previous parameter sample.
    let mut alive: Vec<usize> = Vec::new();

    for (param, positions) in group_by_param(samples) {
        let mut pairs: Vec<(f64, usize, usize)> = Vec::with_capacity(alive.len() * positions.len());
        for &b in &alive {
            if let Some(last) = branches[b].last_position() {
                for (p, &position) in positions.iter().enumerate() {
                    pairs.push(((position - last).abs(), b, p));
                }
            }
        }
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut branch_taken = vec![false; branches.len()];
        let mut position_taken = vec![false; positions.len()];
        let mut next_alive = Vec::with_capacity(positions.len());
        for (_, b, p) in pairs {
            if branch_taken[b] || position_taken[p] {
                continue;
            }
            branch_taken[b] = true;
            position_taken[p] = true;
            branches[b].push(param.0, positions[p]);
            next_alive.push(b);
        }
        for (p, &position) in positions.iter().enumerate() {
            if !position_taken[p] {
                let mut branch = Branch::default();
                branch.push(param.0, position);
                next_alive.push(branches.len());
                branches.push(branch);
            }
        }
        alive = next_alive;
    }
    branches
}

/// Sweeps `system` and reconstructs the stable and unstable branches.
pub fn bifurcation_diagram(
    system: &ScalarSystem,
    param_range: (f64, f64),
    search_range: (f64, f64),
    settings: &SweepSettings,
    matching: BranchMatching,
) -> Result<BifurcationDiagram> {
    let dataset = sweep(system, param_range, search_range, settings)?;
    Ok(BifurcationDiagram {
        stable: build_branches_with(&dataset.stable, matching),
        unstable: build_branches_with(&dataset.unstable, matching),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(points: &[(f64, f64)]) -> Vec<BranchSample> {
        points
            .iter()
            .map(|&(param, position)| BranchSample { param, position })
            .collect()
    }

    #[test]
    fn rank_matching_sorts_within_each_sample() {
        // Deliberately shuffled input.
        let data = samples(&[(1.0, 2.0), (0.0, 5.0), (1.0, -2.0), (0.0, -5.0), (2.0, 0.0)]);
        let branches = build_branches(&data);
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].params, vec![0.0, 1.0, 2.0]);
        assert_eq!(branches[0].positions, vec![-5.0, -2.0, 0.0]);
        assert_eq!(branches[1].params, vec![0.0, 1.0]);
        assert_eq!(branches[1].positions, vec![5.0, 2.0]);
    }

    #[test]
    fn empty_input_gives_no_branches() {
        assert!(build_branches(&[]).is_empty());
        assert!(build_branches_with(&[], BranchMatching::NearestNeighbor).is_empty());
    }

    #[test]
    fn rank_matching_jumps_when_a_lower_branch_appears() {
        // A stays at 0; B appears at -1 from p = 2 on.
        let data = samples(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (2.0, -1.0),
            (3.0, 0.0),
            (3.0, -1.0),
        ]);
        let rank = build_branches(&data);
        assert_eq!(rank[0].positions, vec![0.0, 0.0, -1.0, -1.0]);

        let nearest = build_branches_with(&data, BranchMatching::NearestNeighbor);
        assert_eq!(nearest.len(), 2);
        assert_eq!(nearest[0].positions, vec![0.0, 0.0, 0.0, 0.0]);
        assert_eq!(nearest[1].params, vec![2.0, 3.0]);
        assert_eq!(nearest[1].positions, vec![-1.0, -1.0]);
    }

    #[test]
    fn nearest_neighbor_ends_branches_that_vanish() {
        let data = samples(&[(0.0, 1.0), (1.0, 1.1), (3.0, 1.2)]);
        // Every sample has one point, so each continues the single branch.
        let nearest = build_branches_with(&data, BranchMatching::NearestNeighbor);
        assert_eq!(nearest.len(), 1);
        assert_eq!(nearest[0].len(), 3);

        let split = samples(&[(0.0, 1.0), (0.0, 3.0), (1.0, 1.1)]);
        let nearest = build_branches_with(&split, BranchMatching::NearestNeighbor);
        assert_eq!(nearest.len(), 2);
        assert_eq!(nearest[0].positions, vec![1.0, 1.1]);
        assert_eq!(nearest[1].positions, vec![3.0]);
    }

    #[test]
    fn pitchfork_diagram() {
        let system = ScalarSystem::with_parameter("r*x - x^3", "r").unwrap();
        let settings = SweepSettings {
            num_points: 21,
            parallel: false,
            ..SweepSettings::default()
        };
        let diagram =
            bifurcation_diagram(&system, (-1.0, 1.0), (-2.0, 2.0), &settings, BranchMatching::Rank)
                .unwrap();
        // Rank 0 runs along x = 0 then drops to the lower arm; rank 1 is the upper arm.
        assert_eq!(diagram.stable.len(), 2);
        assert_eq!(diagram.stable[0].len(), 20);
        assert_eq!(diagram.stable[1].len(), 10);
        assert!(diagram.stable[1].positions.iter().all(|&x| x > 0.0));
        assert_eq!(diagram.unstable.len(), 1);
        assert!(diagram.unstable[0].params.iter().all(|&r| r > 0.0));

        let nearest = bifurcation_diagram(
            &system,
            (-1.0, 1.0),
            (-2.0, 2.0),
            &settings,
            BranchMatching::NearestNeighbor,
        )
        .unwrap();
        // Equidistant ties go to the lower position, so both matchings agree here.
        assert_eq!(nearest, diagram);
    }
}

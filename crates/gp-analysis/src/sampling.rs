//! Sample generation over a [`ParameterSpace`].
//!
//! Latin hypercube sampling stratifies every dimension into `count` equal
//! slices and places exactly one point per slice, which is what gives the
//! variance-based estimator its even coverage. Morris trajectories move one
//! parameter at a time across a coarse grid for elementary-effects
//! screening.

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use gp_types::ParameterSample;

use crate::space::ParameterSpace;

/// Grid levels for Morris designs.
const MORRIS_LEVELS: usize = 4;

/// Draw `count` Latin hypercube samples. Each dimension gets one point per
/// stratum, shuffled independently.
pub fn latin_hypercube(
    space: &ParameterSpace,
    count: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<ParameterSample> {
    let dims = space.len();
    let mut samples = vec![vec![0.0; dims]; count];

    for (dim, spec) in space.parameters.iter().enumerate() {
        let mut strata: Vec<usize> = (0..count).collect();
        strata.shuffle(rng);
        for (i, &stratum) in strata.iter().enumerate() {
            let u = (stratum as f64 + rng.gen::<f64>()) / count as f64;
            samples[i][dim] = spec.distribution.from_unit(u);
        }
    }

    samples
}

/// Generate `trajectories` Morris trajectories of `d + 1` points each. Every
/// step perturbs exactly one dimension by the canonical grid jump
/// `Δ = p / (2(p − 1))`, staying inside the unit cube.
///
/// The second element of each returned pair records which dimension moved at
/// each step, in order.
pub fn morris_trajectories(
    space: &ParameterSpace,
    trajectories: usize,
    rng: &mut ChaCha8Rng,
) -> Vec<(Vec<ParameterSample>, Vec<usize>)> {
    let dims = space.len();
    let delta = MORRIS_LEVELS as f64 / (2.0 * (MORRIS_LEVELS as f64 - 1.0));

    (0..trajectories)
        .map(|_| {
            // Base point on the grid, low enough that +Δ stays inside [0, 1].
            let mut unit: Vec<f64> = (0..dims)
                .map(|_| {
                    let level = rng.gen_range(0..MORRIS_LEVELS / 2);
                    level as f64 / (MORRIS_LEVELS as f64 - 1.0)
                })
                .collect();

            let mut order: Vec<usize> = (0..dims).collect();
            order.shuffle(rng);

            let mut points = Vec::with_capacity(dims + 1);
            points.push(space.from_unit_point(&unit));
            for &dim in &order {
                unit[dim] = (unit[dim] + delta).min(1.0);
                points.push(space.from_unit_point(&unit));
            }

            (points, order)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn space() -> ParameterSpace {
        ParameterSpace::new()
            .add_uniform("a", 0.0, 1.0)
            .add_uniform("b", 10.0, 20.0)
    }

    #[test]
    fn lhs_honors_count_and_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let samples = latin_hypercube(&space(), 50, &mut rng);
        assert_eq!(samples.len(), 50);
        for sample in &samples {
            assert_eq!(sample.len(), 2);
            assert!((0.0..=1.0).contains(&sample[0]));
            assert!((10.0..=20.0).contains(&sample[1]));
        }
    }

    #[test]
    fn lhs_stratifies_each_dimension() {
        let mut rng = ChaCha8Rng::seed_from_u64(2);
        let count = 20;
        let samples = latin_hypercube(&space(), count, &mut rng);

        // Exactly one sample per stratum in dimension 0.
        let mut seen = vec![false; count];
        for sample in &samples {
            let stratum = ((sample[0] * count as f64) as usize).min(count - 1);
            assert!(!seen[stratum], "stratum {stratum} hit twice");
            seen[stratum] = true;
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn lhs_is_reproducible_for_a_seed() {
        let a = latin_hypercube(&space(), 16, &mut ChaCha8Rng::seed_from_u64(9));
        let b = latin_hypercube(&space(), 16, &mut ChaCha8Rng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn morris_trajectories_have_d_plus_one_points() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let trajectories = morris_trajectories(&space(), 5, &mut rng);
        assert_eq!(trajectories.len(), 5);
        for (points, order) in &trajectories {
            assert_eq!(points.len(), 3);
            assert_eq!(order.len(), 2);
            // Each consecutive pair differs in exactly one dimension.
            for step in 0..2 {
                let moved: Vec<usize> = (0..2)
                    .filter(|&d| (points[step][d] - points[step + 1][d]).abs() > 1e-12)
                    .collect();
                assert_eq!(moved, vec![order[step]]);
            }
        }
    }
}

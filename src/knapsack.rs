//! Knapsack-lattice reduction
//!
//! Subset-sum instances are solved by reducing a lattice whose shortest
//! vector encodes the solution. Two things change relative to plain
//! reduction: the run short-circuits as soon as the front nonzero row is
//! short enough to be a candidate solution (continuing would only churn),
//! and when the run does go to completion, trailing rows below the same
//! bound are removed.

use crate::approx::bigint_log2;
use crate::basis::LatticeBasis;
use crate::config::ReduceConfig;
use crate::error::Result;
use crate::reduce::{ReduceStats, Reducer};
use crate::removal::{prune_trailing, RemovalReport};
use num_bigint::BigInt;
use std::time::Instant;

/// Reduce a knapsack lattice, stopping early once the front nonzero row
/// has squared norm at most `bound`
pub fn knapsack_reduce(
    basis: &mut LatticeBasis,
    config: ReduceConfig,
    bound: &BigInt,
) -> Result<ReduceStats> {
    let reducer = Reducer::new(config)?;
    let start = Instant::now();
    let mut stats = ReduceStats::default();

    let target = bound.clone();
    let stop = move |b: &LatticeBasis, zeros: usize| {
        zeros < b.n && !b.row_is_zero(zeros) && b.norm_squared(zeros) <= target
    };
    let (_, zeros) = reducer.reduce_inner(basis, &mut stats, Some(&stop))?;
    stats.zeros = zeros;
    stats.total_time = start.elapsed();
    Ok(stats)
}

/// Like [`knapsack_reduce`], additionally dropping trailing rows whose
/// Gram-Schmidt squared norm is below `bound` when the run completes
/// without short-circuiting. After an early stop the basis is left
/// intact so the candidate solution's context is preserved.
pub fn knapsack_reduce_with_removal(
    basis: &mut LatticeBasis,
    config: ReduceConfig,
    bound: &BigInt,
) -> Result<(ReduceStats, RemovalReport)> {
    let reducer = Reducer::new(config)?;
    let start = Instant::now();
    let mut stats = ReduceStats::default();

    let target = bound.clone();
    let stop = move |b: &LatticeBasis, zeros: usize| {
        zeros < b.n && !b.row_is_zero(zeros) && b.norm_squared(zeros) <= target
    };
    let (checker, zeros) = reducer.reduce_inner(basis, &mut stats, Some(&stop))?;
    stats.zeros = zeros;

    let stopped_early = zeros < basis.n && basis.norm_squared(zeros) <= *bound;
    let report = if stopped_early {
        RemovalReport {
            removed: 0,
            min_surviving_gs_log2: bigint_log2(&basis.norm_squared(zeros)),
        }
    } else {
        prune_trailing(checker.as_ref(), basis, bound, zeros)
    };

    stats.total_time = start.elapsed();
    Ok((stats, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reduce::is_reduced;
    use num_traits::Zero;

    #[test]
    fn test_short_circuit_on_front_row() {
        // First swap makes the front row [1, 1] with squared norm 2,
        // which meets the bound immediately
        let mut basis = LatticeBasis::from_rows(&[vec![5i64, 0], vec![1, 1]]);
        let stats =
            knapsack_reduce(&mut basis, ReduceConfig::default(), &BigInt::from(2)).unwrap();

        assert_eq!(basis.norm_squared(0), BigInt::from(2));
        assert!(stats.swaps >= 1);
    }

    #[test]
    fn test_early_stop_skips_removal() {
        let mut basis = LatticeBasis::from_rows(&[vec![5i64, 0], vec![1, 1]]);
        let (_, report) = knapsack_reduce_with_removal(
            &mut basis,
            ReduceConfig::default(),
            &BigInt::from(2),
        )
        .unwrap();

        assert_eq!(report.removed, 0);
        assert_eq!(basis.n, 2);
        assert!((report.min_surviving_gs_log2 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_subset_sum_instance() {
        // a = [3, 5, 8], s = 8: the subsets {3, 5} and {8} both work,
        // so the reduced lattice contains a ±1 vector with zero last
        // coordinate and squared norm 3
        let mut basis = LatticeBasis::knapsack(&[3, 5, 8], 8);
        let (_, _report) = knapsack_reduce_with_removal(
            &mut basis,
            ReduceConfig::default(),
            &BigInt::zero(),
        )
        .unwrap();

        // Bound zero never matches, so this is a full reduction
        assert!(is_reduced(&basis, 0.74, 0.82));
        // Shortest lattice vector has squared norm 3; the front row is
        // provably within 2^(n-1) of it (in practice it hits 3 exactly)
        let min_norm = (0..basis.n)
            .filter(|&i| !basis.row_is_zero(i))
            .map(|i| basis.norm_squared(i))
            .min()
            .unwrap();
        assert!(min_norm <= BigInt::from(24));
    }
}

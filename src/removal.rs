//! Vector removal after reduction
//!
//! Once a basis is reduced, trailing rows whose Gram-Schmidt norm falls
//! below a caller-supplied squared-norm bound cannot contribute to any
//! lattice vector the caller still cares about, so they are dropped.
//! The comparison runs in log2 space on the certified Gram-Schmidt data
//! of the final precision level.

use crate::approx::bigint_log2;
use crate::babai::Checker;
use crate::basis::LatticeBasis;
use num_bigint::BigInt;

/// What a removal pass did
#[derive(Debug, Clone)]
pub struct RemovalReport {
    /// Trailing rows dropped
    pub removed: usize,
    /// log2 of the smallest surviving Gram-Schmidt squared norm,
    /// +inf when no nonzero rows survive
    pub min_surviving_gs_log2: f64,
}

/// Drop trailing rows whose Gram-Schmidt squared norm is below `bound`.
/// Rows are only removed from the tail; an interior row below the bound
/// is kept (its successors were already above it).
pub fn prune_trailing(
    checker: &dyn Checker,
    basis: &mut LatticeBasis,
    bound: &BigInt,
    zeros: usize,
) -> RemovalReport {
    let bound_log2 = bigint_log2(bound);

    let mut new_n = basis.n;
    while new_n > zeros && checker.gs_norm_log2(new_n - 1) < bound_log2 {
        new_n -= 1;
    }

    let removed = basis.n - new_n;
    if removed > 0 {
        basis.truncate(new_n);
    }

    let min_surviving = (zeros..new_n)
        .map(|i| checker.gs_norm_log2(i))
        .fold(f64::INFINITY, f64::min);

    RemovalReport {
        removed,
        min_surviving_gs_log2: min_surviving,
    }
}

//! Per-row certification backends
//!
//! Each backend maintains an approximate image of the basis (floating
//! rows, Gram-Schmidt coefficients, the running norm accumulator) and
//! exposes the same surface to the main loop: size-reduce one row via
//! iterated Babai rounding, test the Lovász condition, and keep the
//! approximation in sync across swaps. The main loop never looks at
//! floats directly; it only sees these verdicts.

use crate::basis::LatticeBasis;
use crate::reduce::ReduceStats;

mod bigfloat;
mod double;

pub use bigfloat::BigFloatChecker;
pub use double::DoubleChecker;

/// Outcome of certifying one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    /// The row is size-reduced and its Gram-Schmidt data is trustworthy
    Reduced,
    /// The approximation broke down (NaN, negative squared norm, or the
    /// rounding loop failed to settle); the caller must escalate
    PrecisionInsufficient,
    /// The row reduced to the exact zero vector
    ZeroVector,
}

/// Three-way verdict on the Lovász condition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lovasz {
    Holds,
    Fails,
    /// Too close to call within the backend's error bound
    Uncertain,
}

/// A precision backend driving size reduction and the Lovász test.
///
/// Index conventions follow the main loop: `kappa` is the row being
/// certified, `zeros` counts leading zero rows, `alpha` is the first
/// column whose Gram-Schmidt coefficient may be stale for this row.
pub trait Checker {
    /// Size-reduce row kappa against rows zeros..kappa by iterated
    /// Babai rounding, updating the basis and the approximation.
    /// On success, s[zeros..=kappa] holds the norm recurrence
    /// s[k+1] = s[k] - mu[kappa][k] * r[kappa][k] with s[zeros] = ||b_kappa||^2.
    fn reduce_row(
        &mut self,
        basis: &mut LatticeBasis,
        kappa: usize,
        alpha: usize,
        zeros: usize,
        stats: &mut ReduceStats,
    ) -> RowStatus;

    /// Test delta * r[kappa-1][kappa-1] <= s[kappa-1] using the state
    /// left by the last `reduce_row(kappa)` call
    fn lovasz(&self, kappa: usize, zeros: usize, delta: f64) -> Lovasz;

    /// Commit row kappa after the Lovász test holds: r[kappa][kappa] = s[kappa]
    fn accept_row(&mut self, kappa: usize, zeros: usize);

    /// Mirror a swap of rows kappa-1 and kappa into the approximation
    fn swap_rows(&mut self, basis: &mut LatticeBasis, kappa: usize, zeros: usize);

    /// Rebuild the approximation of rows zeros..upto from the exact
    /// integers (used after escalation and after zero-row rotation)
    fn recompute_prefix(
        &mut self,
        basis: &LatticeBasis,
        upto: usize,
        zeros: usize,
    ) -> RowStatus;

    /// log2 of the Gram-Schmidt squared norm r[i][i], for removal
    fn gs_norm_log2(&self, i: usize) -> f64;
}

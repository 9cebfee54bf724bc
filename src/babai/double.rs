//! Double-precision certification backend
//!
//! Covers the first two precision levels. Both work on the scaled image
//! `appB[i] = b_i / 2^expo[i]`; the heuristic variant additionally guards
//! every inner product against catastrophic cancellation (recomputing it
//! exactly when the guard trips) and reports the Lovász test as uncertain
//! inside its accumulated error margin.
//!
//! Scaling conventions for the stored arrays, with e_i = expo[i]:
//!
//! ```text
//! app_sp[i][j] = <b_i, b_j>  / 2^(e_i + e_j)
//! r[k][j]      = r_true[k][j] / 2^(e_k + e_j)
//! mu[k][j]     = mu_true[k][j] * 2^(e_j - e_k)
//! s[t]         = s_true[t]    / 2^(2 e_k)      (for the row k in flight)
//! ```
//!
//! Under these conventions the Gram-Schmidt recurrence needs no exponent
//! fixups at all; only the Babai rounding test and the Lovász comparison
//! rescale.

use super::{Checker, Lovasz, RowStatus};
use crate::approx::{
    bigint_from_f64_2exp, dot, heuristic_inner_product, ldexp, row_to_doubles,
};
use crate::basis::LatticeBasis;
use crate::reduce::ReduceStats;
use num_traits::Zero;

pub struct DoubleChecker {
    n: usize,
    eta: f64,
    loop_cap: usize,
    /// Guard inner products and report Uncertain near the Lovász boundary
    heuristic: bool,
    app_b: Vec<Vec<f64>>,
    expo: Vec<i64>,
    /// Cached scaled inner products, lower triangular, NaN = stale
    app_sp: Vec<Vec<f64>>,
    mu: Vec<Vec<f64>>,
    r: Vec<Vec<f64>>,
    /// Norm recurrence for the row in flight; s[t+1] = s[t] - mu[k][t] r[k][t]
    s: Vec<f64>,
}

impl DoubleChecker {
    pub fn new(basis: &LatticeBasis, eta: f64, loop_cap: usize, heuristic: bool) -> Self {
        let n = basis.n;
        let mut app_b = Vec::with_capacity(n);
        let mut expo = Vec::with_capacity(n);
        for i in 0..n {
            let (row, e) = row_to_doubles(basis.get(i));
            app_b.push(row);
            expo.push(e);
        }

        Self {
            n,
            eta,
            loop_cap,
            heuristic,
            app_b,
            expo,
            app_sp: vec![vec![f64::NAN; n]; n],
            mu: vec![vec![0.0; n]; n],
            r: vec![vec![0.0; n]; n],
            s: vec![0.0; n + 1],
        }
    }

    /// Cached scaled inner product <b_i, b_j> / 2^(e_i + e_j)
    fn sp(&mut self, basis: &LatticeBasis, i: usize, j: usize) -> f64 {
        let (hi, lo) = if i >= j { (i, j) } else { (j, i) };
        if self.app_sp[hi][lo].is_nan() {
            let adjust = -(self.expo[hi] + self.expo[lo]);
            self.app_sp[hi][lo] = if self.heuristic {
                heuristic_inner_product(
                    &self.app_b[hi],
                    &self.app_b[lo],
                    basis,
                    hi,
                    lo,
                    adjust,
                )
            } else {
                dot(&self.app_b[hi], &self.app_b[lo])
            };
        }
        self.app_sp[hi][lo]
    }

    /// Refresh appB[i]/expo[i] from the exact row and drop every cached
    /// product involving it
    fn refresh_row(&mut self, basis: &LatticeBasis, i: usize) {
        let (row, e) = row_to_doubles(basis.get(i));
        self.app_b[i] = row;
        self.expo[i] = e;
        for j in 0..=i {
            self.app_sp[i][j] = f64::NAN;
        }
        for k in i + 1..self.n {
            self.app_sp[k][i] = f64::NAN;
        }
    }

    /// One Gram-Schmidt pass for row kappa, columns from..kappa
    fn orthogonalize(
        &mut self,
        basis: &LatticeBasis,
        kappa: usize,
        from: usize,
        zeros: usize,
    ) -> bool {
        for j in from..kappa {
            let mut t = self.sp(basis, kappa, j);
            for k in zeros..j {
                t -= self.mu[j][k] * self.r[kappa][k];
            }
            self.r[kappa][j] = t;
            self.mu[kappa][j] = t / self.r[j][j];
            if !self.mu[kappa][j].is_finite() {
                return false;
            }
        }
        true
    }

    /// Relative error margin of the norm recurrence at dimension n
    fn error_margin(&self) -> f64 {
        self.n as f64 * f64::EPSILON * 16.0
    }
}

impl Checker for DoubleChecker {
    fn reduce_row(
        &mut self,
        basis: &mut LatticeBasis,
        kappa: usize,
        alpha: usize,
        zeros: usize,
        stats: &mut ReduceStats,
    ) -> RowStatus {
        let mut from = alpha.max(zeros);

        let mut settled = false;
        for _ in 0..self.loop_cap {
            if !self.orthogonalize(basis, kappa, from, zeros) {
                return RowStatus::PrecisionInsufficient;
            }

            // Babai rounding against rows kappa-1 down to zeros
            let mut mutated = false;
            for j in (zeros..kappa).rev() {
                let shift = self.expo[kappa] - self.expo[j];
                let true_mu = ldexp(self.mu[kappa][j], shift);
                if true_mu.is_nan() {
                    return RowStatus::PrecisionInsufficient;
                }
                if true_mu.abs() <= self.eta {
                    continue;
                }

                let q = match bigint_from_f64_2exp(self.mu[kappa][j], shift) {
                    Some(q) => q,
                    None => return RowStatus::PrecisionInsufficient,
                };
                if q.is_zero() {
                    continue;
                }

                basis.reduce_vector(kappa, j, &q);
                stats.size_reductions += 1;
                mutated = true;

                // Propagate into the stored coefficients for columns < j:
                // mu[kappa][k] -= q * mu_true[j][k], in stored scale
                let t = ldexp(true_mu.round(), self.expo[j] - self.expo[kappa]);
                for k in zeros..j {
                    self.mu[kappa][k] -= t * self.mu[j][k];
                }
            }

            if !mutated {
                settled = true;
                break;
            }
            self.refresh_row(basis, kappa);
            from = zeros;
        }

        if !settled {
            return RowStatus::PrecisionInsufficient;
        }

        let norm = self.sp(basis, kappa, kappa);
        if norm == 0.0 {
            if basis.row_is_zero(kappa) {
                return RowStatus::ZeroVector;
            }
            return RowStatus::PrecisionInsufficient;
        }
        if !norm.is_finite() || norm < 0.0 {
            return RowStatus::PrecisionInsufficient;
        }

        self.s[zeros] = norm;
        for k in zeros..kappa {
            self.s[k + 1] = self.s[k] - self.mu[kappa][k] * self.r[kappa][k];
            // The values are squared projection norms; cancellation
            // driving one negative means the digits are gone
            if !self.s[k + 1].is_finite() || self.s[k + 1] < 0.0 {
                return RowStatus::PrecisionInsufficient;
            }
        }

        RowStatus::Reduced
    }

    fn lovasz(&self, kappa: usize, _zeros: usize, delta: f64) -> Lovasz {
        let lhs = delta * self.r[kappa - 1][kappa - 1];
        let rhs = ldexp(
            self.s[kappa - 1],
            2 * (self.expo[kappa] - self.expo[kappa - 1]),
        );

        if lhs.is_nan() || rhs.is_nan() {
            return Lovasz::Uncertain;
        }
        if self.heuristic {
            let margin = self.error_margin() * (lhs.abs() + rhs.abs());
            if (rhs - lhs).abs() <= margin {
                return Lovasz::Uncertain;
            }
        }
        if lhs <= rhs {
            Lovasz::Holds
        } else {
            Lovasz::Fails
        }
    }

    fn accept_row(&mut self, kappa: usize, _zeros: usize) {
        self.r[kappa][kappa] = self.s[kappa];
    }

    fn swap_rows(&mut self, basis: &mut LatticeBasis, kappa: usize, zeros: usize) {
        basis.swap(kappa - 1, kappa);
        self.app_b.swap(kappa - 1, kappa);
        self.expo.swap(kappa - 1, kappa);

        // mu and r rows carry data only for columns < kappa - 1
        self.mu.swap(kappa - 1, kappa);
        self.r.swap(kappa - 1, kappa);

        // Cached products permute with the rows; the pair product itself
        // is symmetric so app_sp[kappa][kappa-1] stays where it is
        for j in 0..kappa - 1 {
            let tmp = self.app_sp[kappa - 1][j];
            self.app_sp[kappa - 1][j] = self.app_sp[kappa][j];
            self.app_sp[kappa][j] = tmp;
        }
        for i in kappa + 1..self.n {
            self.app_sp[i].swap(kappa - 1, kappa);
        }
        let tmp = self.app_sp[kappa - 1][kappa - 1];
        self.app_sp[kappa - 1][kappa - 1] = self.app_sp[kappa][kappa];
        self.app_sp[kappa][kappa] = tmp;

        if kappa - 1 == zeros {
            // New front row: its projected norm is its plain norm
            self.r[kappa - 1][kappa - 1] = self.sp(basis, kappa - 1, kappa - 1);
        } else {
            // The incoming row's projection at kappa-1 is s[kappa-1],
            // already in the right scale since expo moved with the row
            self.r[kappa - 1][kappa - 1] = self.s[kappa - 1];
        }
    }

    fn recompute_prefix(
        &mut self,
        basis: &LatticeBasis,
        upto: usize,
        zeros: usize,
    ) -> RowStatus {
        for i in 0..self.n {
            let (row, e) = row_to_doubles(basis.get(i));
            self.app_b[i] = row;
            self.expo[i] = e;
            for j in 0..self.n {
                self.app_sp[i][j] = f64::NAN;
            }
        }

        for i in zeros..upto {
            let mut s = self.sp(basis, i, i);
            for j in zeros..i {
                let mut t = self.sp(basis, i, j);
                for k in zeros..j {
                    t -= self.mu[j][k] * self.r[i][k];
                }
                self.r[i][j] = t;
                self.mu[i][j] = t / self.r[j][j];
                if !self.mu[i][j].is_finite() {
                    return RowStatus::PrecisionInsufficient;
                }
                s -= self.mu[i][j] * self.r[i][j];
            }
            if !s.is_finite() || s <= 0.0 {
                return RowStatus::PrecisionInsufficient;
            }
            self.r[i][i] = s;
        }

        RowStatus::Reduced
    }

    fn gs_norm_log2(&self, i: usize) -> f64 {
        self.r[i][i].log2() + 2.0 * self.expo[i] as f64
    }
}

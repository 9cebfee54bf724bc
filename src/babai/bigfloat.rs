//! Arbitrary-precision certification backend
//!
//! Used once both double-precision levels have failed. Works directly on
//! MPFR floats at a fixed precision, so no per-row exponent scaling is
//! needed; the exponent range of `rug::Float` covers anything an integer
//! basis can produce. The layout mirrors the double backend: cached
//! inner products, stored mu and r rows, and the norm recurrence s.

use super::{Checker, Lovasz, RowStatus};
use crate::basis::LatticeBasis;
use crate::reduce::ReduceStats;
use num_bigint::{BigInt, Sign};
use num_traits::Zero;
use rug::integer::Order;
use rug::Float;
use std::cmp::Ordering;

/// Convert an exact entry to an MPFR float at the working precision
fn big_to_float(prec: u32, x: &BigInt) -> Float {
    let (sign, bytes) = x.to_bytes_le();
    let mut mag = rug::Integer::from_digits(&bytes, Order::Lsf);
    if sign == Sign::Minus {
        mag = -mag;
    }
    Float::with_val(prec, mag)
}

/// Round an MPFR float to the nearest BigInt. None for non-finite input.
fn float_to_bigint(f: &Float) -> Option<BigInt> {
    let i = f.to_integer()?;
    let bytes = i.to_digits::<u8>(Order::Lsf);
    let mag = BigInt::from_bytes_le(Sign::Plus, &bytes);
    Some(if i.cmp0() == Ordering::Less { -mag } else { mag })
}

pub struct BigFloatChecker {
    n: usize,
    prec: u32,
    eta: f64,
    loop_cap: usize,
    app_b: Vec<Vec<Float>>,
    /// Cached inner products, lower triangular, None = stale
    app_sp: Vec<Vec<Option<Float>>>,
    mu: Vec<Vec<Float>>,
    r: Vec<Vec<Float>>,
    s: Vec<Float>,
}

impl BigFloatChecker {
    pub fn new(basis: &LatticeBasis, prec: u32, eta: f64, loop_cap: usize) -> Self {
        let n = basis.n;
        let app_b = (0..n)
            .map(|i| basis.get(i).iter().map(|x| big_to_float(prec, x)).collect())
            .collect();

        let zero_row = |_| vec![Float::with_val(prec, 0); n];
        Self {
            n,
            prec,
            eta,
            loop_cap,
            app_b,
            app_sp: vec![vec![None; n]; n],
            mu: (0..n).map(zero_row).collect(),
            r: (0..n).map(zero_row).collect(),
            s: vec![Float::with_val(prec, 0); n + 1],
        }
    }

    /// The precision this checker runs at
    pub fn precision(&self) -> u32 {
        self.prec
    }

    fn dot(&self, i: usize, j: usize) -> Float {
        let mut acc = Float::with_val(self.prec, 0);
        for (a, b) in self.app_b[i].iter().zip(self.app_b[j].iter()) {
            acc += Float::with_val(self.prec, a * b);
        }
        acc
    }

    fn sp(&mut self, i: usize, j: usize) -> Float {
        let (hi, lo) = if i >= j { (i, j) } else { (j, i) };
        if self.app_sp[hi][lo].is_none() {
            self.app_sp[hi][lo] = Some(self.dot(hi, lo));
        }
        self.app_sp[hi][lo].clone().unwrap_or_else(|| Float::with_val(self.prec, 0))
    }

    fn refresh_row(&mut self, basis: &LatticeBasis, i: usize) {
        self.app_b[i] = basis
            .get(i)
            .iter()
            .map(|x| big_to_float(self.prec, x))
            .collect();
        for j in 0..=i {
            self.app_sp[i][j] = None;
        }
        for k in i + 1..self.n {
            self.app_sp[k][i] = None;
        }
    }

    fn orthogonalize(&mut self, kappa: usize, from: usize, zeros: usize) -> bool {
        for j in from..kappa {
            let mut t = self.sp(kappa, j);
            for k in zeros..j {
                let p = Float::with_val(self.prec, &self.mu[j][k] * &self.r[kappa][k]);
                t -= p;
            }
            self.r[kappa][j] = t.clone();
            let q = Float::with_val(self.prec, &t / &self.r[j][j]);
            if !q.is_finite() {
                return false;
            }
            self.mu[kappa][j] = q;
        }
        true
    }

    /// Relative margin inside which the Lovász comparison is not trusted
    fn margin(&self) -> Float {
        let guard = self.prec.saturating_sub(16).max(1);
        Float::with_val(self.prec, 1) >> guard
    }
}

impl Checker for BigFloatChecker {
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
            if !self.orthogonalize(kappa, from, zeros) {
                return RowStatus::PrecisionInsufficient;
            }

            let mut mutated = false;
            for j in (zeros..kappa).rev() {
                if self.mu[kappa][j].is_nan() {
                    return RowStatus::PrecisionInsufficient;
                }
                let mut mag = self.mu[kappa][j].clone();
                mag.abs_mut();
                if mag <= self.eta {
                    continue;
                }

                let q = match float_to_bigint(&self.mu[kappa][j]) {
                    Some(q) => q,
                    None => return RowStatus::PrecisionInsufficient,
                };
                if q.is_zero() {
                    continue;
                }

                basis.reduce_vector(kappa, j, &q);
                stats.size_reductions += 1;
                mutated = true;

                let qf = big_to_float(self.prec, &q);
                for k in zeros..j {
                    let p = Float::with_val(self.prec, &qf * &self.mu[j][k]);
                    self.mu[kappa][k] -= p;
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

        let norm = self.sp(kappa, kappa);
        if norm.is_zero() {
            if basis.row_is_zero(kappa) {
                return RowStatus::ZeroVector;
            }
            return RowStatus::PrecisionInsufficient;
        }
        if !norm.is_finite() || norm < 0 {
            return RowStatus::PrecisionInsufficient;
        }

        self.s[zeros] = norm;
        for k in zeros..kappa {
            let p = Float::with_val(self.prec, &self.mu[kappa][k] * &self.r[kappa][k]);
            self.s[k + 1] = Float::with_val(self.prec, &self.s[k] - &p);
            // Squared projection norms; a negative one is pure
            // cancellation error
            if !self.s[k + 1].is_finite() || self.s[k + 1] < 0 {
                return RowStatus::PrecisionInsufficient;
            }
        }

        RowStatus::Reduced
    }

    fn lovasz(&self, kappa: usize, _zeros: usize, delta: f64) -> Lovasz {
        let lhs = Float::with_val(self.prec, &self.r[kappa - 1][kappa - 1] * delta);
        let rhs = &self.s[kappa - 1];

        if lhs.is_nan() || rhs.is_nan() {
            return Lovasz::Uncertain;
        }

        let mut diff = Float::with_val(self.prec, rhs - &lhs);
        diff.abs_mut();
        let mut scale = Float::with_val(self.prec, &lhs + rhs);
        scale.abs_mut();
        scale *= self.margin();
        if diff <= scale {
            return Lovasz::Uncertain;
        }

        if lhs <= *rhs {
            Lovasz::Holds
        } else {
            Lovasz::Fails
        }
    }

    fn accept_row(&mut self, kappa: usize, _zeros: usize) {
        self.r[kappa][kappa] = self.s[kappa].clone();
    }

    fn swap_rows(&mut self, basis: &mut LatticeBasis, kappa: usize, zeros: usize) {
        basis.swap(kappa - 1, kappa);
        self.app_b.swap(kappa - 1, kappa);
        self.mu.swap(kappa - 1, kappa);
        self.r.swap(kappa - 1, kappa);

        for j in 0..kappa - 1 {
            let tmp = self.app_sp[kappa - 1][j].take();
            self.app_sp[kappa - 1][j] = self.app_sp[kappa][j].take();
            self.app_sp[kappa][j] = tmp;
        }
        for i in kappa + 1..self.n {
            self.app_sp[i].swap(kappa - 1, kappa);
        }
        let tmp = self.app_sp[kappa - 1][kappa - 1].take();
        self.app_sp[kappa - 1][kappa - 1] = self.app_sp[kappa][kappa].take();
        self.app_sp[kappa][kappa] = tmp;

        if kappa - 1 == zeros {
            self.r[kappa - 1][kappa - 1] = self.sp(kappa - 1, kappa - 1);
        } else {
            self.r[kappa - 1][kappa - 1] = self.s[kappa - 1].clone();
        }
    }

    fn recompute_prefix(
        &mut self,
        basis: &LatticeBasis,
        upto: usize,
        zeros: usize,
    ) -> RowStatus {
        for i in 0..self.n {
            self.app_b[i] = basis
                .get(i)
                .iter()
                .map(|x| big_to_float(self.prec, x))
                .collect();
            for j in 0..self.n {
                self.app_sp[i][j] = None;
            }
        }

        for i in zeros..upto {
            let mut s = self.sp(i, i);
            for j in zeros..i {
                let mut t = self.sp(i, j);
                for k in zeros..j {
                    let p = Float::with_val(self.prec, &self.mu[j][k] * &self.r[i][k]);
                    t -= p;
                }
                self.r[i][j] = t.clone();
                let q = Float::with_val(self.prec, &t / &self.r[j][j]);
                if !q.is_finite() {
                    return RowStatus::PrecisionInsufficient;
                }
                let p = Float::with_val(self.prec, &q * &t);
                self.mu[i][j] = q;
                s -= p;
            }
            if !s.is_finite() || s <= 0 {
                return RowStatus::PrecisionInsufficient;
            }
            self.r[i][i] = s;
        }

        RowStatus::Reduced
    }

    fn gs_norm_log2(&self, i: usize) -> f64 {
        let (d, e) = self.r[i][i].to_f64_exp();
        if d == 0.0 {
            return f64::NEG_INFINITY;
        }
        d.abs().log2() + e as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bigint_float_round_trip() {
        let x = BigInt::parse_bytes(b"-123456789012345678901234567890", 10).unwrap();
        let f = big_to_float(256, &x);
        assert_eq!(float_to_bigint(&f).unwrap(), x);
    }

    #[test]
    fn test_float_to_bigint_rounds_to_nearest() {
        let f = Float::with_val(64, 2.6);
        assert_eq!(float_to_bigint(&f).unwrap(), BigInt::from(3));
        let f = Float::with_val(64, -2.6);
        assert_eq!(float_to_bigint(&f).unwrap(), BigInt::from(-3));
    }

    #[test]
    fn test_reduce_row_matches_double_backend() {
        let mut basis = LatticeBasis::from_rows(&[vec![2i64, 0], vec![11, 1]]);
        let mut checker = BigFloatChecker::new(&basis, 64, 0.81, 32);
        let mut stats = ReduceStats::default();

        assert_eq!(checker.recompute_prefix(&basis, 1, 0), RowStatus::Reduced);
        let status = checker.reduce_row(&mut basis, 1, 0, 0, &mut stats);
        assert_eq!(status, RowStatus::Reduced);
        assert_eq!(basis.get(1), &[BigInt::from(-1), BigInt::from(1)]);
    }

    #[test]
    fn test_lovasz_verdicts() {
        let mut basis = LatticeBasis::from_rows(&[vec![10i64, 0], vec![0, 1]]);
        let mut checker = BigFloatChecker::new(&basis, 64, 0.81, 32);
        let mut stats = ReduceStats::default();

        checker.recompute_prefix(&basis, 1, 0);
        checker.reduce_row(&mut basis, 1, 0, 0, &mut stats);
        assert_eq!(checker.lovasz(1, 0, 0.75), Lovasz::Fails);

        checker.swap_rows(&mut basis, 1, 0);
        assert_eq!(checker.gs_norm_log2(0), 0.0);
    }

    #[test]
    fn test_zero_vector_detected() {
        let mut basis = LatticeBasis::from_rows(&[vec![3i64, 0], vec![6, 0]]);
        let mut checker = BigFloatChecker::new(&basis, 64, 0.81, 32);
        let mut stats = ReduceStats::default();

        checker.recompute_prefix(&basis, 1, 0);
        let status = checker.reduce_row(&mut basis, 1, 0, 0, &mut stats);
        assert_eq!(status, RowStatus::ZeroVector);
    }

    #[test]
    fn test_negative_norm_recurrence_escalates() {
        let mut basis = LatticeBasis::from_rows(&[vec![3i64, 0], vec![1, 2]]);
        let mut checker = BigFloatChecker::new(&basis, 64, 0.81, 32);
        let mut stats = ReduceStats::default();
        assert_eq!(checker.recompute_prefix(&basis, 1, 0), RowStatus::Reduced);

        // Corrupt the cached row data the way heavy cancellation would:
        // mu small enough to settle, r large enough to push s below zero
        checker.mu[1][0] = Float::with_val(64, 0.5);
        checker.r[1][0] = Float::with_val(64, 1e300);
        let status = checker.reduce_row(&mut basis, 1, 1, 0, &mut stats);
        assert_eq!(status, RowStatus::PrecisionInsufficient);
    }
}

//! Scaled floating-point approximation helpers
//!
//! The double-precision backends work on a scaled image of the basis:
//! row i is stored as `appB[i] = b_i / 2^expo[i]` so that every entry fits
//! comfortably in an f64 mantissa even when the integers run to thousands
//! of bits. These helpers convert between `BigInt` and the (mantissa,
//! exponent) form and provide the heuristic inner product with its exact
//! integer fallback.

use crate::basis::LatticeBasis;
use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};

/// Relative cancellation threshold for the heuristic inner product.
/// A float dot product whose magnitude falls below max_term * 2^-26
/// has lost roughly half the mantissa to cancellation.
pub const CANCELLATION_BITS: i32 = 26;

/// Decompose a BigInt as (d, e) with x ≈ d * 2^e and d holding the top
/// 53 bits. Returns (0.0, 0) for zero.
pub fn to_f64_exp(x: &BigInt) -> (f64, i64) {
    if x.is_zero() {
        return (0.0, 0);
    }
    let bits = x.bits() as i64;
    let shift = (bits - 53).max(0);
    let top = x >> shift;
    // Top 53 bits always fit in an f64 exactly
    let d = top.to_f64().unwrap_or(0.0);
    (d, shift)
}

/// x * 2^e without losing the exponent range of f64.powi for |e| > 1023
pub fn ldexp(x: f64, e: i64) -> f64 {
    if x == 0.0 {
        return 0.0;
    }
    if e.abs() <= 1023 {
        return x * 2f64.powi(e as i32);
    }
    // Split the shift so each factor stays finite
    let half = e / 2;
    x * 2f64.powi(half as i32) * 2f64.powi((e - half) as i32)
}

/// Base-2 logarithm of |x|, or -inf for zero
pub fn bigint_log2(x: &BigInt) -> f64 {
    if x.is_zero() {
        return f64::NEG_INFINITY;
    }
    let (d, e) = to_f64_exp(x);
    d.abs().log2() + e as f64
}

/// Round x * 2^e to the nearest BigInt. Returns None when x is not
/// finite. Works entirely on the f64 bit pattern so the result stays
/// exact even when e pushes far outside the f64 exponent range.
pub fn bigint_from_f64_2exp(x: f64, e: i64) -> Option<BigInt> {
    if !x.is_finite() {
        return None;
    }
    if x == 0.0 {
        return Some(BigInt::zero());
    }

    let bits = x.to_bits();
    let sign = if x < 0.0 { Sign::Minus } else { Sign::Plus };
    let biased_exp = ((bits >> 52) & 0x7ff) as i64;
    let mantissa = if biased_exp == 0 {
        bits & 0xf_ffff_ffff_ffff // subnormal
    } else {
        (bits & 0xf_ffff_ffff_ffff) | (1u64 << 52)
    };
    let exp2 = if biased_exp == 0 { -1074 } else { biased_exp - 1075 };

    let total_shift = exp2 + e;
    let mag = BigInt::from(mantissa);
    let result = if total_shift >= 0 {
        mag << total_shift
    } else {
        let shift = (-total_shift) as u64;
        let mantissa_bits = 64 - mantissa.leading_zeros() as u64;
        if shift > mantissa_bits {
            // |x * 2^e| < 1/2, rounds to zero
            return Some(BigInt::zero());
        }
        // Round to nearest: add half the dropped range before shifting
        let half = BigInt::from(1u8) << (shift - 1);
        (mag + half) >> shift
    };

    Some(match sign {
        Sign::Minus => -result,
        _ => result,
    })
}

/// Convert a basis row to its scaled f64 image: returns (appB, expo)
/// with appB[j] ≈ b[j] / 2^expo and expo chosen so the largest entry
/// uses the full 53-bit mantissa.
pub fn row_to_doubles(row: &[BigInt]) -> (Vec<f64>, i64) {
    let max_bits = row.iter().map(|x| x.bits() as i64).max().unwrap_or(0);
    let expo = (max_bits - 53).max(0);
    let app = row
        .iter()
        .map(|x| {
            let (d, e) = to_f64_exp(x);
            ldexp(d, e - expo)
        })
        .collect();
    (app, expo)
}

/// Plain f64 dot product
pub fn dot(x: &[f64], y: &[f64]) -> f64 {
    x.iter().zip(y.iter()).map(|(a, b)| a * b).sum()
}

/// Inner product of two scaled rows with a cancellation guard.
///
/// Computes the f64 dot product and, alongside it, the largest term
/// magnitude. When the sum has cancelled down to less than
/// max_term * 2^-26 the float value carries too few correct bits, so
/// the product is recomputed exactly on the integer rows and rescaled
/// by 2^exp_adjust (the caller passes -(e_i + e_j)).
pub fn heuristic_inner_product(
    x: &[f64],
    y: &[f64],
    basis: &LatticeBasis,
    i: usize,
    j: usize,
    exp_adjust: i64,
) -> f64 {
    let mut sum = 0.0f64;
    let mut max_term = 0.0f64;
    for (a, b) in x.iter().zip(y.iter()) {
        let t = a * b;
        sum += t;
        let m = t.abs();
        if m > max_term {
            max_term = m;
        }
    }

    if sum.abs() >= max_term * 2f64.powi(-CANCELLATION_BITS) {
        return sum;
    }

    // Heavy cancellation: redo it exactly and rescale
    let exact = basis.inner_product(i, j);
    let (d, e) = to_f64_exp(&exact);
    ldexp(d, e + exp_adjust)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_f64_exp_small() {
        let (d, e) = to_f64_exp(&BigInt::from(12345));
        assert_eq!(e, 0);
        assert_eq!(d, 12345.0);
    }

    #[test]
    fn test_to_f64_exp_large_round_trips() {
        let x = BigInt::from(987654321u64) << 100;
        let (d, e) = to_f64_exp(&x);
        let back = bigint_from_f64_2exp(d, e).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn test_ldexp_wide_exponent() {
        assert_eq!(ldexp(1.0, 10), 1024.0);
        assert_eq!(ldexp(1.0, -1), 0.5);
        // Beyond the single powi range, still finite and consistent
        let a = ldexp(1.0, 1500);
        assert!(a.is_infinite() || a > 0.0);
        assert_eq!(ldexp(ldexp(1.0, 600), -600), 1.0);
    }

    #[test]
    fn test_bigint_from_f64_2exp_rounding() {
        // 1.5 * 2^0 rounds to 2 (ties away from half via +half trick)
        assert_eq!(bigint_from_f64_2exp(1.25, 0).unwrap(), BigInt::from(1));
        assert_eq!(bigint_from_f64_2exp(1.75, 0).unwrap(), BigInt::from(2));
        assert_eq!(bigint_from_f64_2exp(-3.0, 2).unwrap(), BigInt::from(-12));
        assert_eq!(bigint_from_f64_2exp(0.2, -10).unwrap(), BigInt::zero());
        assert!(bigint_from_f64_2exp(f64::NAN, 0).is_none());
    }

    #[test]
    fn test_row_to_doubles_scaling() {
        let row = vec![BigInt::from(6), BigInt::from(-2)];
        let (app, expo) = row_to_doubles(&row);
        assert_eq!(expo, 0);
        assert_eq!(app, vec![6.0, -2.0]);

        let big_row = vec![BigInt::from(1) << 200, BigInt::from(3) << 100];
        let (app, expo) = row_to_doubles(&big_row);
        assert_eq!(expo, 201 - 53);
        assert_eq!(app[0], 2f64.powi((200 - expo) as i32));
    }

    #[test]
    fn test_heuristic_inner_product_fallback() {
        // Rows engineered so the f64 dot cancels below the guard while
        // the exact product is tiny:
        // <b_0, b_1> = h(h-1) + (h+1)(2-h) = 2
        let h = 1i64 << 60;
        let basis = LatticeBasis::from_rows(&[vec![h, h + 1], vec![h - 1, 2 - h]]);
        let (x, ei) = row_to_doubles(basis.get(0));
        let (y, ej) = row_to_doubles(basis.get(1));

        let got = heuristic_inner_product(&x, &y, &basis, 0, 1, -(ei + ej));
        assert_eq!(got, ldexp(2.0, -(ei + ej)));
    }

    #[test]
    fn test_bigint_log2() {
        assert_eq!(bigint_log2(&BigInt::from(8)), 3.0);
        assert!(bigint_log2(&BigInt::zero()).is_infinite());
        let big = BigInt::from(1) << 500;
        assert!((bigint_log2(&big) - 500.0).abs() < 1e-9);
    }
}

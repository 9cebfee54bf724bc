//! Exact Gram-Schmidt orthogonalization
//!
//! Computes Gram-Schmidt coefficients and squared norms in exact rational
//! arithmetic. The reduction engine itself works in floating point; this
//! kernel exists to *verify* its output: the `is_reduced` check and the
//! property tests (Lovász condition, size reduction, lattice invariance)
//! all run against these exact values.
//!
//! ```text
//! b*_1 = b_1
//! b*_i = b_i - Σ_{j<i} μ_ij b*_j
//! μ_ij = <b_i, b*_j> / <b*_j, b*_j>
//! ```

use crate::basis::LatticeBasis;
use crate::rational::Rational;
use num_bigint::BigInt;

/// Exact Gram-Schmidt data over the rows `first..n` of a basis
/// (rows before `first` are expected to be zero and are skipped)
#[derive(Debug, Clone)]
pub struct ExactGram {
    /// Gram-Schmidt coefficients μ_ij, lower triangular: mu[i][j] for j < i.
    /// Indices are relative to `first`.
    pub mu: Vec<Vec<Rational>>,
    /// Squared norms ||b*_i||^2 (exact rationals), relative to `first`
    pub norms: Vec<Rational>,
    /// First row included in the orthogonalization
    pub first: usize,
    /// Number of rows included
    pub n: usize,
}

impl ExactGram {
    /// Compute exact Gram-Schmidt data for rows `first..basis.n`
    pub fn compute(basis: &LatticeBasis, first: usize) -> Self {
        let n = basis.n - first;

        let mut mu: Vec<Vec<Rational>> = (0..n).map(|i| vec![Rational::zero(); i]).collect();
        let mut norms = vec![Rational::zero(); n];

        // Inner products <b_i, b_j> for j <= i
        let inner_products: Vec<Vec<BigInt>> = (0..n)
            .map(|i| {
                (0..=i)
                    .map(|j| basis.inner_product(first + i, first + j))
                    .collect()
            })
            .collect();

        if n == 0 {
            return Self {
                mu,
                norms,
                first,
                n,
            };
        }

        norms[0] = Rational::from_bigint(inner_products[0][0].clone());

        for i in 1..n {
            // <b_i, b*_j> via back-substitution, then μ_ij = <b_i, b*_j> / ||b*_j||^2
            let mut inner_with_b_star: Vec<Rational> = vec![Rational::zero(); i];

            for j in 0..i {
                let mut inner_i_bstarj = Rational::from_bigint(inner_products[i][j].clone());

                for k in 0..j {
                    let prod = &mu[j][k] * &inner_with_b_star[k];
                    inner_i_bstarj = inner_i_bstarj - prod;
                }

                inner_with_b_star[j] = inner_i_bstarj.clone();

                mu[i][j] = if norms[j].is_zero() {
                    Rational::zero()
                } else {
                    inner_i_bstarj / norms[j].clone()
                };
            }

            let mut b_star_i_sq = Rational::from_bigint(inner_products[i][i].clone());
            for j in 0..i {
                let prod = &mu[i][j] * &inner_with_b_star[j];
                b_star_i_sq = b_star_i_sq - prod;
            }
            norms[i] = b_star_i_sq;
        }

        Self {
            mu,
            norms,
            first,
            n,
        }
    }

    /// Get μ_ij with indices relative to `first` (j < i required)
    pub fn get_mu(&self, i: usize, j: usize) -> &Rational {
        assert!(j < i, "μ_ij only defined for j < i");
        &self.mu[i][j]
    }

    /// Get ||b*_i||^2 relative to `first`
    pub fn get_norm_sq(&self, i: usize) -> &Rational {
        &self.norms[i]
    }

    /// Check |μ_ij| ≤ eta, with eta given as a fraction eta_num/eta_den
    pub fn size_reduced_at(&self, i: usize, j: usize, eta_num: i64, eta_den: i64) -> bool {
        let mu = self.get_mu(i, j);
        // |num/den| ≤ eta_num/eta_den  ⟺  |num| * eta_den ≤ eta_num * den
        let lhs = mu.numerator.magnitude() * BigInt::from(eta_den).magnitude();
        let rhs = BigInt::from(eta_num).magnitude() * mu.denominator.magnitude();
        lhs <= rhs
    }

    /// Check the Lovász condition at position k (relative to `first`):
    /// δ ||b*_{k-1}||^2 ≤ ||b*_k||^2 + μ_{k,k-1}^2 ||b*_{k-1}||^2
    pub fn check_lovasz(&self, k: usize, delta_num: i64, delta_den: i64) -> bool {
        if k == 0 {
            return true;
        }

        let delta = Rational::new(BigInt::from(delta_num), BigInt::from(delta_den));
        let lhs = &delta * &self.norms[k - 1];

        let mu_k = &self.mu[k][k - 1];
        let mu_sq = mu_k * mu_k;
        let rhs = &self.norms[k] + &(&mu_sq * &self.norms[k - 1]);

        lhs <= rhs
    }

    /// Determinant of the Gram matrix of rows `first..n`, the product of
    /// the Gram-Schmidt squared norms. Invariant under unimodular row
    /// operations, so it identifies the lattice across a reduction.
    pub fn gram_determinant(&self) -> Rational {
        let mut det = Rational::one();
        for norm in &self.norms {
            det = det * norm.clone();
        }
        det
    }
}

/// Convert a floating parameter like delta or eta to a nearby fraction
/// for exact comparisons (20 fractional bits are plenty for parameters
/// in (0, 1)).
pub fn to_fraction(x: f64) -> (i64, i64) {
    const SCALE: f64 = (1u64 << 20) as f64;
    ((x * SCALE).round() as i64, 1i64 << 20)
}

//! Lattice basis representation
//!
//! The exact vector store: an integer matrix of row vectors, mutated in
//! place by the reduction engine through row swaps, row negations and
//! integer row combinations. Every mutation is unimodular, so the rows
//! span the same lattice at all times. An optional transform matrix
//! records the operations applied.

use num_bigint::BigInt;
use num_traits::{One, Signed, Zero};
use std::fmt;

/// A lattice basis represented as a matrix of row vectors
///
/// Each row b_i is a basis vector in Z^m.
/// The lattice L(B) = {Σ x_i b_i : x_i ∈ Z}
#[derive(Debug, Clone)]
pub struct LatticeBasis {
    /// Basis vectors as rows (n vectors of dimension m)
    pub vectors: Vec<Vec<BigInt>>,
    /// Number of basis vectors (rank of the generating set)
    pub n: usize,
    /// Dimension of the ambient space
    pub m: usize,
    /// Unimodular transform mirror, when tracking is enabled
    transform: Option<Vec<Vec<BigInt>>>,
}

impl LatticeBasis {
    /// Create a new lattice basis from row vectors. An empty vector list
    /// gives the 0x0 basis, which the reduction entry points reject.
    ///
    /// # Panics
    /// Panics if rows have inconsistent dimensions
    pub fn new(vectors: Vec<Vec<BigInt>>) -> Self {
        let m = vectors.first().map_or(0, Vec::len);
        assert!(
            vectors.iter().all(|v| v.len() == m),
            "All vectors must have the same dimension"
        );

        let n = vectors.len();
        Self {
            vectors,
            n,
            m,
            transform: None,
        }
    }

    /// Create a lattice basis from integer slices
    pub fn from_rows<T: Into<BigInt> + Clone>(rows: &[Vec<T>]) -> Self {
        let vectors: Vec<Vec<BigInt>> = rows
            .iter()
            .map(|row| row.iter().map(|x| x.clone().into()).collect())
            .collect();
        Self::new(vectors)
    }

    /// Create a lattice basis from a flat array (row-major order)
    pub fn from_flat<T: Into<BigInt> + Clone>(data: &[T], n: usize, m: usize) -> Self {
        assert_eq!(data.len(), n * m, "Data size must match n × m");
        let vectors: Vec<Vec<BigInt>> = (0..n)
            .map(|i| (0..m).map(|j| data[i * m + j].clone().into()).collect())
            .collect();
        Self::new(vectors)
    }

    /// Create a random lattice basis for testing
    ///
    /// # Arguments
    /// * `n` - Number of basis vectors
    /// * `m` - Dimension of ambient space
    /// * `bits` - Maximum bit size of entries
    pub fn random(n: usize, m: usize, bits: usize) -> Self {
        use rand::Rng;
        let mut rng = rand::thread_rng();
        let bits = bits.clamp(2, 62);

        let vectors: Vec<Vec<BigInt>> = (0..n)
            .map(|_| {
                (0..m)
                    .map(|_| {
                        let val: i64 =
                            rng.gen_range(-(1i64 << (bits - 1))..(1i64 << (bits - 1)));
                        BigInt::from(val)
                    })
                    .collect()
            })
            .collect();

        Self::new(vectors)
    }

    /// Create a knapsack/subset-sum lattice
    ///
    /// Given a = [a_1, ..., a_n] and target s, creates the lattice:
    /// ```text
    /// [ 2  0  0 ... 0  a_1 ]
    /// [ 0  2  0 ... 0  a_2 ]
    /// [ ...                ]
    /// [ 1  1  1 ... 1   s  ]
    /// ```
    /// A subset summing to s shows up after reduction as a short vector
    /// with entries ±1 and a zero last coordinate.
    pub fn knapsack(a: &[i64], s: i64) -> Self {
        let n = a.len() + 1;
        let m = a.len() + 1;

        let mut vectors = vec![vec![BigInt::zero(); m]; n];

        for i in 0..a.len() {
            vectors[i][i] = BigInt::from(2);
            vectors[i][m - 1] = BigInt::from(a[i]);
        }

        for j in 0..a.len() {
            vectors[n - 1][j] = BigInt::one();
        }
        vectors[n - 1][m - 1] = BigInt::from(s);

        Self::new(vectors)
    }

    /// Get vector at index i
    pub fn get(&self, i: usize) -> &[BigInt] {
        &self.vectors[i]
    }

    /// Start recording row operations in a unimodular transform matrix,
    /// initialised to the n×n identity.
    pub fn enable_transform(&mut self) {
        let mut u = vec![vec![BigInt::zero(); self.n]; self.n];
        for (i, row) in u.iter_mut().enumerate() {
            row[i] = BigInt::one();
        }
        self.transform = Some(u);
    }

    /// The recorded transform, if tracking is enabled
    pub fn transform(&self) -> Option<&Vec<Vec<BigInt>>> {
        self.transform.as_ref()
    }

    /// Take ownership of the recorded transform, disabling tracking
    pub fn take_transform(&mut self) -> Option<Vec<Vec<BigInt>>> {
        self.transform.take()
    }

    /// Swap two basis vectors
    pub fn swap(&mut self, i: usize, j: usize) {
        self.vectors.swap(i, j);
        if let Some(u) = &mut self.transform {
            u.swap(i, j);
        }
    }

    /// Negate basis vector i
    pub fn negate_row(&mut self, i: usize) {
        for x in &mut self.vectors[i] {
            *x = -std::mem::take(x);
        }
        if let Some(u) = &mut self.transform {
            for x in &mut u[i] {
                *x = -std::mem::take(x);
            }
        }
    }

    /// Compute inner product <b_i, b_j>
    pub fn inner_product(&self, i: usize, j: usize) -> BigInt {
        self.vectors[i]
            .iter()
            .zip(self.vectors[j].iter())
            .map(|(a, b)| a * b)
            .fold(BigInt::zero(), |acc, x| acc + x)
    }

    /// Compute squared norm ||b_i||^2
    pub fn norm_squared(&self, i: usize) -> BigInt {
        self.inner_product(i, i)
    }

    /// Update b_i = b_i - q * b_j (size reduction step)
    pub fn reduce_vector(&mut self, i: usize, j: usize, q: &BigInt) {
        if q.is_zero() {
            return;
        }
        for k in 0..self.m {
            let delta = q * &self.vectors[j][k];
            self.vectors[i][k] -= delta;
        }
        if let Some(u) = &mut self.transform {
            for k in 0..self.n {
                let delta = q * &u[j][k];
                u[i][k] -= delta;
            }
        }
    }

    /// Whether row i is the zero vector
    pub fn row_is_zero(&self, i: usize) -> bool {
        self.vectors[i].iter().all(|x| x.is_zero())
    }

    /// Drop all rows at index `new_n` and beyond (vector removal).
    /// The transform, if tracked, keeps only the surviving rows.
    pub fn truncate(&mut self, new_n: usize) {
        assert!(new_n <= self.n);
        self.vectors.truncate(new_n);
        if let Some(u) = &mut self.transform {
            u.truncate(new_n);
        }
        self.n = new_n;
    }

    /// Get maximum absolute entry (for bound estimation)
    pub fn max_entry(&self) -> BigInt {
        self.vectors
            .iter()
            .flat_map(|v| v.iter())
            .map(|x| x.abs())
            .max()
            .unwrap_or_else(BigInt::zero)
    }
}

impl fmt::Display for LatticeBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LatticeBasis ({}×{}):", self.n, self.m)?;
        for (i, v) in self.vectors.iter().enumerate() {
            write!(f, "  b_{}: [", i)?;
            for (j, x) in v.iter().enumerate() {
                if j > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", x)?;
            }
            writeln!(f, "]")?;
        }
        Ok(())
    }
}

//! Adaptive-precision LLL lattice basis reduction.
//!
//! Reduces an integer lattice basis in place, doing almost all arithmetic
//! in floating point and escalating precision only when the current level
//! can no longer certify its answers: plain f64 on exponent-scaled rows,
//! then f64 with cancellation-guarded inner products, then MPFR floats
//! with doubling precision up to a configured ceiling. The exact integer
//! rows are the single source of truth throughout, so escalation rebuilds
//! state rather than propagating stale approximations.
//!
//! ```
//! use lattice_reduce::{is_reduced, reduce, LatticeBasis};
//!
//! let mut basis = LatticeBasis::from_rows(&[vec![101i64, 100], vec![100, 99]]);
//! let stats = reduce(&mut basis).unwrap();
//!
//! assert!(is_reduced(&basis, 0.75, 0.81));
//! assert_eq!(stats.zeros, 0);
//! ```
//!
//! Variants cover linearly dependent input (zero rows surface at the
//! front), removal of trailing rows below a Gram-Schmidt norm bound, and
//! knapsack lattices with an early exit once a candidate solution vector
//! reaches the front.

pub mod approx;
pub mod babai;
pub mod basis;
pub mod config;
pub mod error;
pub mod exact;
pub mod knapsack;
pub mod rational;
pub mod reduce;
pub mod removal;

pub use basis::LatticeBasis;
pub use config::ReduceConfig;
pub use error::{ReduceError, Result};
pub use knapsack::{knapsack_reduce, knapsack_reduce_with_removal};
pub use reduce::{is_reduced, reduce, Level, ReduceStats, Reducer};
pub use removal::RemovalReport;

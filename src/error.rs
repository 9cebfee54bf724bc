//! Error types for lattice reduction

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReduceError {
    #[error("basis is empty")]
    EmptyBasis,

    #[error("basis must be square: got {rows} rows of dimension {cols}")]
    NotSquare { rows: usize, cols: usize },

    #[error("delta must lie in (1/4, 1): got {0}")]
    InvalidDelta(f64),

    #[error("eta must lie in [1/2, 1): got {0}")]
    InvalidEta(f64),

    #[error("delta {delta} must exceed eta^2 (eta = {eta})")]
    DeltaBelowEtaSquared { delta: f64, eta: f64 },

    #[error("initial precision {initial} exceeds maximum precision {max}")]
    InvalidPrecisionRange { initial: u32, max: u32 },

    #[error("could not certify reduction at {precision} bits of precision")]
    PrecisionExhausted { precision: u32 },
}

pub type Result<T> = std::result::Result<T, ReduceError>;

//! Reduction configuration parameters

use crate::error::{ReduceError, Result};

/// Configuration for the adaptive LLL reduction engine
#[derive(Debug, Clone)]
pub struct ReduceConfig {
    /// Lovász parameter δ (default 0.75).
    /// Must be in (1/4, 1). Higher values give better reduction but slower.
    pub delta: f64,
    /// Size-reduction parameter η (default 0.81).
    /// Must be in [1/2, 1). Babai rounding drives every |μ_kj| below this.
    pub eta: f64,
    /// Working precision (bits) of the first arbitrary-precision level.
    /// Only reached after both double-precision levels fail.
    pub initial_precision: u32,
    /// Precision ceiling (bits). Escalation beyond this is a fatal error.
    pub max_precision: u32,
    /// Maximum passes of the Babai rounding loop for one row before the
    /// active backend gives up on certifying that row.
    pub babai_loop_cap: usize,
    /// Maximum main-loop iterations per precision level (safety limit)
    pub max_iterations: usize,
    /// Verbosity level (0 = silent, 1 = summary, 2 = detailed)
    pub verbose: u32,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            delta: 0.75,
            eta: 0.81,
            initial_precision: 64,
            max_precision: 16_384,
            babai_loop_cap: 32,
            max_iterations: 1_000_000,
            verbose: 0,
        }
    }
}

impl ReduceConfig {
    /// Create config with δ = 0.99 (strong reduction)
    pub fn strong() -> Self {
        Self {
            delta: 0.99,
            ..Default::default()
        }
    }

    /// Create config with δ = 0.51 (fast but weaker reduction).
    /// η is tightened to keep δ > η², which the floating-point engine
    /// needs so size reduction can still force Lovász failures.
    pub fn fast() -> Self {
        Self {
            delta: 0.51,
            eta: 0.55,
            ..Default::default()
        }
    }

    /// Check that all parameters are inside their valid ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.delta > 0.25 && self.delta < 1.0) {
            return Err(ReduceError::InvalidDelta(self.delta));
        }
        if !(self.eta >= 0.5 && self.eta < 1.0) {
            return Err(ReduceError::InvalidEta(self.eta));
        }
        // A dependent row with delta <= mu^2 <= eta^2 passes both size
        // reduction and the Lovász test, so it would never swap to the
        // front and be detected as zero
        if self.delta <= self.eta * self.eta {
            return Err(ReduceError::DeltaBelowEtaSquared {
                delta: self.delta,
                eta: self.eta,
            });
        }
        if self.initial_precision > self.max_precision {
            return Err(ReduceError::InvalidPrecisionRange {
                initial: self.initial_precision,
                max: self.max_precision,
            });
        }
        Ok(())
    }
}

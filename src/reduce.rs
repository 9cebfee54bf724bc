//! Adaptive-precision LLL driver
//!
//! The engine runs the classic LLL state machine (size-reduce row kappa,
//! test Lovász, advance or swap-and-retreat) on top of a precision
//! backend, and escalates through backends whenever the active one can
//! no longer certify its answers:
//!
//! ```text
//! plain double -> guarded double -> MPFR at p bits -> MPFR at 2p bits -> ...
//! ```
//!
//! Escalation carries the loop state over: the new backend re-derives
//! its approximation of the already-certified rows from the exact
//! integers (never from the failed level's floats) and resumes at the
//! same kappa, so a failed level costs one re-derivation pass rather
//! than a restart. Running out of precision below `max_precision` is a
//! fatal error rather than a silently unreduced basis.

use crate::babai::{BigFloatChecker, Checker, DoubleChecker, Lovasz, RowStatus};
use crate::basis::LatticeBasis;
use crate::config::ReduceConfig;
use crate::error::{ReduceError, Result};
use crate::exact::{to_fraction, ExactGram};
use crate::removal::{prune_trailing, RemovalReport};
use num_bigint::BigInt;
use std::fmt;
use std::time::{Duration, Instant};

/// Precision level currently driving the reduction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    /// Plain f64 arithmetic on scaled rows
    #[default]
    Double,
    /// f64 with cancellation-guarded products and an uncertainty margin
    Heuristic,
    /// MPFR floats at the given precision in bits
    BigFloat(u32),
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Double => write!(f, "double"),
            Level::Heuristic => write!(f, "heuristic"),
            Level::BigFloat(p) => write!(f, "bigfloat({} bits)", p),
        }
    }
}

/// Counters and timing collected over one reduction
#[derive(Debug, Clone, Default)]
pub struct ReduceStats {
    /// Main-loop iterations across all levels
    pub iterations: usize,
    /// Row swaps from failed Lovász tests
    pub swaps: usize,
    /// Integer row operations from Babai rounding
    pub size_reductions: usize,
    /// Number of precision escalations taken
    pub escalations: usize,
    /// Leading zero rows found (linearly dependent input)
    pub zeros: usize,
    /// Level that certified the final basis
    pub final_level: Level,
    /// Wall-clock time of the whole run
    pub total_time: Duration,
}

enum Outcome {
    Done,
    Escalate,
}

/// Loop state carried across precision levels: escalation resumes at
/// the same kappa instead of restarting from the front
struct LoopState {
    kappa: usize,
    zeros: usize,
    /// alpha[k]: first column whose mu may be stale when row k is next
    /// certified; lets the Babai pass skip columns already settled
    alpha: Vec<usize>,
}

/// Early-stop predicate for variants that can quit before full
/// reduction; consulted whenever the front nonzero row changes
pub(crate) type StopFn = dyn Fn(&LatticeBasis, usize) -> bool;

/// The adaptive reduction engine
pub struct Reducer {
    config: ReduceConfig,
}

impl Default for Reducer {
    fn default() -> Self {
        Self {
            config: ReduceConfig::default(),
        }
    }
}

impl Reducer {
    pub fn new(config: ReduceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReduceConfig {
        &self.config
    }

    /// Reduce the basis in place. On success every nonzero row satisfies
    /// the size-reduction bound and consecutive rows satisfy the Lovász
    /// condition; zero rows produced by dependent input sit at the front.
    pub fn reduce(&self, basis: &mut LatticeBasis) -> Result<ReduceStats> {
        let start = Instant::now();
        let mut stats = ReduceStats::default();
        let (_, zeros) = self.reduce_inner(basis, &mut stats, None)?;
        stats.zeros = zeros;
        stats.total_time = start.elapsed();
        self.log_summary(&stats);
        Ok(stats)
    }

    /// Reduce while recording the unimodular transform, returned as an
    /// integer matrix U with `B_out = U * B_in`
    pub fn reduce_with_transform(
        &self,
        basis: &mut LatticeBasis,
    ) -> Result<(Vec<Vec<BigInt>>, ReduceStats)> {
        basis.enable_transform();
        let stats = self.reduce(basis)?;
        let u = basis.take_transform().unwrap_or_default();
        Ok((u, stats))
    }

    /// Reduce, then drop trailing rows whose Gram-Schmidt norm falls
    /// below `bound` (squared-norm threshold, exact integer)
    pub fn reduce_with_removal(
        &self,
        basis: &mut LatticeBasis,
        bound: &BigInt,
    ) -> Result<(ReduceStats, RemovalReport)> {
        let start = Instant::now();
        let mut stats = ReduceStats::default();
        let (checker, zeros) = self.reduce_inner(basis, &mut stats, None)?;
        stats.zeros = zeros;

        let report = prune_trailing(checker.as_ref(), basis, bound, zeros);
        stats.total_time = start.elapsed();
        self.log_summary(&stats);
        if self.config.verbose >= 1 && report.removed > 0 {
            eprintln!("lattice-reduce: removed {} trailing rows", report.removed);
        }
        Ok((stats, report))
    }

    fn log_summary(&self, stats: &ReduceStats) {
        if self.config.verbose >= 1 {
            eprintln!(
                "lattice-reduce: {} iterations, {} swaps, {} row ops, {} escalations, final level {}, {:?}",
                stats.iterations,
                stats.swaps,
                stats.size_reductions,
                stats.escalations,
                stats.final_level,
                stats.total_time,
            );
        }
    }

    /// Run the level ladder to completion, returning the last checker
    /// (its Gram-Schmidt data is needed for removal) and the zero count
    pub(crate) fn reduce_inner(
        &self,
        basis: &mut LatticeBasis,
        stats: &mut ReduceStats,
        stop: Option<&StopFn>,
    ) -> Result<(Box<dyn Checker>, usize)> {
        if basis.n == 0 {
            return Err(ReduceError::EmptyBasis);
        }
        if basis.n != basis.m {
            return Err(ReduceError::NotSquare {
                rows: basis.n,
                cols: basis.m,
            });
        }

        let n = basis.n;
        let mut zeros = 0;
        while zeros < n && basis.row_is_zero(zeros) {
            zeros += 1;
        }

        let mut state = LoopState {
            kappa: (zeros + 1).min(n),
            zeros,
            alpha: vec![zeros; n],
        };
        let mut level = Level::Double;

        loop {
            let mut checker: Box<dyn Checker> = match level {
                Level::Double => Box::new(DoubleChecker::new(
                    basis,
                    self.config.eta,
                    self.config.babai_loop_cap,
                    false,
                )),
                Level::Heuristic => Box::new(DoubleChecker::new(
                    basis,
                    self.config.eta,
                    self.config.babai_loop_cap,
                    true,
                )),
                Level::BigFloat(p) => Box::new(BigFloatChecker::new(
                    basis,
                    p,
                    self.config.eta,
                    self.config.babai_loop_cap,
                )),
            };

            match self.run_level(basis, checker.as_mut(), &mut state, stats, stop) {
                Outcome::Done => {
                    stats.final_level = level;
                    return Ok((checker, state.zeros));
                }
                Outcome::Escalate => {
                    stats.escalations += 1;
                    let next = self.next_level(level)?;
                    if self.config.verbose >= 1 {
                        eprintln!(
                            "lattice-reduce: escalating {} -> {} at row {}",
                            level, next, state.kappa
                        );
                    }
                    level = next;
                }
            }
        }
    }

    fn next_level(&self, level: Level) -> Result<Level> {
        Ok(match level {
            Level::Double => Level::Heuristic,
            Level::Heuristic => Level::BigFloat(self.config.initial_precision),
            Level::BigFloat(p) => {
                if p >= self.config.max_precision {
                    return Err(ReduceError::PrecisionExhausted { precision: p });
                }
                Level::BigFloat(p.saturating_mul(2).min(self.config.max_precision))
            }
        })
    }

    /// Run the LLL state machine at one precision level, resuming from
    /// the carried state. Returns Escalate with the state intact so the
    /// next level picks up where this one gave up.
    fn run_level(
        &self,
        basis: &mut LatticeBasis,
        checker: &mut dyn Checker,
        state: &mut LoopState,
        stats: &mut ReduceStats,
        stop: Option<&StopFn>,
    ) -> Outcome {
        let n = basis.n;

        if n - state.zeros <= 1 {
            // Nothing to pairwise-reduce; still derive the lone row's
            // Gram-Schmidt norm so removal has data to work with
            if state.zeros < n
                && checker.recompute_prefix(basis, n, state.zeros)
                    == RowStatus::PrecisionInsufficient
            {
                return Outcome::Escalate;
            }
            return Outcome::Done;
        }

        // Fresh backend: re-derive the certified prefix from the exact
        // rows. Rows at or above kappa have no derived prefix at this
        // level, so their cached start columns are void.
        for a in state.alpha.iter_mut().skip(state.kappa) {
            *a = state.zeros;
        }
        if checker.recompute_prefix(basis, state.kappa, state.zeros)
            == RowStatus::PrecisionInsufficient
        {
            return Outcome::Escalate;
        }

        if let Some(f) = stop {
            if f(basis, state.zeros) {
                return Outcome::Done;
            }
        }

        let mut iterations = 0usize;
        loop {
            iterations += 1;
            stats.iterations += 1;
            if iterations > self.config.max_iterations {
                return Outcome::Escalate;
            }

            match checker.reduce_row(basis, state.kappa, state.alpha[state.kappa], state.zeros, stats)
            {
                RowStatus::PrecisionInsufficient => return Outcome::Escalate,

                RowStatus::ZeroVector => {
                    // Rotate the dead row to the front and restart the
                    // machine on the shrunken active block
                    for i in (state.zeros + 1..=state.kappa).rev() {
                        basis.swap(i - 1, i);
                    }
                    state.zeros += 1;
                    if n - state.zeros <= 1 {
                        if state.zeros < n
                            && checker.recompute_prefix(basis, n, state.zeros)
                                == RowStatus::PrecisionInsufficient
                        {
                            return Outcome::Escalate;
                        }
                        return Outcome::Done;
                    }
                    state.kappa = state.zeros + 1;
                    for a in state.alpha.iter_mut() {
                        *a = state.zeros;
                    }
                    if checker.recompute_prefix(basis, state.kappa, state.zeros)
                        == RowStatus::PrecisionInsufficient
                    {
                        return Outcome::Escalate;
                    }
                }

                RowStatus::Reduced => {
                    match checker.lovasz(state.kappa, state.zeros, self.config.delta) {
                        Lovasz::Uncertain => return Outcome::Escalate,

                        Lovasz::Holds => {
                            checker.accept_row(state.kappa, state.zeros);
                            state.alpha[state.kappa] = state.kappa;
                            state.kappa += 1;
                            if state.kappa == n {
                                return Outcome::Done;
                            }
                        }

                        Lovasz::Fails => {
                            stats.swaps += 1;
                            checker.swap_rows(basis, state.kappa, state.zeros);

                            let kappa = state.kappa;
                            let a = state.alpha[kappa]
                                .min(state.alpha[kappa - 1])
                                .min(kappa - 1);
                            state.alpha[kappa - 1] = a;
                            state.alpha[kappa] = a;
                            for item in state.alpha.iter_mut().skip(kappa + 1) {
                                *item = (*item).min(kappa - 1);
                            }

                            if kappa - 1 == state.zeros {
                                if let Some(f) = stop {
                                    if f(basis, state.zeros) {
                                        return Outcome::Done;
                                    }
                                }
                            }
                            state.kappa = (kappa - 1).max(state.zeros + 1);
                        }
                    }
                }
            }
        }
    }
}

/// Convenience: reduce with default parameters (δ = 0.75, η = 0.81)
pub fn reduce(basis: &mut LatticeBasis) -> Result<ReduceStats> {
    Reducer::default().reduce(basis)
}

/// Verify in exact rational arithmetic that the nonzero rows of a basis
/// are LLL-reduced for the given parameters
pub fn is_reduced(basis: &LatticeBasis, delta: f64, eta: f64) -> bool {
    let mut zeros = 0;
    while zeros < basis.n && basis.row_is_zero(zeros) {
        zeros += 1;
    }
    if basis.n - zeros <= 1 {
        return true;
    }

    let gs = ExactGram::compute(basis, zeros);
    let (delta_num, delta_den) = to_fraction(delta);
    let (eta_num, eta_den) = to_fraction(eta);

    for i in 1..gs.n {
        if !gs.check_lovasz(i, delta_num, delta_den) {
            return false;
        }
        for j in 0..i {
            if !gs.size_reduced_at(i, j, eta_num, eta_den) {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::Zero;

    #[test]
    fn test_identity_basis_unchanged() {
        let mut basis = LatticeBasis::from_rows(&[vec![1i64, 0], vec![0, 1]]);
        let stats = reduce(&mut basis).unwrap();

        assert_eq!(stats.swaps, 0);
        assert_eq!(stats.zeros, 0);
        assert_eq!(stats.final_level, Level::Double);
        assert_eq!(basis.get(0), &[BigInt::from(1), BigInt::from(0)]);
        assert_eq!(basis.get(1), &[BigInt::from(0), BigInt::from(1)]);
        assert!(is_reduced(&basis, 0.75, 0.81));
    }

    #[test]
    fn test_orthogonal_basis_unchanged() {
        let mut basis = LatticeBasis::from_rows(&[vec![1i64, 1], vec![1, -1]]);
        let stats = reduce(&mut basis).unwrap();

        assert_eq!(stats.swaps, 0);
        assert_eq!(basis.get(0), &[BigInt::from(1), BigInt::from(1)]);
        assert!(is_reduced(&basis, 0.75, 0.81));
    }

    #[test]
    fn test_near_parallel_basis_shrinks() {
        let mut basis = LatticeBasis::from_rows(&[vec![101i64, 100], vec![100, 99]]);
        let stats = reduce(&mut basis).unwrap();

        // det = -1, so the lattice is all of Z^2 and both reduced
        // vectors have unit norm
        assert_eq!(basis.norm_squared(0), BigInt::from(1));
        assert_eq!(basis.norm_squared(1), BigInt::from(1));
        assert!(stats.swaps >= 1);
        assert!(is_reduced(&basis, 0.75, 0.81));
    }

    #[test]
    fn test_front_row_beats_small_combinations() {
        let original = LatticeBasis::from_rows(&[vec![101i64, 100], vec![100, 99]]);
        let mut basis = original.clone();
        reduce(&mut basis).unwrap();

        let front = basis.norm_squared(0);
        for x in -5i64..=5 {
            for y in -5i64..=5 {
                if x == 0 && y == 0 {
                    continue;
                }
                let combo: Vec<BigInt> = (0..2)
                    .map(|k| {
                        &original.vectors[0][k] * x + &original.vectors[1][k] * y
                    })
                    .collect();
                let norm: BigInt = combo.iter().map(|c| c * c).sum();
                assert!(front <= norm, "({}, {}) gives a shorter vector", x, y);
            }
        }
    }

    #[test]
    fn test_idempotent_on_reduced_basis() {
        let mut basis = LatticeBasis::from_rows(&[vec![101i64, 100], vec![100, 99]]);
        reduce(&mut basis).unwrap();
        let snapshot = basis.vectors.clone();

        let stats = reduce(&mut basis).unwrap();
        assert_eq!(stats.swaps, 0);
        assert_eq!(stats.size_reductions, 0);
        assert_eq!(basis.vectors, snapshot);
    }

    #[test]
    fn test_dependent_row_rotated_to_front() {
        // Row 1 is twice row 0, so the generating set has rank 2
        let mut basis = LatticeBasis::from_rows(&[
            vec![2i64, 3, 0],
            vec![4, 6, 0],
            vec![1, 0, 1],
        ]);
        let stats = reduce(&mut basis).unwrap();

        assert_eq!(stats.zeros, 1);
        assert!(basis.row_is_zero(0));
        assert!(!basis.row_is_zero(1));
        assert!(is_reduced(&basis, 0.75, 0.81));
    }

    #[test]
    fn test_rejects_non_square_basis() {
        let mut basis = LatticeBasis::from_rows(&[vec![1i64, 2, 3], vec![4, 5, 6]]);
        assert!(matches!(
            reduce(&mut basis),
            Err(ReduceError::NotSquare { rows: 2, cols: 3 })
        ));
    }

    #[test]
    fn test_lattice_invariant_under_reduction() {
        let basis = LatticeBasis::from_rows(&[
            vec![12i64, -3, 7, 1],
            vec![5, 9, -2, 4],
            vec![-8, 2, 11, 6],
            vec![3, 3, 3, 10],
        ]);
        let det_before = ExactGram::compute(&basis, 0).gram_determinant();

        let mut reduced = basis.clone();
        reduce(&mut reduced).unwrap();

        let det_after = ExactGram::compute(&reduced, 0).gram_determinant();
        assert_eq!(det_before, det_after);
        assert!(is_reduced(&reduced, 0.74, 0.82));
    }

    #[test]
    fn test_random_bases_reduce() {
        for trial in 0..5usize {
            let mut basis = LatticeBasis::random(5, 5, 12 + trial);
            let det_before = ExactGram::compute(&basis, 0).gram_determinant();
            reduce(&mut basis).unwrap();

            let mut zeros = 0;
            while zeros < basis.n && basis.row_is_zero(zeros) {
                zeros += 1;
            }
            let det_after = ExactGram::compute(&basis, zeros).gram_determinant();
            if zeros == 0 {
                assert_eq!(det_before, det_after);
            }
            assert!(is_reduced(&basis, 0.74, 0.82));
        }
    }

    #[test]
    fn test_transform_tracks_reduction() {
        let original = LatticeBasis::from_rows(&[vec![101i64, 100], vec![100, 99]]);
        let mut basis = original.clone();
        let (u, _) = Reducer::default()
            .reduce_with_transform(&mut basis)
            .unwrap();

        for i in 0..2 {
            for k in 0..2 {
                let mut acc = BigInt::zero();
                for j in 0..2 {
                    acc += &u[i][j] * &original.vectors[j][k];
                }
                assert_eq!(acc, basis.vectors[i][k]);
            }
        }
    }

    #[test]
    fn test_large_entries_reduce() {
        // ~200-bit entries exercise the exponent scaling end to end
        let scale = BigInt::from(1) << 200;
        let mut basis = LatticeBasis::new(vec![
            vec![&scale * 101, &scale * 100],
            vec![&scale * 100, &scale * 99],
        ]);
        reduce(&mut basis).unwrap();
        assert!(is_reduced(&basis, 0.74, 0.82));
        assert_eq!(basis.norm_squared(0), &scale * &scale);
    }

    #[test]
    fn test_level_ladder() {
        let reducer = Reducer::new(ReduceConfig {
            initial_precision: 64,
            max_precision: 256,
            ..Default::default()
        })
        .unwrap();

        assert_eq!(reducer.next_level(Level::Double).unwrap(), Level::Heuristic);
        assert_eq!(
            reducer.next_level(Level::Heuristic).unwrap(),
            Level::BigFloat(64)
        );
        assert_eq!(
            reducer.next_level(Level::BigFloat(64)).unwrap(),
            Level::BigFloat(128)
        );
        assert_eq!(
            reducer.next_level(Level::BigFloat(128)).unwrap(),
            Level::BigFloat(256)
        );
        assert!(matches!(
            reducer.next_level(Level::BigFloat(256)),
            Err(ReduceError::PrecisionExhausted { precision: 256 })
        ));
    }

    #[test]
    fn test_precision_exhausted_is_fatal() {
        // An iteration budget of zero makes every level give up before
        // certifying anything, so the ladder runs out at max_precision
        let reducer = Reducer::new(ReduceConfig {
            max_iterations: 0,
            initial_precision: 64,
            max_precision: 64,
            ..Default::default()
        })
        .unwrap();

        let mut basis = LatticeBasis::from_rows(&[vec![2i64, 0], vec![11, 1]]);
        let err = reducer.reduce(&mut basis).unwrap_err();
        assert!(matches!(
            err,
            ReduceError::PrecisionExhausted { precision: 64 }
        ));
    }

    #[test]
    fn test_escalation_carries_progress_forward() {
        // The 60-bit quotient needs two Babai passes at double precision
        // (the f64 image drops the low bits of m, so the first quotient
        // is off by one), and a cap of 2 leaves no settling pass. The
        // next level inherits the partially reduced rows and finishes.
        let m = (1i64 << 59) + 1;
        let mut basis = LatticeBasis::from_rows(&[vec![1i64, 0], vec![m, 1]]);
        let reducer = Reducer::new(ReduceConfig {
            babai_loop_cap: 2,
            ..Default::default()
        })
        .unwrap();

        let stats = reducer.reduce(&mut basis).unwrap();
        assert!(stats.escalations >= 1);
        assert_ne!(stats.final_level, Level::Double);
        assert_eq!(basis.get(0), &[BigInt::from(1), BigInt::from(0)]);
        assert_eq!(basis.get(1), &[BigInt::from(0), BigInt::from(1)]);
        assert!(is_reduced(&basis, 0.75, 0.81));
    }

    #[test]
    fn test_fast_config_detects_dependent_rows() {
        // mu = 4/5 gives mu^2 = 0.64 >= delta, so with a large eta the
        // dependent row would pass both tests untouched and survive.
        // fast()'s eta forces the size reduction that exposes it.
        let mut basis = LatticeBasis::from_rows(&[vec![5i64, 0], vec![4, 0]]);
        let reducer = Reducer::new(ReduceConfig::fast()).unwrap();
        let stats = reducer.reduce(&mut basis).unwrap();

        assert_eq!(stats.zeros, 1);
        assert!(basis.row_is_zero(0));
        assert!(!basis.row_is_zero(1));
    }

    #[test]
    fn test_empty_basis_rejected() {
        let mut basis = LatticeBasis::new(Vec::new());
        assert!(matches!(reduce(&mut basis), Err(ReduceError::EmptyBasis)));
    }

    #[test]
    fn test_removal_drops_short_gs_rows() {
        // Diagonal basis is already reduced (ratios stay above delta);
        // squared GS norms are 10000, 8100, 6400, 4900
        let mut basis = LatticeBasis::from_rows(&[
            vec![100i64, 0, 0, 0],
            vec![0, 90, 0, 0],
            vec![0, 0, 80, 0],
            vec![0, 0, 0, 70],
        ]);
        let reducer = Reducer::default();
        let (stats, report) = reducer
            .reduce_with_removal(&mut basis, &BigInt::from(5000))
            .unwrap();

        assert_eq!(stats.swaps, 0);
        assert_eq!(report.removed, 1);
        assert_eq!(basis.n, 3);
        // Smallest survivor is 80^2 = 6400
        assert!((report.min_surviving_gs_log2 - (6400f64).log2()).abs() < 1e-6);
    }

    #[test]
    fn test_removal_keeps_everything_above_bound() {
        let mut basis = LatticeBasis::from_rows(&[vec![100i64, 0], vec![0, 90]]);
        let reducer = Reducer::default();
        let (_, report) = reducer
            .reduce_with_removal(&mut basis, &BigInt::from(10))
            .unwrap();
        assert_eq!(report.removed, 0);
        assert_eq!(basis.n, 2);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ReduceConfig {
            delta: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            Reducer::new(config),
            Err(ReduceError::InvalidDelta(_))
        ));
    }

    #[test]
    fn test_strong_delta_gives_reduced_basis() {
        let mut basis = LatticeBasis::from_rows(&[
            vec![15i64, 23, 11],
            vec![46, 15, 3],
            vec![32, 1, 1],
        ]);
        let reducer = Reducer::new(ReduceConfig::strong()).unwrap();
        reducer.reduce(&mut basis).unwrap();
        assert!(is_reduced(&basis, 0.98, 0.82));
    }

    #[test]
    fn test_single_row_basis() {
        let mut basis = LatticeBasis::from_rows(&[vec![7i64]]);
        let stats = reduce(&mut basis).unwrap();
        assert_eq!(stats.swaps, 0);
        assert_eq!(basis.get(0), &[BigInt::from(7)]);
    }

    #[test]
    fn test_all_zero_basis() {
        let mut basis = LatticeBasis::from_rows(&[vec![0i64, 0], vec![0, 0]]);
        let stats = reduce(&mut basis).unwrap();
        assert_eq!(stats.zeros, 2);
    }
}

//! Structural configuration errors.
//!
//! The engine never fails on individual malformed cells: a missing or
//! non-numeric measurement degrades to a missing z-score and drops out of
//! every rule window. The only caller-visible failures are structural —
//! a matrix whose rows disagree with the configured level count, an empty
//! matrix, or a level count outside the supported {2, 3}. These are
//! raised by constructors and conversions, never by detection or
//! aggregation.

use thiserror::Error;

/// Errors raised while assembling evaluation inputs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// The z-score matrix contains no runs.
    #[error("z-score matrix contains no runs")]
    EmptyMatrix,

    /// A run's cell count disagrees with the configured level count.
    #[error("run {run} has {found} level columns, expected {expected}")]
    LevelCountMismatch {
        /// Zero-based index of the offending run.
        run: usize,
        /// Configured number of QC levels.
        expected: usize,
        /// Number of cells actually present in the run.
        found: usize,
    },

    /// The configured number of QC levels is not 2 or 3.
    #[error("unsupported QC level count: {0} (expected 2 or 3)")]
    UnsupportedLevelCount(usize),

    /// Reference statistics were supplied for a different number of levels.
    #[error("got {found} reference stat entries, expected {expected}")]
    StatsCountMismatch {
        /// Configured number of QC levels.
        expected: usize,
        /// Number of reference stat entries supplied.
        found: usize,
    },
}

//! Run × control-level z-score matrix.
//!
//! The matrix is the engine's sole input: rows are IQC runs in temporal
//! order, columns are the 2 or 3 QC control levels measured in parallel.
//! Cells hold a standardized z-score or "missing" (no measurement, or a
//! measurement that could not be standardized).
//!
//! # Invariants
//!
//! - Every run has exactly `levels.as_usize()` cells.
//! - The matrix is never empty.
//! - Row order is the temporal order and is never reordered internally;
//!   run labels are opaque display strings and play no part in ordering.
//! - All present cells are finite (non-finite inputs are demoted to
//!   missing at construction).

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::zscore::{zscore, ReferenceStats};

/// Number of QC control levels evaluated in parallel.
///
/// Westgard schemes are defined for 2-level and 3-level QC designs;
/// other counts are rejected at the configuration boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelCount {
    /// Two control levels (e.g. normal / pathological).
    Two,
    /// Three control levels (e.g. low / normal / high).
    Three,
}

impl LevelCount {
    /// The number of level columns as a plain integer.
    pub const fn as_usize(self) -> usize {
        match self {
            LevelCount::Two => 2,
            LevelCount::Three => 3,
        }
    }
}

impl TryFrom<usize> for LevelCount {
    type Error = EvalError;

    fn try_from(n: usize) -> Result<Self, EvalError> {
        match n {
            2 => Ok(LevelCount::Two),
            3 => Ok(LevelCount::Three),
            other => Err(EvalError::UnsupportedLevelCount(other)),
        }
    }
}

/// One IQC event: an opaque display label plus one value (or missing)
/// per control level.
///
/// Depending on context the values are raw measurements (before
/// [`ZMatrix::from_measurements`]) or z-scores (inside a [`ZMatrix`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QcRun {
    /// Caller-supplied run label (date, sequence number, ...). Used only
    /// for labeling output, never for ordering.
    pub label: String,
    /// Per-level cells, indexed by 0-based control level.
    pub values: Vec<Option<f64>>,
}

impl QcRun {
    /// Creates a run from a label and its per-level cells.
    pub fn new(label: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            label: label.into(),
            values,
        }
    }
}

/// Ordered, validated z-score matrix (runs × control levels).
///
/// Constructed fresh from caller-supplied data on every evaluation pass
/// and immutable afterwards.
///
/// # Examples
///
/// ```
/// use iqc_core::westgard::{LevelCount, QcRun, ZMatrix};
///
/// let runs = vec![
///     QcRun::new("1", vec![Some(0.5), Some(-0.3)]),
///     QcRun::new("2", vec![Some(1.1), None]),
/// ];
/// let matrix = ZMatrix::new(runs, LevelCount::Two).unwrap();
/// assert_eq!(matrix.run_count(), 2);
/// assert_eq!(matrix.z(1, 1), None);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ZMatrix {
    runs: Vec<QcRun>,
    levels: LevelCount,
}

impl ZMatrix {
    /// Builds a matrix from per-run z-score rows.
    ///
    /// Validates the structural invariants (non-empty, uniform row
    /// width) and demotes any non-finite cell to missing.
    ///
    /// # Errors
    ///
    /// [`EvalError::EmptyMatrix`] if `runs` is empty;
    /// [`EvalError::LevelCountMismatch`] if any run's cell count differs
    /// from `levels`.
    pub fn new(runs: Vec<QcRun>, levels: LevelCount) -> Result<Self, EvalError> {
        if runs.is_empty() {
            return Err(EvalError::EmptyMatrix);
        }
        let expected = levels.as_usize();
        for (i, run) in runs.iter().enumerate() {
            if run.values.len() != expected {
                return Err(EvalError::LevelCountMismatch {
                    run: i,
                    expected,
                    found: run.values.len(),
                });
            }
        }
        let runs: Vec<QcRun> = runs
            .into_iter()
            .map(|run| QcRun {
                label: run.label,
                values: run
                    .values
                    .into_iter()
                    .map(|v| v.filter(|v| v.is_finite()))
                    .collect(),
            })
            .collect();
        tracing::debug!(
            runs = runs.len(),
            levels = expected,
            "z-score matrix constructed"
        );
        Ok(Self { runs, levels })
    }

    /// Standardizes raw daily measurements into a z-score matrix.
    ///
    /// Each run's cells are converted with [`zscore`] against the
    /// per-level reference statistics; unstandardizable cells become
    /// missing.
    ///
    /// # Errors
    ///
    /// [`EvalError::StatsCountMismatch`] if `stats` does not supply one
    /// entry per level, plus the structural errors of [`ZMatrix::new`].
    ///
    /// # Examples
    ///
    /// ```
    /// use iqc_core::westgard::{LevelCount, QcRun, ZMatrix};
    /// use iqc_core::zscore::ReferenceStats;
    ///
    /// let stats = [ReferenceStats::new(100.0, 5.0), ReferenceStats::new(200.0, 10.0)];
    /// let runs = vec![QcRun::new("d1", vec![Some(110.0), Some(190.0)])];
    /// let matrix = ZMatrix::from_measurements(&runs, &stats, LevelCount::Two).unwrap();
    /// assert_eq!(matrix.z(0, 0), Some(2.0));
    /// assert_eq!(matrix.z(0, 1), Some(-1.0));
    /// ```
    pub fn from_measurements(
        runs: &[QcRun],
        stats: &[ReferenceStats],
        levels: LevelCount,
    ) -> Result<Self, EvalError> {
        let expected = levels.as_usize();
        if stats.len() != expected {
            return Err(EvalError::StatsCountMismatch {
                expected,
                found: stats.len(),
            });
        }
        let z_runs: Vec<QcRun> = runs
            .iter()
            .map(|run| {
                // Width mismatches surface in ZMatrix::new; only zip
                // cells that have a matching stats entry.
                let z_cells = run
                    .values
                    .iter()
                    .zip(stats)
                    .map(|(&v, s)| zscore(v, s))
                    .collect();
                QcRun::new(run.label.clone(), z_cells)
            })
            .collect();
        // Re-check widths against the raw rows so a short row is
        // reported rather than silently truncated by the zip.
        for (i, run) in runs.iter().enumerate() {
            if run.values.len() != expected {
                return Err(EvalError::LevelCountMismatch {
                    run: i,
                    expected,
                    found: run.values.len(),
                });
            }
        }
        Self::new(z_runs, levels)
    }

    /// The configured level count.
    pub fn levels(&self) -> LevelCount {
        self.levels
    }

    /// Number of level columns.
    pub fn level_count(&self) -> usize {
        self.levels.as_usize()
    }

    /// Number of runs (rows).
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// The runs in temporal order.
    pub fn runs(&self) -> &[QcRun] {
        &self.runs
    }

    /// Display label of a run.
    pub fn label(&self, run: usize) -> &str {
        &self.runs[run].label
    }

    /// The z-score at (run, level), or `None` if missing.
    pub fn z(&self, run: usize, level: usize) -> Option<f64> {
        self.runs[run].values[level]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_count_conversions() {
        assert_eq!(LevelCount::try_from(2), Ok(LevelCount::Two));
        assert_eq!(LevelCount::try_from(3), Ok(LevelCount::Three));
        assert_eq!(
            LevelCount::try_from(1),
            Err(EvalError::UnsupportedLevelCount(1))
        );
        assert_eq!(
            LevelCount::try_from(4),
            Err(EvalError::UnsupportedLevelCount(4))
        );
        assert_eq!(LevelCount::Two.as_usize(), 2);
        assert_eq!(LevelCount::Three.as_usize(), 3);
    }

    #[test]
    fn test_empty_matrix_rejected() {
        let result = ZMatrix::new(vec![], LevelCount::Two);
        assert_eq!(result.unwrap_err(), EvalError::EmptyMatrix);
    }

    #[test]
    fn test_row_width_mismatch_rejected() {
        let runs = vec![
            QcRun::new("1", vec![Some(0.1), Some(0.2)]),
            QcRun::new("2", vec![Some(0.1)]),
        ];
        let result = ZMatrix::new(runs, LevelCount::Two);
        assert_eq!(
            result.unwrap_err(),
            EvalError::LevelCountMismatch {
                run: 1,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_non_finite_cells_demoted_to_missing() {
        let runs = vec![QcRun::new(
            "1",
            vec![Some(f64::NAN), Some(f64::INFINITY), Some(1.0)],
        )];
        let matrix = ZMatrix::new(runs, LevelCount::Three).expect("valid matrix");
        assert_eq!(matrix.z(0, 0), None);
        assert_eq!(matrix.z(0, 1), None);
        assert_eq!(matrix.z(0, 2), Some(1.0));
    }

    #[test]
    fn test_accessors() {
        let runs = vec![
            QcRun::new("mon", vec![Some(0.5), None]),
            QcRun::new("tue", vec![Some(-1.5), Some(2.5)]),
        ];
        let matrix = ZMatrix::new(runs, LevelCount::Two).expect("valid matrix");
        assert_eq!(matrix.run_count(), 2);
        assert_eq!(matrix.level_count(), 2);
        assert_eq!(matrix.levels(), LevelCount::Two);
        assert_eq!(matrix.label(0), "mon");
        assert_eq!(matrix.label(1), "tue");
        assert_eq!(matrix.z(0, 1), None);
        assert_eq!(matrix.z(1, 1), Some(2.5));
        assert_eq!(matrix.runs().len(), 2);
    }

    #[test]
    fn test_from_measurements_standardizes_per_level() {
        let stats = [
            ReferenceStats::new(100.0, 5.0),
            ReferenceStats::new(200.0, 10.0),
        ];
        let runs = vec![
            QcRun::new("1", vec![Some(105.0), Some(180.0)]),
            QcRun::new("2", vec![None, Some(230.0)]),
        ];
        let matrix =
            ZMatrix::from_measurements(&runs, &stats, LevelCount::Two).expect("valid input");
        assert_eq!(matrix.z(0, 0), Some(1.0));
        assert_eq!(matrix.z(0, 1), Some(-2.0));
        assert_eq!(matrix.z(1, 0), None);
        assert_eq!(matrix.z(1, 1), Some(3.0));
        assert_eq!(matrix.label(0), "1");
    }

    #[test]
    fn test_from_measurements_degenerate_sd_becomes_missing() {
        let stats = [
            ReferenceStats::new(100.0, 0.0),
            ReferenceStats::new(200.0, 10.0),
        ];
        let runs = vec![QcRun::new("1", vec![Some(105.0), Some(210.0)])];
        let matrix =
            ZMatrix::from_measurements(&runs, &stats, LevelCount::Two).expect("valid input");
        assert_eq!(matrix.z(0, 0), None);
        assert_eq!(matrix.z(0, 1), Some(1.0));
    }

    #[test]
    fn test_from_measurements_stats_count_mismatch() {
        let stats = [ReferenceStats::new(100.0, 5.0)];
        let runs = vec![QcRun::new("1", vec![Some(105.0), Some(210.0)])];
        let result = ZMatrix::from_measurements(&runs, &stats, LevelCount::Two);
        assert_eq!(
            result.unwrap_err(),
            EvalError::StatsCountMismatch {
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_from_measurements_short_row_reported() {
        let stats = [
            ReferenceStats::new(100.0, 5.0),
            ReferenceStats::new(200.0, 10.0),
        ];
        let runs = vec![QcRun::new("1", vec![Some(105.0)])];
        let result = ZMatrix::from_measurements(&runs, &stats, LevelCount::Two);
        assert_eq!(
            result.unwrap_err(),
            EvalError::LevelCountMismatch {
                run: 0,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_from_measurements_empty_rejected() {
        let stats = [
            ReferenceStats::new(100.0, 5.0),
            ReferenceStats::new(200.0, 10.0),
        ];
        let result = ZMatrix::from_measurements(&[], &stats, LevelCount::Two);
        assert_eq!(result.unwrap_err(), EvalError::EmptyMatrix);
    }
}

//! Z-score standardization against reference statistics.
//!
//! Converts a raw QC measurement into a standardized deviation
//!
//! ```text
//! z = (x - mean) / sd
//! ```
//!
//! using the per-level reference statistics supplied by the upstream
//! baseline step. Degenerate inputs — a missing or non-finite
//! measurement, a zero or non-finite SD — degrade to "missing" rather
//! than raising, so a run with a skipped measurement simply contributes
//! no evidence to any rule window.
//!
//! No clamping is applied here; restricting z-values to a display range
//! is the charting collaborator's concern.

use serde::{Deserialize, Serialize};

/// Reference statistics for one QC control level.
///
/// Produced by the upstream baseline-statistics step (sample mean and
/// sample SD with Bessel's correction); this engine only consumes the
/// two values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReferenceStats {
    /// Reference mean (target value) for the level.
    pub mean: f64,
    /// Reference standard deviation for the level.
    pub sd: f64,
}

impl ReferenceStats {
    /// Creates reference statistics from an explicit mean/SD pair.
    pub fn new(mean: f64, sd: f64) -> Self {
        Self { mean, sd }
    }

    /// Derives the SD from a target coefficient of variation (CV%).
    ///
    /// Laboratories often standardize against a quality-goal CV rather
    /// than the empirical SD:
    ///
    /// ```text
    /// sd = mean * cv_percent / 100
    /// ```
    ///
    /// # Examples
    ///
    /// ```
    /// use iqc_core::zscore::ReferenceStats;
    ///
    /// let stats = ReferenceStats::from_target_cv(50.0, 4.0);
    /// assert!((stats.sd - 2.0).abs() < 1e-12);
    /// ```
    pub fn from_target_cv(mean: f64, cv_percent: f64) -> Self {
        Self {
            mean,
            sd: mean * cv_percent / 100.0,
        }
    }
}

/// Standardizes one measurement against its level's reference statistics.
///
/// Returns `None` (missing) when:
///
/// - `value` is absent or non-finite (no measurement this run), or
/// - `stats.sd` is zero or non-finite (cannot standardize), or
/// - the resulting z-value is non-finite (e.g. non-finite mean).
///
/// # Examples
///
/// ```
/// use iqc_core::zscore::{zscore, ReferenceStats};
///
/// let stats = ReferenceStats::new(100.0, 5.0);
/// assert_eq!(zscore(Some(110.0), &stats), Some(2.0));
/// assert_eq!(zscore(None, &stats), None);
/// assert_eq!(zscore(Some(110.0), &ReferenceStats::new(100.0, 0.0)), None);
/// ```
pub fn zscore(value: Option<f64>, stats: &ReferenceStats) -> Option<f64> {
    let v = value.filter(|v| v.is_finite())?;
    if !stats.sd.is_finite() || stats.sd == 0.0 {
        return None;
    }
    let z = (v - stats.mean) / stats.sd;
    z.is_finite().then_some(z)
}

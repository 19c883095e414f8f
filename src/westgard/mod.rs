//! Westgard multi-rule IQC evaluation.
//!
//! Evaluates a series of internal-quality-control (IQC) runs against the
//! Westgard multi-rule scheme: the method's sigma metric selects the
//! active rejection rule set, each run's measurements are standardized
//! into z-scores, the rule engine scans the resulting matrix for
//! violations, and aggregation reduces the hits to per-run and per-point
//! verdicts.
//!
//! # Components
//!
//! - [`SigmaCategory`] / [`resolve`] — sigma score → category and
//!   rejection rule set
//! - [`ZMatrix`] — validated run × control-level z-score matrix
//! - [`detect`] — the sliding-window multi-rule violation scan
//! - [`aggregate`] — hit list → [`RunVerdict`] / [`PointVerdict`] tables
//! - [`evaluate`] — the full pipeline in one call
//!
//! # Examples
//!
//! ```
//! use iqc_core::westgard::{evaluate, LevelCount, QcRun, QcStatus, ZMatrix};
//! use iqc_core::zscore::ReferenceStats;
//!
//! let stats = [ReferenceStats::new(100.0, 5.0), ReferenceStats::new(200.0, 10.0)];
//! let runs = vec![
//!     QcRun::new("d1", vec![Some(101.0), Some(198.0)]),
//!     QcRun::new("d2", vec![Some(117.0), Some(204.0)]),
//! ];
//! let matrix = ZMatrix::from_measurements(&runs, &stats, LevelCount::Two)?;
//!
//! let evaluation = evaluate(&matrix, Some(5.5));
//! assert_eq!(evaluation.runs[0].status, QcStatus::Pass);
//! assert_eq!(evaluation.runs[1].status, QcStatus::Reject); // z = 3.4 → 1_3s
//! # Ok::<(), iqc_core::error::EvalError>(())
//! ```
//!
//! # References
//!
//! - Westgard, J.O. et al. (1981). "A Multi-Rule Shewhart Chart for
//!   Quality Control in Clinical Chemistry", *Clinical Chemistry* 27(3),
//!   pp. 493-501.
//! - CLSI C24 — Statistical Quality Control for Quantitative Measurement
//!   Procedures.

mod matrix;
mod rules;
mod sigma;
mod verdict;

pub use matrix::{LevelCount, QcRun, ZMatrix};
pub use rules::{detect, RuleCode, RuleHit, RuleSet};
pub use sigma::{resolve, rules_for, SigmaCategory};
pub use verdict::{aggregate, extract_rule_short, PointVerdict, QcStatus, RunVerdict};

use serde::{Deserialize, Serialize};

/// Complete result of one evaluation pass.
///
/// Carries the resolved sigma category and active rule set (for display
/// and report headers) alongside the verdict tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Sigma category the rule set was resolved from.
    pub category: SigmaCategory,
    /// Rejection rules that were active during detection.
    pub active_rules: RuleSet,
    /// Per-run verdicts, in matrix row order.
    pub runs: Vec<RunVerdict>,
    /// Per-(run, level) verdicts, row-major.
    pub points: Vec<PointVerdict>,
}

/// Runs the full evaluation pipeline over a z-score matrix.
///
/// Resolves the rule set from `sigma` and the matrix's level count,
/// detects every violation, and aggregates them into verdict tables.
/// Pure and synchronous; concurrent calls over distinct matrices are
/// safe.
pub fn evaluate(matrix: &ZMatrix, sigma: Option<f64>) -> Evaluation {
    let (category, active_rules) = resolve(sigma, matrix.levels());
    tracing::debug!(
        runs = matrix.run_count(),
        levels = matrix.level_count(),
        %category,
        rules = %active_rules.display_codes(),
        "evaluating Westgard rules"
    );
    let hits = detect(matrix, &active_rules);
    let (runs, points) = aggregate(&hits, matrix);
    Evaluation {
        category,
        active_rules,
        runs,
        points,
    }
}

//! Verdict aggregation.
//!
//! Folds the immutable hit list produced by detection into per-run and
//! per-point verdict tables. Separating the fold from detection keeps
//! both independently testable: detection is a pure function over the
//! matrix, aggregation a pure function over the hit list.
//!
//! Determinism: message sets are deduplicated and sorted, so identical
//! inputs always produce identical tables regardless of the order in
//! which hits were detected.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::matrix::ZMatrix;
use super::rules::RuleHit;

/// Three-way QC verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum QcStatus {
    /// No rule violated.
    Pass,
    /// Only the `1_2s` warning rule violated.
    Warning,
    /// At least one rejection rule violated.
    Reject,
}

impl fmt::Display for QcStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QcStatus::Pass => "Pass",
            QcStatus::Warning => "Warning (1_2s)",
            QcStatus::Reject => "Reject",
        };
        f.write_str(s)
    }
}

/// Verdict for one run across all its control levels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunVerdict {
    /// The run's display label.
    pub label: String,
    /// Aggregated status.
    pub status: QcStatus,
    /// Sorted, deduplicated rejection-rule messages.
    pub rejections: Vec<String>,
    /// Sorted, deduplicated warning messages.
    pub warnings: Vec<String>,
}

impl RunVerdict {
    /// All messages for display: rejections first, then warnings, each
    /// block sorted, joined with `"; "`.
    pub fn display(&self) -> String {
        join_messages(&self.rejections, &self.warnings)
    }
}

/// Verdict for one (run, control level) point.
///
/// Restricted to hits whose implicated level set contains this level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointVerdict {
    /// The run's display label.
    pub label: String,
    /// Zero-based control level index.
    pub level: usize,
    /// Aggregated status for this point.
    pub status: QcStatus,
    /// Sorted, deduplicated rejection-rule messages.
    pub rejections: Vec<String>,
    /// Sorted, deduplicated warning messages.
    pub warnings: Vec<String>,
}

impl PointVerdict {
    /// All messages for display, rejections before warnings.
    pub fn display(&self) -> String {
        join_messages(&self.rejections, &self.warnings)
    }

    /// The unique rule codes behind this point's messages, e.g.
    /// `"1_3s, 2_2s"` (used for compact chart labels).
    pub fn short_codes(&self) -> String {
        extract_rule_short(&self.display())
    }
}

fn join_messages(rejections: &[String], warnings: &[String]) -> String {
    let mut all: Vec<&str> = Vec::with_capacity(rejections.len() + warnings.len());
    all.extend(rejections.iter().map(String::as_str));
    all.extend(warnings.iter().map(String::as_str));
    all.join("; ")
}

fn status_of(rejections: &BTreeSet<String>, warnings: &BTreeSet<String>) -> QcStatus {
    if !rejections.is_empty() {
        QcStatus::Reject
    } else if !warnings.is_empty() {
        QcStatus::Warning
    } else {
        QcStatus::Pass
    }
}

/// Reduces the hit list to per-run and per-point verdict tables.
///
/// Idempotent and order-independent over `hits`: messages are folded
/// into sorted sets, so re-running on the same (even permuted) hit list
/// yields identical tables.
pub fn aggregate(hits: &[RuleHit], matrix: &ZMatrix) -> (Vec<RunVerdict>, Vec<PointVerdict>) {
    let n = matrix.run_count();
    let m = matrix.level_count();

    let mut run_rej: Vec<BTreeSet<String>> = vec![BTreeSet::new(); n];
    let mut run_warn: Vec<BTreeSet<String>> = vec![BTreeSet::new(); n];
    let mut point_rej: Vec<Vec<BTreeSet<String>>> = vec![vec![BTreeSet::new(); m]; n];
    let mut point_warn: Vec<Vec<BTreeSet<String>>> = vec![vec![BTreeSet::new(); m]; n];

    for hit in hits {
        let (runs, points) = if hit.code.is_warning() {
            (&mut run_warn, &mut point_warn)
        } else {
            (&mut run_rej, &mut point_rej)
        };
        runs[hit.run].insert(hit.message.clone());
        for &l in &hit.levels {
            points[hit.run][l].insert(hit.message.clone());
        }
    }

    let run_verdicts = (0..n)
        .map(|i| RunVerdict {
            label: matrix.label(i).to_string(),
            status: status_of(&run_rej[i], &run_warn[i]),
            rejections: run_rej[i].iter().cloned().collect(),
            warnings: run_warn[i].iter().cloned().collect(),
        })
        .collect();

    let point_verdicts = (0..n)
        .flat_map(|i| (0..m).map(move |l| (i, l)))
        .map(|(i, l)| PointVerdict {
            label: matrix.label(i).to_string(),
            level: l,
            status: status_of(&point_rej[i][l], &point_warn[i][l]),
            rejections: point_rej[i][l].iter().cloned().collect(),
            warnings: point_warn[i][l].iter().cloned().collect(),
        })
        .collect();

    (run_verdicts, point_verdicts)
}

/// Extracts the unique leading rule codes from a `"; "`-joined message
/// string, in first-seen order.
///
/// # Examples
///
/// ```
/// use iqc_core::westgard::extract_rule_short;
///
/// let text = "1_3s (Ctrl 1, z=3.20); 2_2s (Ctrl 1, runs 1-2); 1_3s (Ctrl 2, z=-3.10)";
/// assert_eq!(extract_rule_short(text), "1_3s, 2_2s");
/// ```
pub fn extract_rule_short(text: &str) -> String {
    let mut codes: Vec<&str> = Vec::new();
    for part in text.split(';') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let Some(token) = part.split_whitespace().next() else {
            continue;
        };
        if !codes.contains(&token) {
            codes.push(token);
        }
    }
    codes.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::westgard::matrix::{LevelCount, QcRun};
    use crate::westgard::rules::RuleCode;

    fn two_level_matrix(n: usize) -> ZMatrix {
        let runs = (0..n)
            .map(|i| QcRun::new((i + 1).to_string(), vec![Some(0.0), Some(0.0)]))
            .collect();
        ZMatrix::new(runs, LevelCount::Two).expect("valid matrix")
    }

    fn hit(code: RuleCode, run: usize, levels: &[usize], message: &str) -> RuleHit {
        RuleHit {
            code,
            run,
            levels: levels.to_vec(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_no_hits_all_pass() {
        let matrix = two_level_matrix(3);
        let (runs, points) = aggregate(&[], &matrix);
        assert_eq!(runs.len(), 3);
        assert_eq!(points.len(), 6);
        assert!(runs.iter().all(|r| r.status == QcStatus::Pass));
        assert!(points.iter().all(|p| p.status == QcStatus::Pass));
        assert!(runs.iter().all(|r| r.display().is_empty()));
    }

    #[test]
    fn test_rejection_takes_precedence_over_warning() {
        let matrix = two_level_matrix(2);
        let hits = vec![
            hit(RuleCode::OneTwoS, 0, &[0], "1_2s (Ctrl 1, z=2.10)"),
            hit(RuleCode::OneThreeS, 0, &[1], "1_3s (Ctrl 2, z=3.10)"),
        ];
        let (runs, points) = aggregate(&hits, &matrix);
        assert_eq!(runs[0].status, QcStatus::Reject);
        assert_eq!(runs[1].status, QcStatus::Pass);
        // Point statuses are restricted to implicated levels.
        assert_eq!(points[0].status, QcStatus::Warning); // run 0, level 0
        assert_eq!(points[1].status, QcStatus::Reject); // run 0, level 1
        assert_eq!(points[2].status, QcStatus::Pass); // run 1, level 0
    }

    #[test]
    fn test_warning_only_run() {
        let matrix = two_level_matrix(1);
        let hits = vec![hit(RuleCode::OneTwoS, 0, &[0], "1_2s (Ctrl 1, z=2.10)")];
        let (runs, _) = aggregate(&hits, &matrix);
        assert_eq!(runs[0].status, QcStatus::Warning);
        assert_eq!(runs[0].warnings, vec!["1_2s (Ctrl 1, z=2.10)"]);
        assert!(runs[0].rejections.is_empty());
    }

    #[test]
    fn test_display_orders_rejections_before_warnings() {
        let matrix = two_level_matrix(1);
        let hits = vec![
            hit(RuleCode::OneTwoS, 0, &[0], "1_2s (Ctrl 1, z=2.10)"),
            hit(RuleCode::TwoTwoS, 0, &[0, 1], "2_2s (same run, Ctrl 1, Ctrl 2 same side 2-3SD)"),
            hit(RuleCode::OneThreeS, 0, &[1], "1_3s (Ctrl 2, z=3.10)"),
        ];
        let (runs, _) = aggregate(&hits, &matrix);
        assert_eq!(
            runs[0].display(),
            "1_3s (Ctrl 2, z=3.10); 2_2s (same run, Ctrl 1, Ctrl 2 same side 2-3SD); 1_2s (Ctrl 1, z=2.10)"
        );
    }

    #[test]
    fn test_duplicate_messages_deduplicated() {
        let matrix = two_level_matrix(1);
        let hits = vec![
            hit(RuleCode::OneThreeS, 0, &[0], "1_3s (Ctrl 1, z=3.10)"),
            hit(RuleCode::OneThreeS, 0, &[0], "1_3s (Ctrl 1, z=3.10)"),
        ];
        let (runs, points) = aggregate(&hits, &matrix);
        assert_eq!(runs[0].rejections.len(), 1);
        assert_eq!(points[0].rejections.len(), 1);
    }

    #[test]
    fn test_point_restriction_to_implicated_levels() {
        let matrix = two_level_matrix(1);
        // R_4s implicates both levels; 1_3s only level 0.
        let hits = vec![
            hit(RuleCode::RFourS, 0, &[0, 1], "R_4s (run 1, spread >=4SD across levels)"),
            hit(RuleCode::OneThreeS, 0, &[0], "1_3s (Ctrl 1, z=3.10)"),
        ];
        let (_, points) = aggregate(&hits, &matrix);
        assert_eq!(points[0].rejections.len(), 2);
        assert_eq!(points[1].rejections.len(), 1);
        assert_eq!(points[1].rejections[0], "R_4s (run 1, spread >=4SD across levels)");
    }

    #[test]
    fn test_aggregate_idempotent_and_order_independent() {
        let matrix = two_level_matrix(3);
        let hits = vec![
            hit(RuleCode::OneTwoS, 1, &[0], "1_2s (Ctrl 1, z=2.10)"),
            hit(RuleCode::TwoTwoS, 2, &[0], "2_2s (Ctrl 1, runs 2-3)"),
            hit(RuleCode::OneThreeS, 0, &[1], "1_3s (Ctrl 2, z=-3.40)"),
        ];
        let first = aggregate(&hits, &matrix);
        let second = aggregate(&hits, &matrix);
        assert_eq!(first, second);

        let mut reversed = hits.clone();
        reversed.reverse();
        let third = aggregate(&reversed, &matrix);
        assert_eq!(first, third);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(QcStatus::Pass.to_string(), "Pass");
        assert_eq!(QcStatus::Warning.to_string(), "Warning (1_2s)");
        assert_eq!(QcStatus::Reject.to_string(), "Reject");
    }

    #[test]
    fn test_point_short_codes() {
        let matrix = two_level_matrix(1);
        let hits = vec![
            hit(RuleCode::OneThreeS, 0, &[0], "1_3s (Ctrl 1, z=3.10)"),
            hit(RuleCode::TwoTwoS, 0, &[0], "2_2s (Ctrl 1, runs 1-2)"),
            hit(RuleCode::OneTwoS, 0, &[0], "1_2s (Ctrl 1, z=2.10)"),
        ];
        let (_, points) = aggregate(&hits, &matrix);
        assert_eq!(points[0].short_codes(), "1_3s, 2_2s, 1_2s");
    }

    // --- extract_rule_short ---

    #[test]
    fn test_extract_rule_short_dedup_and_order() {
        let text = "2_2s (Ctrl 1, runs 1-2); 1_3s (Ctrl 1, z=3.20); 2_2s (Ctrl 2, runs 1-2)";
        assert_eq!(extract_rule_short(text), "2_2s, 1_3s");
    }

    #[test]
    fn test_extract_rule_short_empty() {
        assert_eq!(extract_rule_short(""), "");
        assert_eq!(extract_rule_short("  ;  ; "), "");
    }

    #[test]
    fn test_extract_rule_short_single() {
        assert_eq!(extract_rule_short("10x (Ctrl 1, 10 consecutive runs same side)"), "10x");
    }

    // --- properties ---

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn hit_strategy(runs: usize, levels: usize) -> impl Strategy<Value = RuleHit> {
            (
                prop_oneof![
                    Just(RuleCode::OneTwoS),
                    Just(RuleCode::OneThreeS),
                    Just(RuleCode::TwoTwoS),
                    Just(RuleCode::RFourS),
                ],
                0..runs,
                proptest::collection::btree_set(0..levels, 1..=levels),
                "[a-z0-9_ ]{1,20}",
            )
                .prop_map(|(code, run, levels, message)| RuleHit {
                    code,
                    run,
                    levels: levels.into_iter().collect(),
                    message,
                })
        }

        proptest! {
            /// Aggregation is invariant under permutation of the hit list.
            #[test]
            fn prop_aggregate_order_independent(
                mut hits in proptest::collection::vec(hit_strategy(4, 2), 0..12)
            ) {
                let matrix = two_level_matrix(4);
                let forward = aggregate(&hits, &matrix);
                hits.reverse();
                let backward = aggregate(&hits, &matrix);
                prop_assert_eq!(forward, backward);
            }

            /// Every table always covers the full run x level grid.
            #[test]
            fn prop_aggregate_total(
                hits in proptest::collection::vec(hit_strategy(3, 2), 0..8)
            ) {
                let matrix = two_level_matrix(3);
                let (runs, points) = aggregate(&hits, &matrix);
                prop_assert_eq!(runs.len(), 3);
                prop_assert_eq!(points.len(), 6);
            }
        }
    }
}

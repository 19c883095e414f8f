//! Westgard multi-rule violation detection.
//!
//! Implements the Westgard multi-rule scheme over a run × control-level
//! z-score matrix. Every rule is evaluated independently and exhaustively
//! over the whole matrix — a run or point may accumulate hits from several
//! rules at once, and no rule short-circuits another. Within one rule,
//! a given (window position, level, side) combination produces at most
//! one hit.
//!
//! # Policies
//!
//! - **Missing cells**: a window missing a required cell is skipped —
//!   absence of evidence, never a violation. The `2of3_2s` cross-run
//!   window only requires two qualifying cells, so it is skipped only
//!   when all three cells are missing.
//! - **Sign consistency**: multi-point rules require all qualifying
//!   z-values on the same strict side of the mean. A z of exactly zero
//!   is on neither side and never extends a same-side window.
//!
//! # References
//!
//! - Westgard, J.O. et al. (1981). "A Multi-Rule Shewhart Chart for
//!   Quality Control in Clinical Chemistry", *Clinical Chemistry* 27(3),
//!   pp. 493-501.
//! - CLSI C24 — Statistical Quality Control for Quantitative Measurement
//!   Procedures.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::matrix::ZMatrix;

/// Westgard rule codes.
///
/// One tag per rule code; several codes have both a cross-run and a
/// cross-level (or combined-window) detection variant, distinguished in
/// the hit message rather than the code.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RuleCode {
    /// `1_2s` — one point in the 2–3 SD warning band. Warning only,
    /// never a rejection rule.
    OneTwoS,
    /// `1_3s` — one point at or beyond 3 SD.
    OneThreeS,
    /// `2_2s` — two points beyond 2 SD on the same side (two levels in
    /// one run, or one level across two consecutive runs).
    TwoTwoS,
    /// `2of3_2s` — two of three points beyond 2 SD on the same side.
    TwoOfThreeTwoS,
    /// `R_4s` — within-run spread of 4 SD or more across levels.
    RFourS,
    /// `3_1s` — three consecutive points beyond 1 SD on the same side.
    ThreeOneS,
    /// `4_1s` — four consecutive points beyond 1 SD on the same side.
    FourOneS,
    /// `9x` — nine consecutive points on the same side of the mean.
    NineX,
    /// `10x` — ten consecutive points on the same side of the mean.
    TenX,
}

impl RuleCode {
    /// Whether this code is the warning rule (`1_2s`).
    ///
    /// Every other code is a rejection rule when present in the active
    /// set.
    pub fn is_warning(self) -> bool {
        matches!(self, RuleCode::OneTwoS)
    }

    /// Canonical code text (`"1_3s"`, `"2of3_2s"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            RuleCode::OneTwoS => "1_2s",
            RuleCode::OneThreeS => "1_3s",
            RuleCode::TwoTwoS => "2_2s",
            RuleCode::TwoOfThreeTwoS => "2of3_2s",
            RuleCode::RFourS => "R_4s",
            RuleCode::ThreeOneS => "3_1s",
            RuleCode::FourOneS => "4_1s",
            RuleCode::NineX => "9x",
            RuleCode::TenX => "10x",
        }
    }
}

impl fmt::Display for RuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered set of rejection rule codes.
///
/// Produced by sigma resolution; `1_3s` is always a member and `1_2s`
/// never is. Iteration order is the declaration order of [`RuleCode`],
/// which keeps display strings deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleSet(BTreeSet<RuleCode>);

impl RuleSet {
    pub(crate) fn from_codes(codes: &[RuleCode]) -> Self {
        Self(codes.iter().copied().collect())
    }

    /// Whether `code` is an active rejection rule.
    pub fn contains(&self, code: RuleCode) -> bool {
        self.0.contains(&code)
    }

    /// Number of active rejection rules.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if no rejection rules are active (never the case for sets
    /// produced by sigma resolution).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every rule in `self` is also in `other`.
    pub fn is_subset(&self, other: &RuleSet) -> bool {
        self.0.is_subset(&other.0)
    }

    /// The active codes in deterministic order.
    pub fn codes(&self) -> Vec<RuleCode> {
        self.0.iter().copied().collect()
    }

    /// Comma-joined code text for report headers, e.g.
    /// `"1_3s, 2_2s, R_4s"`.
    pub fn display_codes(&self) -> String {
        let codes: Vec<&str> = self.0.iter().map(|c| c.as_str()).collect();
        codes.join(", ")
    }
}

/// One detected rule violation.
///
/// Transient: produced by [`detect`] and immediately folded into run and
/// point verdicts by aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleHit {
    /// The violated rule.
    pub code: RuleCode,
    /// Zero-based index of the implicated run. For cross-run windows
    /// this is the run that completes the window.
    pub run: usize,
    /// Zero-based indices of the implicated control levels, ascending.
    pub levels: Vec<usize>,
    /// Human-readable description embedding levels, run labels, and
    /// z-values.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Side of the mean. A z of exactly zero is on neither side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Plus,
    Minus,
}

const SIDES: [Side; 2] = [Side::Plus, Side::Minus];

fn side_of(z: f64) -> Option<Side> {
    if z > 0.0 {
        Some(Side::Plus)
    } else if z < 0.0 {
        Some(Side::Minus)
    } else {
        None
    }
}

/// The 2–3 SD warning band.
fn in_warning_band(z: f64) -> bool {
    let a = z.abs();
    (2.0..3.0).contains(&a)
}

/// Renders implicated levels as `"Ctrl 1, Ctrl 2"` (1-based).
fn ctrl_list(levels: &[usize]) -> String {
    let names: Vec<String> = levels.iter().map(|l| format!("Ctrl {}", l + 1)).collect();
    names.join(", ")
}

// ---------------------------------------------------------------------------
// Detection functions, one per pattern
// ---------------------------------------------------------------------------

/// `1_2s`: a single point in the 2–3 SD warning band.
fn check_12s(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for i in 0..m.run_count() {
        for l in 0..m.level_count() {
            let Some(z) = m.z(i, l) else { continue };
            if in_warning_band(z) {
                hits.push(RuleHit {
                    code: RuleCode::OneTwoS,
                    run: i,
                    levels: vec![l],
                    message: format!("1_2s (Ctrl {}, z={:.2})", l + 1, z),
                });
            }
        }
    }
    hits
}

/// `1_3s`: a single point at or beyond 3 SD.
fn check_13s(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for i in 0..m.run_count() {
        for l in 0..m.level_count() {
            let Some(z) = m.z(i, l) else { continue };
            if z.abs() >= 3.0 {
                hits.push(RuleHit {
                    code: RuleCode::OneThreeS,
                    run: i,
                    levels: vec![l],
                    message: format!("1_3s (Ctrl {}, z={:.2})", l + 1, z),
                });
            }
        }
    }
    hits
}

/// `2_2s`, cross-level: two or more levels of the same run in the 2–3 SD
/// band on the same side.
fn check_22s_within_run(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for i in 0..m.run_count() {
        for side in SIDES {
            let levels: Vec<usize> = (0..m.level_count())
                .filter(|&l| {
                    m.z(i, l)
                        .is_some_and(|z| in_warning_band(z) && side_of(z) == Some(side))
                })
                .collect();
            if levels.len() >= 2 {
                hits.push(RuleHit {
                    code: RuleCode::TwoTwoS,
                    run: i,
                    levels: levels.clone(),
                    message: format!(
                        "2_2s (same run, {} same side 2-3SD)",
                        ctrl_list(&levels)
                    ),
                });
            }
        }
    }
    hits
}

/// `2_2s`, cross-run: the same level in the 2–3 SD band on the same side
/// in two consecutive runs.
fn check_22s_across_runs(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for l in 0..m.level_count() {
        for i in 1..m.run_count() {
            let (Some(z1), Some(z2)) = (m.z(i - 1, l), m.z(i, l)) else {
                continue;
            };
            if in_warning_band(z1) && in_warning_band(z2) && side_of(z1) == side_of(z2) {
                hits.push(RuleHit {
                    code: RuleCode::TwoTwoS,
                    run: i,
                    levels: vec![l],
                    message: format!(
                        "2_2s (Ctrl {}, runs {}-{})",
                        l + 1,
                        m.label(i - 1),
                        m.label(i)
                    ),
                });
            }
        }
    }
    hits
}

/// `2of3_2s`, cross-run: at least two of three consecutive runs at the
/// same level beyond 2 SD on the same side. The window is skipped only
/// when all three cells are missing; qualifying cells are counted among
/// the non-missing ones.
fn check_2of3_across_runs(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for l in 0..m.level_count() {
        for i in 2..m.run_count() {
            let vals = [m.z(i - 2, l), m.z(i - 1, l), m.z(i, l)];
            if vals.iter().all(|v| v.is_none()) {
                continue;
            }
            for side in SIDES {
                let count = vals
                    .iter()
                    .flatten()
                    .filter(|&&z| z.abs() >= 2.0 && side_of(z) == Some(side))
                    .count();
                if count >= 2 {
                    hits.push(RuleHit {
                        code: RuleCode::TwoOfThreeTwoS,
                        run: i,
                        levels: vec![l],
                        message: format!(
                            "2of3_2s (Ctrl {}, runs {}-{})",
                            l + 1,
                            m.label(i - 2),
                            m.label(i)
                        ),
                    });
                    break;
                }
            }
        }
    }
    hits
}

/// `2of3_2s`, cross-level: at least two levels of the same run beyond
/// 2 SD on the same side.
fn check_2of3_within_run(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for i in 0..m.run_count() {
        for side in SIDES {
            let levels: Vec<usize> = (0..m.level_count())
                .filter(|&l| {
                    m.z(i, l)
                        .is_some_and(|z| z.abs() >= 2.0 && side_of(z) == Some(side))
                })
                .collect();
            if levels.len() >= 2 {
                hits.push(RuleHit {
                    code: RuleCode::TwoOfThreeTwoS,
                    run: i,
                    levels,
                    message: format!(
                        "2of3_2s (run {}, >=2 levels same side >=2SD)",
                        m.label(i)
                    ),
                });
                break;
            }
        }
    }
    hits
}

/// `R_4s`: within one run, the spread between the highest and lowest
/// level z-scores reaches 4 SD, with one at +2 SD or above and one at
/// -2 SD or below. Implicates the levels attaining the extremes.
fn check_r4s(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for i in 0..m.run_count() {
        let vals: Vec<(usize, f64)> = (0..m.level_count())
            .filter_map(|l| m.z(i, l).map(|z| (l, z)))
            .collect();
        if vals.len() < 2 {
            continue;
        }
        let max_z = vals.iter().map(|&(_, z)| z).fold(f64::NEG_INFINITY, f64::max);
        let min_z = vals.iter().map(|&(_, z)| z).fold(f64::INFINITY, f64::min);
        if max_z - min_z >= 4.0 && max_z >= 2.0 && min_z <= -2.0 {
            let levels: Vec<usize> = vals
                .iter()
                .filter(|&&(_, z)| z == max_z || z == min_z)
                .map(|&(l, _)| l)
                .collect();
            hits.push(RuleHit {
                code: RuleCode::RFourS,
                run: i,
                levels,
                message: format!("R_4s (run {}, spread >=4SD across levels)", m.label(i)),
            });
        }
    }
    hits
}

/// `3_1s`, cross-run: three consecutive runs at the same level all
/// beyond 1 SD on the same side.
fn check_31s_across_runs(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for l in 0..m.level_count() {
        for i in 2..m.run_count() {
            let Some(vals) = window(m, l, i, 3) else { continue };
            for side in SIDES {
                if vals
                    .iter()
                    .all(|&z| z.abs() >= 1.0 && side_of(z) == Some(side))
                {
                    hits.push(RuleHit {
                        code: RuleCode::ThreeOneS,
                        run: i,
                        levels: vec![l],
                        message: format!(
                            "3_1s (Ctrl {}, runs {}-{})",
                            l + 1,
                            m.label(i - 2),
                            m.label(i)
                        ),
                    });
                    break;
                }
            }
        }
    }
    hits
}

/// `3_1s`, cross-level (3-level designs): all levels of the same run
/// present, with at least three beyond 1 SD on the same side.
fn check_31s_within_run(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for i in 0..m.run_count() {
        let cells: Vec<Option<f64>> = (0..m.level_count()).map(|l| m.z(i, l)).collect();
        if cells.iter().any(|v| v.is_none()) {
            continue;
        }
        for side in SIDES {
            let levels: Vec<usize> = cells
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_some_and(|z| z.abs() >= 1.0 && side_of(z) == Some(side)))
                .map(|(l, _)| l)
                .collect();
            if levels.len() >= 3 {
                hits.push(RuleHit {
                    code: RuleCode::ThreeOneS,
                    run: i,
                    levels,
                    message: format!("3_1s (run {}, >=3 levels same side >=1SD)", m.label(i)),
                });
                break;
            }
        }
    }
    hits
}

/// `4_1s`, cross-run: four consecutive runs at the same level all beyond
/// 1 SD on the same side.
fn check_41s_across_runs(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for l in 0..m.level_count() {
        for i in 3..m.run_count() {
            let Some(vals) = window(m, l, i, 4) else { continue };
            for side in SIDES {
                if vals
                    .iter()
                    .all(|&z| z.abs() >= 1.0 && side_of(z) == Some(side))
                {
                    hits.push(RuleHit {
                        code: RuleCode::FourOneS,
                        run: i,
                        levels: vec![l],
                        message: format!(
                            "4_1s (Ctrl {}, runs {}-{})",
                            l + 1,
                            m.label(i - 3),
                            m.label(i)
                        ),
                    });
                    break;
                }
            }
        }
    }
    hits
}

/// `4_1s`, combined window (2-level designs): two consecutive runs ×
/// both levels, all four values beyond 1 SD on the same side.
fn check_41s_combined(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for i in 1..m.run_count() {
        let Some(vals) = block(m, i, 2) else { continue };
        for side in SIDES {
            if vals
                .iter()
                .all(|&z| z.abs() >= 1.0 && side_of(z) == Some(side))
            {
                hits.push(RuleHit {
                    code: RuleCode::FourOneS,
                    run: i,
                    levels: vec![0, 1],
                    message: "4_1s (2 runs x 2 levels, all same side >=1SD)".to_string(),
                });
                break;
            }
        }
    }
    hits
}

/// `9x`, cross-run: nine consecutive runs at the same level all on the
/// same side of the mean (no magnitude threshold).
fn check_9x_across_runs(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for l in 0..m.level_count() {
        for i in 8..m.run_count() {
            let Some(vals) = window(m, l, i, 9) else { continue };
            for side in SIDES {
                if vals.iter().all(|&z| side_of(z) == Some(side)) {
                    hits.push(RuleHit {
                        code: RuleCode::NineX,
                        run: i,
                        levels: vec![l],
                        message: format!("9x (Ctrl {}, 9 consecutive runs same side)", l + 1),
                    });
                    break;
                }
            }
        }
    }
    hits
}

/// `9x`, combined window (3-level designs): three consecutive runs ×
/// all three levels on the same side.
fn check_9x_combined(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for i in 2..m.run_count() {
        let Some(vals) = block(m, i, 3) else { continue };
        for side in SIDES {
            if vals.iter().all(|&z| side_of(z) == Some(side)) {
                hits.push(RuleHit {
                    code: RuleCode::NineX,
                    run: i,
                    levels: vec![0, 1, 2],
                    message: "9x (3 runs x 3 levels, all same side)".to_string(),
                });
                break;
            }
        }
    }
    hits
}

/// `10x`, cross-run: ten consecutive runs at the same level all on the
/// same side of the mean.
fn check_10x_across_runs(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for l in 0..m.level_count() {
        for i in 9..m.run_count() {
            let Some(vals) = window(m, l, i, 10) else { continue };
            for side in SIDES {
                if vals.iter().all(|&z| side_of(z) == Some(side)) {
                    hits.push(RuleHit {
                        code: RuleCode::TenX,
                        run: i,
                        levels: vec![l],
                        message: format!("10x (Ctrl {}, 10 consecutive runs same side)", l + 1),
                    });
                    break;
                }
            }
        }
    }
    hits
}

/// `10x`, combined window (2-level designs): five consecutive runs ×
/// both levels on the same side.
fn check_10x_combined(m: &ZMatrix) -> Vec<RuleHit> {
    let mut hits = Vec::new();
    for i in 4..m.run_count() {
        let Some(vals) = block(m, i, 5) else { continue };
        for side in SIDES {
            if vals.iter().all(|&z| side_of(z) == Some(side)) {
                hits.push(RuleHit {
                    code: RuleCode::TenX,
                    run: i,
                    levels: vec![0, 1],
                    message: "10x (5 runs x 2 levels, all same side)".to_string(),
                });
                break;
            }
        }
    }
    hits
}

/// The trailing `len`-run window at one level, ending at run `i`.
/// `None` if any cell is missing.
fn window(m: &ZMatrix, level: usize, i: usize, len: usize) -> Option<Vec<f64>> {
    (i + 1 - len..=i).map(|j| m.z(j, level)).collect()
}

/// The trailing `len`-run window across all levels, ending at run `i`.
/// `None` if any cell is missing.
fn block(m: &ZMatrix, i: usize, len: usize) -> Option<Vec<f64>> {
    (i + 1 - len..=i)
        .flat_map(|j| (0..m.level_count()).map(move |l| m.z(j, l)))
        .collect()
}

// ---------------------------------------------------------------------------
// Engine entry point
// ---------------------------------------------------------------------------

/// Detects every rule violation in the matrix.
///
/// Each rejection rule runs only when its code is in `active`; the
/// `1_2s` warning scan always runs. The combined-window variants are
/// additionally gated on the level counts they are defined for
/// (`4_1s`/`10x`: 2 levels, `9x`: 3 levels, cross-level `3_1s`:
/// 3 levels).
///
/// Returns the complete hit list in deterministic order (rule by rule,
/// then scan order); aggregation re-sorts messages, so callers should
/// not rely on the ordering beyond determinism.
pub fn detect(matrix: &ZMatrix, active: &RuleSet) -> Vec<RuleHit> {
    let m = matrix.level_count();
    let mut hits = Vec::new();

    hits.extend(check_12s(matrix));
    if active.contains(RuleCode::OneThreeS) {
        hits.extend(check_13s(matrix));
    }
    if active.contains(RuleCode::TwoTwoS) {
        hits.extend(check_22s_within_run(matrix));
        hits.extend(check_22s_across_runs(matrix));
    }
    if active.contains(RuleCode::TwoOfThreeTwoS) {
        hits.extend(check_2of3_across_runs(matrix));
        hits.extend(check_2of3_within_run(matrix));
    }
    if active.contains(RuleCode::RFourS) {
        hits.extend(check_r4s(matrix));
    }
    if active.contains(RuleCode::ThreeOneS) {
        hits.extend(check_31s_across_runs(matrix));
        if m >= 3 {
            hits.extend(check_31s_within_run(matrix));
        }
    }
    if active.contains(RuleCode::FourOneS) {
        hits.extend(check_41s_across_runs(matrix));
        if m == 2 {
            hits.extend(check_41s_combined(matrix));
        }
    }
    if active.contains(RuleCode::NineX) {
        hits.extend(check_9x_across_runs(matrix));
        if m == 3 {
            hits.extend(check_9x_combined(matrix));
        }
    }
    if active.contains(RuleCode::TenX) && m == 2 {
        hits.extend(check_10x_across_runs(matrix));
        hits.extend(check_10x_combined(matrix));
    }

    tracing::debug!(
        runs = matrix.run_count(),
        levels = m,
        hits = hits.len(),
        "westgard detection complete"
    );
    hits
}

//! Sigma category and rejection rule-set resolution.
//!
//! A method's sigma metric determines how aggressive the Westgard scheme
//! needs to be: a high-sigma method tolerates a minimal rule set without
//! losing error detection, while a low-sigma method needs the full
//! multi-rule battery.
//!
//! # Rule sets by sigma category
//!
//! | Category | 2 levels                        | 3 levels                        |
//! |----------|---------------------------------|---------------------------------|
//! | 6        | 1_3s                            | 1_3s                            |
//! | 5        | 1_3s, R_4s, 2_2s                | 1_3s, R_4s, 2of3_2s             |
//! | 4        | 1_3s, R_4s, 2_2s, 4_1s          | 1_3s, R_4s, 2of3_2s, 3_1s       |
//! | <4       | 1_3s, R_4s, 2_2s, 4_1s, 10x     | 1_3s, R_4s, 2of3_2s, 3_1s, 9x   |
//!
//! `1_2s` is never part of a rejection set; it is always and only a
//! warning rule, evaluated unconditionally by the engine.
//!
//! # References
//!
//! - Westgard, J.O. et al. (1981). "A Multi-Rule Shewhart Chart for
//!   Quality Control in Clinical Chemistry", *Clinical Chemistry* 27(3).
//! - CLSI C24 — Statistical Quality Control for Quantitative Measurement
//!   Procedures.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::matrix::LevelCount;
use super::rules::{RuleCode, RuleSet};

/// Sigma performance category of a measurement procedure.
///
/// Derived from the method's sigma metric and immutable once computed
/// for a given (score, level-count) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SigmaCategory {
    /// Sigma below 4, or unknown (absent, NaN, or zero score).
    LessThanFour,
    /// Sigma in [4, 5).
    Four,
    /// Sigma in [5, 6).
    Five,
    /// Sigma of 6 or above.
    Six,
}

impl SigmaCategory {
    /// Classifies a sigma score.
    ///
    /// An absent, NaN, or exactly-zero score means the laboratory has
    /// not established a sigma metric; the conservative `<4` category
    /// (full rule set) applies.
    ///
    /// # Examples
    ///
    /// ```
    /// use iqc_core::westgard::SigmaCategory;
    ///
    /// assert_eq!(SigmaCategory::from_sigma(Some(6.2)), SigmaCategory::Six);
    /// assert_eq!(SigmaCategory::from_sigma(Some(4.0)), SigmaCategory::Four);
    /// assert_eq!(SigmaCategory::from_sigma(None), SigmaCategory::LessThanFour);
    /// assert_eq!(SigmaCategory::from_sigma(Some(0.0)), SigmaCategory::LessThanFour);
    /// ```
    pub fn from_sigma(sigma: Option<f64>) -> Self {
        let s = match sigma {
            Some(s) if s.is_finite() && s != 0.0 => s,
            _ => return SigmaCategory::LessThanFour,
        };
        if s >= 6.0 {
            SigmaCategory::Six
        } else if s >= 5.0 {
            SigmaCategory::Five
        } else if s >= 4.0 {
            SigmaCategory::Four
        } else {
            SigmaCategory::LessThanFour
        }
    }
}

impl fmt::Display for SigmaCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SigmaCategory::LessThanFour => "<4",
            SigmaCategory::Four => "4",
            SigmaCategory::Five => "5",
            SigmaCategory::Six => "6",
        };
        f.write_str(s)
    }
}

/// The rejection rule set active for a sigma category and level count.
///
/// Total and pure: every (category, level count) pair maps to exactly
/// one set, and `1_3s` is always a member.
pub fn rules_for(category: SigmaCategory, levels: LevelCount) -> RuleSet {
    use RuleCode::*;
    let codes: &[RuleCode] = match (levels, category) {
        (LevelCount::Two, SigmaCategory::Six) => &[OneThreeS],
        (LevelCount::Two, SigmaCategory::Five) => &[OneThreeS, RFourS, TwoTwoS],
        (LevelCount::Two, SigmaCategory::Four) => &[OneThreeS, RFourS, TwoTwoS, FourOneS],
        (LevelCount::Two, SigmaCategory::LessThanFour) => {
            &[OneThreeS, RFourS, TwoTwoS, FourOneS, TenX]
        }
        (LevelCount::Three, SigmaCategory::Six) => &[OneThreeS],
        (LevelCount::Three, SigmaCategory::Five) => &[OneThreeS, RFourS, TwoOfThreeTwoS],
        (LevelCount::Three, SigmaCategory::Four) => {
            &[OneThreeS, RFourS, TwoOfThreeTwoS, ThreeOneS]
        }
        (LevelCount::Three, SigmaCategory::LessThanFour) => {
            &[OneThreeS, RFourS, TwoOfThreeTwoS, ThreeOneS, NineX]
        }
    };
    RuleSet::from_codes(codes)
}

/// Resolves a sigma score and level count to the category and its
/// rejection rule set.
///
/// # Examples
///
/// ```
/// use iqc_core::westgard::{resolve, LevelCount, RuleCode, SigmaCategory};
///
/// let (cat, rules) = resolve(Some(5.5), LevelCount::Two);
/// assert_eq!(cat, SigmaCategory::Five);
/// assert!(rules.contains(RuleCode::TwoTwoS));
/// assert!(!rules.contains(RuleCode::FourOneS));
/// ```
pub fn resolve(sigma: Option<f64>, levels: LevelCount) -> (SigmaCategory, RuleSet) {
    let category = SigmaCategory::from_sigma(sigma);
    (category, rules_for(category, levels))
}

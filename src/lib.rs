//! # iqc-core
//!
//! Westgard multi-rule evaluation for laboratory internal quality
//! control (IQC).
//!
//! This crate provides the rule evaluation engine behind an IQC
//! application: it decides whether an analytical run is acceptable,
//! should raise a warning, or must be rejected, based on the z-scores of
//! 2 or 3 QC control levels tracked across runs.
//!
//! ## Modules
//!
//! - [`westgard`] — Sigma-based rule-set selection, the sliding-window
//!   multi-rule violation detector, and verdict aggregation
//! - [`zscore`] — Standardization of raw measurements against reference
//!   statistics
//! - [`error`] — Structural configuration errors
//!
//! ## Design Philosophy
//!
//! - **Pure computation**: no I/O, no shared state; every evaluation is
//!   an independent pass over an immutable in-memory matrix
//! - **Degrade, don't throw**: malformed cells become missing values
//!   that drop out of every rule window; only structural configuration
//!   problems are errors
//! - **Detection before classification**: rules produce an immutable
//!   hit list, aggregation folds it into verdicts — each independently
//!   testable
//!
//! Dashboards, persistence, and document export are consumers of this
//! crate's verdict tables, not part of it.

pub mod error;
pub mod westgard;
pub mod zscore;

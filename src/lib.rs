//! Preflight validation engine for media libraries
//!
//! Checks every media file under a root for structural integrity (probe
//! and decode checks), enforces user-declared expectation profiles, and
//! infers per-directory norms to flag files that deviate from their
//! siblings. The result is one report of deduplicated findings with
//! machine-readable codes.

pub mod check;
pub mod cli;
pub mod discover;
pub mod domain;
pub mod error;
pub mod lang;
pub mod probe;
pub mod profiles;
pub mod progress;
pub mod report;
pub mod settings;

// Re-export commonly used types
pub use check::{CheckRequest, CheckRunner};
pub use domain::{
    AutoCheckConfig, DecodeDepth, ExpectationProfile, Issue, IssueCode, IssueSource, Severity,
    ValidationReport,
};
pub use error::{PreflightError, PreflightResult};

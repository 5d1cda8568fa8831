//! Health scoring
//!
//! Deterministic 0-100 score and A-F letter grade derived from a run's
//! severity distribution. Identical findings always produce identical
//! scores.

use crate::models::SeverityCounts;

/// Penalty weights per finding.
const CRITICAL_WEIGHT: usize = 20;
const HIGH_WEIGHT: usize = 10;
const MEDIUM_WEIGHT: usize = 5;
const LOW_WEIGHT: usize = 1;

/// Score a severity tally: start at 100, subtract per finding, floor at 0.
pub fn health_score(counts: &SeverityCounts) -> f64 {
    let penalty = counts.critical * CRITICAL_WEIGHT
        + counts.high * HIGH_WEIGHT
        + counts.medium * MEDIUM_WEIGHT
        + counts.low * LOW_WEIGHT;
    100.0_f64 - (penalty as f64).min(100.0)
}

/// Letter grade for a score.
pub fn grade(score: f64) -> &'static str {
    match score {
        s if s >= 90.0 => "A",
        s if s >= 80.0 => "B",
        s if s >= 70.0 => "C",
        s if s >= 60.0 => "D",
        s if s >= 50.0 => "E",
        _ => "F",
    }
}

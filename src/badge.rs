//! SVG score badge
//!
//! A small shields-style badge encoding the grade and numeric score,
//! written next to the scanned project. Writing it is a side effect of
//! a scan; failure is logged by the caller, never fatal.

use anyhow::{Context, Result};
use std::path::Path;

/// File name the badge is written under, next to the project root.
pub const BADGE_FILE: &str = "scanforge-badge.svg";

fn color_for_grade(grade: &str) -> &'static str {
    match grade {
        "A" => "#4c1",
        "B" => "#97ca00",
        "C" => "#dfb317",
        "D" => "#fe7d37",
        "E" | "F" => "#e05d44",
        _ => "#9f9f9f",
    }
}

/// Render the badge SVG for a grade and score.
pub fn render(grade: &str, score: f64) -> String {
    let color = color_for_grade(grade);
    let label = format!("{grade} ({score:.0})");
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="90" height="20" role="img" aria-label="security: {grade}">
  <title>security: {grade}</title>
  <linearGradient id="s" x2="0" y2="100%">
    <stop offset="0" stop-color="#bbb" stop-opacity=".1"/>
    <stop offset="1" stop-opacity=".1"/>
  </linearGradient>
  <clipPath id="r">
    <rect width="90" height="20" rx="3" fill="#fff"/>
  </clipPath>
  <g clip-path="url(#r)">
    <rect width="55" height="20" fill="#555"/>
    <rect x="55" width="35" height="20" fill="{color}"/>
    <rect width="90" height="20" fill="url(#s)"/>
  </g>
  <g fill="#fff" text-anchor="middle" font-family="Verdana,Geneva,DejaVu Sans,sans-serif" text-rendering="geometricPrecision" font-size="110">
    <text aria-hidden="true" x="285" y="150" fill="#010101" fill-opacity=".3" transform="scale(.1)" textLength="450">security</text>
    <text x="285" y="140" transform="scale(.1)" fill="#fff" textLength="450">security</text>
    <text aria-hidden="true" x="715" y="150" fill="#010101" fill-opacity=".3" transform="scale(.1)" textLength="250">{label}</text>
    <text x="715" y="140" transform="scale(.1)" fill="#fff" textLength="250">{label}</text>
  </g>
</svg>"##
    )
}

/// Write the badge file for a scored scan.
pub fn write(path: &Path, grade: &str, score: f64) -> Result<()> {
    std::fs::write(path, render(grade, score))
        .with_context(|| format!("failed to write badge to {}", path.display()))
}

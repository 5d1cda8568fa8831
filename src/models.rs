//! Core data models for scanforge
//!
//! These models are used throughout the codebase for representing
//! analysis tools, normalized findings, and scan results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The analysis tools scanforge knows how to drive.
///
/// Declaration order is the fixed precedence used when aggregating
/// findings, so output stays reproducible regardless of which tool
/// finishes first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolId {
    /// Python security linter
    Bandit,
    /// Python dependency vulnerability auditor
    Safety,
    /// Node.js dependency vulnerability auditor
    NpmAudit,
    /// Multi-language pattern scanner
    Semgrep,
    /// Hardcoded secret detector
    DetectSecrets,
}

impl ToolId {
    /// All known tools, in aggregation precedence order.
    pub const ALL: [ToolId; 5] = [
        ToolId::Bandit,
        ToolId::Safety,
        ToolId::NpmAudit,
        ToolId::Semgrep,
        ToolId::DetectSecrets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolId::Bandit => "bandit",
            ToolId::Safety => "safety",
            ToolId::NpmAudit => "npm-audit",
            ToolId::Semgrep => "semgrep",
            ToolId::DetectSecrets => "detect-secrets",
        }
    }

    /// Name of the executable to resolve on the search path.
    pub fn executable(&self) -> &'static str {
        match self {
            ToolId::Bandit => "bandit",
            ToolId::Safety => "safety",
            #[cfg(windows)]
            ToolId::NpmAudit => "npm.cmd",
            #[cfg(not(windows))]
            ToolId::NpmAudit => "npm",
            ToolId::Semgrep => "semgrep",
            ToolId::DetectSecrets => "detect-secrets",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolId::Bandit => "Python security linter",
            ToolId::Safety => "Python dependency security checker",
            ToolId::NpmAudit => "Node.js dependency auditor",
            ToolId::Semgrep => "Multi-language security scanner",
            ToolId::DetectSecrets => "Secrets detection tool",
        }
    }

    pub fn install_hint(&self) -> &'static str {
        match self {
            ToolId::Bandit => "pip install bandit",
            ToolId::Safety => "pip install safety",
            ToolId::NpmAudit => "install Node.js and npm",
            ToolId::Semgrep => "pip install semgrep",
            ToolId::DetectSecrets => "pip install detect-secrets",
        }
    }
}

impl std::fmt::Display for ToolId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ToolId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bandit" => Ok(ToolId::Bandit),
            "safety" => Ok(ToolId::Safety),
            "npm-audit" => Ok(ToolId::NpmAudit),
            "semgrep" => Ok(ToolId::Semgrep),
            "detect-secrets" => Ok(ToolId::DetectSecrets),
            other => Err(format!("unknown tool id: {other}")),
        }
    }
}

/// Severity levels for findings, lowest first.
///
/// Every adapter maps its tool's native vocabulary onto these four
/// values; nothing else ever reaches a `Finding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

/// One normalized vulnerability record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub tool: ToolId,
    pub severity: Severity,
    /// Path as reported by the analyzer; not guaranteed repo-relative.
    pub file_path: String,
    pub line_number: Option<u32>,
    /// Tool-specific issue identifier (e.g. bandit test id, semgrep check id).
    pub type_id: String,
    pub description: String,
    /// Redacted to a hash-prefix placeholder for secret findings.
    pub code_snippet: Option<String>,
    pub cwe_id: Option<String>,
    pub confidence: Option<String>,
}

/// Outcome status of one tool's run within a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Success,
    /// Prerequisites absent (tool not installed, no manifest, no files).
    /// Never counted as a failure.
    Skipped(String),
    Failed(String),
}

impl ToolStatus {
    pub fn skipped(reason: impl Into<String>) -> Self {
        ToolStatus::Skipped(reason.into())
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        ToolStatus::Failed(reason.into())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ToolStatus::Success)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ToolStatus::Skipped(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ToolStatus::Failed(_))
    }
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ToolStatus::Success => write!(f, "success"),
            ToolStatus::Skipped(reason) => write!(f, "skipped: {reason}"),
            ToolStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

impl Serialize for ToolStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// A tool's contribution to a scan: its status plus whatever findings it
/// produced. A non-success status means the findings are not exhaustive.
#[derive(Debug, Clone, Serialize)]
pub struct ToolRunOutcome {
    pub tool: ToolId,
    pub status: ToolStatus,
    pub findings: Vec<Finding>,
}

/// Findings tallied by severity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    #[serde(rename = "CRITICAL")]
    pub critical: usize,
    #[serde(rename = "HIGH")]
    pub high: usize,
    #[serde(rename = "MEDIUM")]
    pub medium: usize,
    #[serde(rename = "LOW")]
    pub low: usize,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for f in findings {
            match f.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

/// Run-level verdict derived from how many dispatched tools failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Complete,
    PartialComplete,
    Failed,
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverallStatus::Complete => write!(f, "complete"),
            OverallStatus::PartialComplete => write!(f, "partial_complete"),
            OverallStatus::Failed => write!(f, "failed"),
        }
    }
}

/// The aggregate result of one orchestration run.
///
/// Constructed fresh per run and immutable once returned; owns its
/// findings and maps outright.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub findings: Vec<Finding>,
    pub severity_counts: SeverityCounts,
    /// The declared tool universe, whether or not each tool ran.
    pub tools_used: Vec<ToolId>,
    pub tool_statuses: BTreeMap<ToolId, ToolStatus>,
    /// Tools whose status is neither success nor skipped.
    pub failed_tools: Vec<ToolId>,
    pub overall_status: OverallStatus,
    pub health_score: f64,
    pub grade: String,
    pub logs_path: PathBuf,
}

impl ScanResult {
    pub fn total_issues(&self) -> usize {
        self.findings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(severity: Severity) -> Finding {
        Finding {
            tool: ToolId::Bandit,
            severity,
            file_path: "app.py".to_string(),
            line_number: Some(3),
            type_id: "B301".to_string(),
            description: "pickle usage".to_string(),
            code_snippet: None,
            cwe_id: None,
            confidence: None,
        }
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::Medium < Severity::High);
        assert!(Severity::High < Severity::Critical);
    }

    #[test]
    fn tool_id_round_trip() {
        for tool in ToolId::ALL {
            assert_eq!(tool.as_str().parse::<ToolId>(), Ok(tool));
        }
        assert!("eslint".parse::<ToolId>().is_err());
    }

    #[test]
    fn severity_counts_partition_findings() {
        let findings = vec![
            finding(Severity::Critical),
            finding(Severity::High),
            finding(Severity::High),
            finding(Severity::Low),
        ];
        let counts = SeverityCounts::from_findings(&findings);
        assert_eq!(counts.critical, 1);
        assert_eq!(counts.high, 2);
        assert_eq!(counts.medium, 0);
        assert_eq!(counts.low, 1);
        assert_eq!(counts.total(), findings.len());
    }

    #[test]
    fn status_display() {
        assert_eq!(ToolStatus::Success.to_string(), "success");
        assert_eq!(
            ToolStatus::skipped("no manifest found").to_string(),
            "skipped: no manifest found"
        );
        assert_eq!(ToolStatus::failed("timeout").to_string(), "failed: timeout");
    }

    #[test]
    fn status_predicates() {
        assert!(ToolStatus::Success.is_success());
        assert!(ToolStatus::skipped("x").is_skipped());
        assert!(!ToolStatus::skipped("x").is_failed());
        assert!(ToolStatus::failed("x").is_failed());
    }

    #[test]
    fn severity_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"CRITICAL\""
        );
    }

    #[test]
    fn overall_status_serializes_snake_case() {
        let json = serde_json::to_string(&OverallStatus::PartialComplete).unwrap();
        assert_eq!(json, "\"partial_complete\"");
    }
}

//! scanforge - security scan orchestration
//!
//! Drives external security analyzers (bandit, safety, npm audit,
//! semgrep, detect-secrets) against a project tree, tolerates partial
//! tool failure, normalizes every tool's output into one finding
//! schema, and scores the result.

pub mod badge;
pub mod cli;
pub mod config;
pub mod engine;
pub mod logs;
pub mod models;
pub mod probe;
pub mod process;
pub mod progress;
pub mod scanners;
pub mod scoring;
pub mod selection;

pub use config::ScanConfig;
pub use engine::{scan_project, ScanEngine};
pub use models::{
    Finding, OverallStatus, ScanResult, Severity, SeverityCounts, ToolId, ToolRunOutcome,
    ToolStatus,
};

//! Scan configuration
//!
//! Defaults cover the common case; a project can override limits,
//! per-tool timeouts, and worker count with a `scanforge.toml` at its
//! root:
//!
//! ```toml
//! # scanforge.toml
//!
//! [engine]
//! workers = 2
//!
//! [timeouts]
//! semgrep = 300
//! npm-audit = 60
//!
//! [limits]
//! max_files = 2000
//! max_per_bucket = 800
//! ```

use crate::models::ToolId;
use crate::selection::SelectorConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "scanforge.toml";

/// Per-tool wall-clock budgets, in seconds.
///
/// Defaults differ per tool: semgrep downloads rulesets on first run and
/// npm audit talks to a registry, while bandit is purely local.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolTimeouts {
    pub bandit: u64,
    pub safety: u64,
    #[serde(rename = "npm-audit")]
    pub npm_audit: u64,
    pub semgrep: u64,
    #[serde(rename = "detect-secrets")]
    pub detect_secrets: u64,
}

impl Default for ToolTimeouts {
    fn default() -> Self {
        Self {
            bandit: 120,
            safety: 120,
            npm_audit: 120,
            semgrep: 180,
            detect_secrets: 120,
        }
    }
}

impl ToolTimeouts {
    pub fn for_tool(&self, tool: ToolId) -> Duration {
        let secs = match tool {
            ToolId::Bandit => self.bandit,
            ToolId::Safety => self.safety,
            ToolId::NpmAudit => self.npm_audit,
            ToolId::Semgrep => self.semgrep,
            ToolId::DetectSecrets => self.detect_secrets,
        };
        Duration::from_secs(secs)
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct EngineSection {
    workers: Option<usize>,
    logs_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    engine: EngineSection,
    timeouts: ToolTimeouts,
    limits: SelectorConfig,
}

/// Configuration for one scan engine.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Upper bound on concurrently running tools. The effective pool is
    /// `min(workers, available tools)`.
    pub workers: usize,
    /// Base directory for per-run tool logs.
    pub logs_dir: PathBuf,
    pub timeouts: ToolTimeouts,
    pub limits: SelectorConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            logs_dir: PathBuf::from("logs"),
            timeouts: ToolTimeouts::default(),
            limits: SelectorConfig::default(),
        }
    }
}

impl ScanConfig {
    /// Load configuration, applying `scanforge.toml` overrides from the
    /// project root when present. A malformed file is warned about and
    /// ignored rather than failing the scan.
    pub fn load(project_root: &Path) -> Self {
        let path = project_root.join(CONFIG_FILE);
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Self::default();
        };

        match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                debug!("Loaded config overrides from {}", path.display());
                let defaults = Self::default();
                Self {
                    workers: file.engine.workers.unwrap_or(defaults.workers),
                    logs_dir: file.engine.logs_dir.unwrap_or(defaults.logs_dir),
                    timeouts: file.timeouts,
                    limits: file.limits,
                }
            }
            Err(e) => {
                warn!("Ignoring malformed {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = ScanConfig::load(dir.path());
        assert_eq!(config.workers, 4);
        assert_eq!(config.timeouts.semgrep, 180);
        assert_eq!(config.limits.max_files, 1000);
    }

    #[test]
    fn overrides_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "[engine]\nworkers = 2\n\n[timeouts]\nsemgrep = 300\n\n[limits]\nmax_files = 50\n",
        )
        .unwrap();

        let config = ScanConfig::load(dir.path());
        assert_eq!(config.workers, 2);
        assert_eq!(config.timeouts.semgrep, 300);
        // Unset timeout keys keep their defaults.
        assert_eq!(config.timeouts.bandit, 120);
        assert_eq!(config.limits.max_files, 50);
    }

    #[test]
    fn malformed_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "not [ valid toml").unwrap();
        let config = ScanConfig::load(dir.path());
        assert_eq!(config.workers, 4);
    }

    #[test]
    fn per_tool_timeouts() {
        let timeouts = ToolTimeouts::default();
        assert_eq!(timeouts.for_tool(ToolId::Semgrep), Duration::from_secs(180));
        assert_eq!(timeouts.for_tool(ToolId::Bandit), Duration::from_secs(120));
    }
}

//! Per-run tool output persistence
//!
//! Every tool invocation leaves a stdout/stderr log pair under
//! `logs/<run-id>/` for postmortem debugging, whether or not the run
//! succeeded. Unparseable or oversized output gets an extra raw dump.
//! Log writes are best-effort: a full disk must never fail a scan.

use crate::models::ToolId;
use crate::process::ProcessOutput;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::warn;

pub struct RunLogs {
    dir: PathBuf,
}

impl RunLogs {
    /// Create the log directory for one run.
    pub fn create(base: &Path, run_id: &str) -> Result<Self> {
        let dir = base.join(run_id);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Persist a tool's stdout and stderr with exit code and timestamp.
    pub fn save_output(&self, tool: ToolId, output: &ProcessOutput) {
        self.write_log(
            &format!("{}_stdout.txt", tool),
            output.exit_code,
            &output.stdout,
        );
        self.write_log(
            &format!("{}_stderr.txt", tool),
            output.exit_code,
            &output.stderr,
        );
    }

    /// Persist raw output that could not be handled normally
    /// (unparseable JSON, oversized payloads).
    pub fn save_raw(&self, tool: ToolId, suffix: &str, content: &str) {
        let path = self.dir.join(format!("{tool}_{suffix}.txt"));
        let body = format!(
            "Timestamp: {}\n{}\n{}",
            chrono::Utc::now().to_rfc3339(),
            "=".repeat(80),
            content
        );
        if let Err(e) = std::fs::write(&path, body) {
            warn!("Failed to save raw {} output to {}: {}", tool, path.display(), e);
        }
    }

    fn write_log(&self, name: &str, exit_code: i32, content: &str) {
        let path = self.dir.join(name);
        let body = format!(
            "Exit code: {}\nTimestamp: {}\n{}\n{}",
            exit_code,
            chrono::Utc::now().to_rfc3339(),
            "=".repeat(80),
            if content.is_empty() { "(empty)" } else { content }
        );
        if let Err(e) = std::fs::write(&path, body) {
            warn!("Failed to save log {}: {}", path.display(), e);
        }
    }
}

//! Base types and shared guards for tool adapters
//!
//! Every adapter wraps one external analyzer: it builds the command
//! line, invokes the process runner, parses the tool's output, and maps
//! it into the canonical finding schema. The guards in this module give
//! all adapters the same defensive behavior for empty, oversized, and
//! unparseable output.

use crate::config::ToolTimeouts;
use crate::logs::RunLogs;
use crate::models::{Finding, ToolId, ToolStatus};
use crate::process::{ProcessError, ProcessOutput, RetryPolicy};
use crate::selection::SelectedFiles;
use anyhow::Result;
use std::path::Path;
use tracing::warn;

/// Outputs beyond this size are rejected instead of parsed.
pub const MAX_OUTPUT_BYTES: usize = 5_000_000;

/// Stderr excerpts in status messages are capped at this many characters.
pub const STDERR_PREVIEW_CHARS: usize = 500;

/// Finding descriptions are truncated to this many characters.
pub const DESCRIPTION_CHARS: usize = 500;

/// Everything an adapter needs for one run.
pub struct ScanContext<'a> {
    pub project_root: &'a Path,
    pub files: &'a SelectedFiles,
    pub logs: &'a RunLogs,
    pub timeouts: &'a ToolTimeouts,
    pub retry: &'a RetryPolicy,
}

/// One external analysis tool.
///
/// `scan` returns the tool's findings together with its status; content
/// problems (missing prerequisites, tool failures, bad output) are
/// statuses, not errors. An `Err` or panic from an adapter is caught by
/// the engine and converted to a failed status so one tool's defect
/// never aborts the run.
pub trait ToolAdapter: Send + Sync {
    fn tool(&self) -> ToolId;

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<(Vec<Finding>, ToolStatus)>;
}

/// Char-safe truncation with an ellipsis marker.
pub fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let cut: String = text.chars().take(limit).collect();
        format!("{cut}...")
    }
}

pub fn truncate_description(text: &str) -> String {
    preview(text.trim(), DESCRIPTION_CHARS)
}

/// Map a process runner error to the tool's status, leaving a log
/// record behind for postmortem debugging.
///
/// A vanished executable is a skip (prerequisite absent), matching the
/// probe-time classification; timeouts and exhausted retries are
/// failures.
pub fn status_from_process_error(tool: ToolId, error: &ProcessError, logs: &RunLogs) -> ToolStatus {
    logs.save_raw(tool, "error", &error.to_string());
    match error {
        ProcessError::NotFound { .. } => {
            ToolStatus::skipped(format!("not installed ({})", tool.install_hint()))
        }
        ProcessError::Timeout { timeout_secs, .. } => {
            ToolStatus::failed(format!("timeout after {timeout_secs}s"))
        }
        other => ToolStatus::failed(other.to_string()),
    }
}

/// Parse a tool's stdout as JSON, applying the shared output guards.
///
/// Returns the parsed value, or the failed status the adapter should
/// report. Raw output that cannot be handled is persisted for
/// inspection.
pub fn parse_json_output(
    tool: ToolId,
    output: &ProcessOutput,
    logs: &RunLogs,
) -> Result<serde_json::Value, ToolStatus> {
    let stdout = output.stdout.trim();

    if stdout.is_empty() {
        let mut reason = format!("empty output (exit code {})", output.exit_code);
        let stderr = output.stderr.trim();
        if !stderr.is_empty() {
            reason.push_str(": ");
            reason.push_str(&preview(stderr, STDERR_PREVIEW_CHARS));
        }
        return Err(ToolStatus::failed(reason));
    }

    if stdout.len() > MAX_OUTPUT_BYTES {
        warn!("{} produced {} bytes of output; refusing to parse", tool, stdout.len());
        logs.save_raw(
            tool,
            "too_large",
            &format!("Output size: {} bytes. Truncated for safety.", stdout.len()),
        );
        return Err(ToolStatus::failed(format!(
            "output too large ({} bytes)",
            stdout.len()
        )));
    }

    match serde_json::from_str(stdout) {
        Ok(value) => Ok(value),
        Err(e) => {
            warn!("{} output is not valid JSON: {}", tool, e);
            logs.save_raw(
                tool,
                "unparseable",
                &format!("Parse error: {e}\n\nOutput:\n{stdout}"),
            );
            Err(ToolStatus::failed(format!(
                "unparseable output: {}",
                preview(stdout, 100)
            )))
        }
    }
}

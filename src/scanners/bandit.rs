//! Bandit adapter: Python static security analysis
//!
//! Runs bandit over the selected Python files (never a recursive
//! directory scan) and maps its JSON report into canonical findings.

use crate::models::{Finding, Severity, ToolId, ToolStatus};
use crate::process::{run_tool, RunOptions};
use crate::scanners::base::{
    parse_json_output, status_from_process_error, truncate_description, ScanContext, ToolAdapter,
};
use anyhow::Result;
use serde_json::Value as JsonValue;
use tracing::{debug, info};

pub struct BanditAdapter;

impl BanditAdapter {
    /// Bandit's own vocabulary is already the canonical one; anything
    /// unexpected lands on MEDIUM.
    fn map_severity(native: &str) -> Severity {
        match native.to_uppercase().as_str() {
            "HIGH" => Severity::High,
            "MEDIUM" => Severity::Medium,
            "LOW" => Severity::Low,
            _ => Severity::Medium,
        }
    }

    fn finding_from(item: &JsonValue) -> Finding {
        let severity =
            Self::map_severity(item.get("issue_severity").and_then(|v| v.as_str()).unwrap_or(""));
        let cwe_id = item
            .get("issue_cwe")
            .and_then(|c| c.get("id"))
            .and_then(|id| id.as_u64())
            .map(|id| format!("CWE-{id}"));

        Finding {
            tool: ToolId::Bandit,
            severity,
            file_path: item
                .get("filename")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            line_number: item
                .get("line_number")
                .and_then(|v| v.as_u64())
                .map(|n| n as u32),
            type_id: item
                .get("test_id")
                .and_then(|v| v.as_str())
                .unwrap_or("UNKNOWN")
                .to_string(),
            description: truncate_description(
                item.get("issue_text").and_then(|v| v.as_str()).unwrap_or(""),
            ),
            code_snippet: item
                .get("code")
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end().to_string()),
            cwe_id,
            confidence: item
                .get("issue_confidence")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}

impl ToolAdapter for BanditAdapter {
    fn tool(&self) -> ToolId {
        ToolId::Bandit
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<(Vec<Finding>, ToolStatus)> {
        let files = &ctx.files.python;
        if files.is_empty() {
            return Ok((Vec::new(), ToolStatus::skipped("no Python files to scan")));
        }

        info!("Running bandit on {} Python files", files.len());

        let mut cmd = vec!["bandit".to_string(), "-f".to_string(), "json".to_string()];
        cmd.extend(files.iter().map(|p| p.to_string_lossy().into_owned()));

        let opts = RunOptions::new("bandit", ctx.timeouts.for_tool(ToolId::Bandit))
            .current_dir(ctx.project_root);

        let output = match run_tool(&cmd, &opts, ctx.retry) {
            Ok(output) => output,
            Err(e) => {
                return Ok((
                    Vec::new(),
                    status_from_process_error(ToolId::Bandit, &e, ctx.logs),
                ))
            }
        };
        ctx.logs.save_output(ToolId::Bandit, &output);

        // Bandit exits non-zero whenever it has findings, so the exit
        // code alone says nothing; the JSON body decides.
        let json = match parse_json_output(ToolId::Bandit, &output, ctx.logs) {
            Ok(json) => json,
            Err(status) => return Ok((Vec::new(), status)),
        };

        let findings: Vec<Finding> = json
            .get("results")
            .and_then(|r| r.as_array())
            .map(|results| results.iter().map(Self::finding_from).collect())
            .unwrap_or_default();

        debug!("bandit reported {} issues", findings.len());
        Ok((findings, ToolStatus::Success))
    }
}

//! Semgrep adapter: multi-language pattern scanning
//!
//! Runs semgrep over the whole selected-file set. The executable is
//! resolved from the active virtualenv first, falling back to the
//! search path, because a project-local semgrep install usually carries
//! the rulesets the project expects.

use crate::models::{Finding, Severity, ToolId, ToolStatus};
use crate::process::{run_tool, RunOptions};
use crate::scanners::base::{
    parse_json_output, status_from_process_error, truncate_description, ScanContext, ToolAdapter,
};
use anyhow::Result;
use serde_json::Value as JsonValue;
use std::path::PathBuf;
use tracing::{debug, info};

pub struct SemgrepAdapter;

impl SemgrepAdapter {
    /// Prefer `$VIRTUAL_ENV/bin/semgrep` (Scripts\ on Windows) over the
    /// system search path.
    fn resolve_executable() -> String {
        if let Ok(venv) = std::env::var("VIRTUAL_ENV") {
            let candidate = if cfg!(windows) {
                PathBuf::from(&venv).join("Scripts").join("semgrep.exe")
            } else {
                PathBuf::from(&venv).join("bin").join("semgrep")
            };
            if candidate.is_file() {
                return candidate.to_string_lossy().into_owned();
            }
        }
        "semgrep".to_string()
    }

    fn map_severity(native: &str) -> Severity {
        match native.to_uppercase().as_str() {
            "ERROR" => Severity::High,
            "WARNING" => Severity::Medium,
            "INFO" => Severity::Low,
            _ => Severity::Medium,
        }
    }

    fn finding_from(item: &JsonValue) -> Finding {
        let extra = item.get("extra");
        let severity = Self::map_severity(
            extra
                .and_then(|e| e.get("severity"))
                .and_then(|s| s.as_str())
                .unwrap_or(""),
        );

        Finding {
            tool: ToolId::Semgrep,
            severity,
            file_path: item
                .get("path")
                .and_then(|p| p.as_str())
                .unwrap_or("")
                .to_string(),
            line_number: item
                .get("start")
                .and_then(|s| s.get("line"))
                .and_then(|l| l.as_u64())
                .map(|n| n as u32),
            type_id: item
                .get("check_id")
                .and_then(|c| c.as_str())
                .unwrap_or("UNKNOWN")
                .to_string(),
            description: truncate_description(
                extra
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                    .unwrap_or(""),
            ),
            code_snippet: extra
                .and_then(|e| e.get("lines"))
                .and_then(|l| l.as_str())
                .filter(|s| !s.is_empty())
                .map(|s| s.trim_end().to_string()),
            cwe_id: None,
            confidence: Some("MEDIUM".to_string()),
        }
    }
}

impl ToolAdapter for SemgrepAdapter {
    fn tool(&self) -> ToolId {
        ToolId::Semgrep
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<(Vec<Finding>, ToolStatus)> {
        let files = ctx.files.all();
        if files.is_empty() {
            return Ok((Vec::new(), ToolStatus::skipped("no source files to scan")));
        }

        info!("Running semgrep on {} files", files.len());

        let mut cmd = vec![
            Self::resolve_executable(),
            "--config=auto".to_string(),
            "--json".to_string(),
        ];
        cmd.extend(files.iter().map(|p| p.to_string_lossy().into_owned()));

        let opts = RunOptions::new("semgrep", ctx.timeouts.for_tool(ToolId::Semgrep))
            .current_dir(ctx.project_root)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUTF8", "1");

        let output = match run_tool(&cmd, &opts, ctx.retry) {
            Ok(output) => output,
            Err(e) => {
                return Ok((
                    Vec::new(),
                    status_from_process_error(ToolId::Semgrep, &e, ctx.logs),
                ))
            }
        };
        ctx.logs.save_output(ToolId::Semgrep, &output);

        let json = match parse_json_output(ToolId::Semgrep, &output, ctx.logs) {
            Ok(json) => json,
            Err(status) => return Ok((Vec::new(), status)),
        };

        let findings: Vec<Finding> = json
            .get("results")
            .and_then(|r| r.as_array())
            .map(|results| results.iter().map(Self::finding_from).collect())
            .unwrap_or_default();

        debug!("semgrep reported {} issues", findings.len());
        Ok((findings, ToolStatus::Success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_mapping() {
        assert_eq!(SemgrepAdapter::map_severity("ERROR"), Severity::High);
        assert_eq!(SemgrepAdapter::map_severity("WARNING"), Severity::Medium);
        assert_eq!(SemgrepAdapter::map_severity("INFO"), Severity::Low);
        assert_eq!(SemgrepAdapter::map_severity("EXPERIMENT"), Severity::Medium);
    }

    #[test]
    fn parses_a_semgrep_result() {
        let item: JsonValue = serde_json::from_str(
            r#"{
                "check_id": "python.lang.security.deserialization.pickle.avoid-pickle",
                "path": "worker/tasks.py",
                "start": {"line": 17, "col": 5},
                "end": {"line": 17, "col": 38},
                "extra": {
                    "severity": "ERROR",
                    "message": "Avoid using pickle, which is known to lead to code execution.",
                    "lines": "result = pickle.loads(blob)"
                }
            }"#,
        )
        .unwrap();

        let finding = SemgrepAdapter::finding_from(&item);
        assert_eq!(finding.tool, ToolId::Semgrep);
        assert_eq!(finding.severity, Severity::High);
        assert_eq!(finding.file_path, "worker/tasks.py");
        assert_eq!(finding.line_number, Some(17));
        assert!(finding.type_id.ends_with("avoid-pickle"));
        assert_eq!(
            finding.code_snippet.as_deref(),
            Some("result = pickle.loads(blob)")
        );
    }

    #[test]
    fn falls_back_to_path_lookup_without_virtualenv() {
        // The test environment has no VIRTUAL_ENV pointing at a semgrep
        // install, so resolution lands on the bare name.
        if std::env::var("VIRTUAL_ENV").is_err() {
            assert_eq!(SemgrepAdapter::resolve_executable(), "semgrep");
        }
    }
}

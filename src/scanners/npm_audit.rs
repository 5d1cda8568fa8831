//! npm audit adapter: Node.js dependency vulnerability audit
//!
//! Finds the nearest `package.json` anywhere under the project
//! (dependency caches excluded) and runs `npm audit --json` from that
//! manifest's directory, since npm resolves the tree relative to its
//! working directory.

use crate::models::{Finding, Severity, ToolId, ToolStatus};
use crate::process::{run_tool, RunOptions};
use crate::scanners::base::{
    parse_json_output, status_from_process_error, truncate_description, ScanContext, ToolAdapter,
};
use anyhow::Result;
use ignore::WalkBuilder;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub struct NpmAuditAdapter;

impl NpmAuditAdapter {
    /// Shallowest `package.json` under `root`, skipping `node_modules`.
    fn find_manifest(root: &Path) -> Option<PathBuf> {
        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(false)
            .require_git(false)
            .filter_entry(|entry| {
                entry.depth() == 0 || entry.file_name().to_string_lossy() != "node_modules"
            })
            .build();

        walker
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.file_type().map(|t| t.is_file()).unwrap_or(false)
                    && e.file_name() == "package.json"
            })
            .map(|e| e.into_path())
            .min_by_key(|p| p.components().count())
    }

    fn map_severity(native: &str) -> Severity {
        match native.to_lowercase().as_str() {
            "critical" => Severity::Critical,
            "high" => Severity::High,
            "moderate" => Severity::Medium,
            "low" | "info" => Severity::Low,
            _ => Severity::Medium,
        }
    }

    /// Flatten the npm v7+ report: one entry per vulnerable package,
    /// with direct advisories taken from the object entries of `via`.
    fn findings_from(json: &JsonValue) -> Vec<Finding> {
        let Some(vulns) = json.get("vulnerabilities").and_then(|v| v.as_object()) else {
            return Vec::new();
        };

        let mut findings = Vec::new();
        for (package, info) in vulns {
            let severity =
                Self::map_severity(info.get("severity").and_then(|s| s.as_str()).unwrap_or(""));
            let range = info.get("range").and_then(|r| r.as_str()).unwrap_or("*");

            let advisories: Vec<&JsonValue> = info
                .get("via")
                .and_then(|v| v.as_array())
                .map(|via| via.iter().filter(|entry| entry.is_object()).collect())
                .unwrap_or_default();

            if advisories.is_empty() {
                // Only transitive references: the package is affected
                // through its dependencies.
                let via_names: Vec<&str> = info
                    .get("via")
                    .and_then(|v| v.as_array())
                    .map(|via| via.iter().filter_map(|e| e.as_str()).collect())
                    .unwrap_or_default();
                findings.push(Finding {
                    tool: ToolId::NpmAudit,
                    severity,
                    file_path: "package.json".to_string(),
                    line_number: None,
                    type_id: format!("NPM_TRANSITIVE_{}", package.to_uppercase()),
                    description: truncate_description(&format!(
                        "{package} {range} is vulnerable via {}",
                        via_names.join(", ")
                    )),
                    code_snippet: Some(format!("{package}@{range}")),
                    cwe_id: None,
                    confidence: Some("HIGH".to_string()),
                });
                continue;
            }

            for advisory in advisories {
                let title = advisory
                    .get("title")
                    .and_then(|t| t.as_str())
                    .unwrap_or("No description available");
                let source = advisory.get("source").and_then(|s| s.as_u64());
                let url = advisory.get("url").and_then(|u| u.as_str()).unwrap_or("");
                let cwe_id = advisory
                    .get("cwe")
                    .and_then(|c| c.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|c| c.as_str())
                    .map(str::to_string);

                let description = if url.is_empty() {
                    format!("{package} {range}: {title}")
                } else {
                    format!("{package} {range}: {title} ({url})")
                };

                findings.push(Finding {
                    tool: ToolId::NpmAudit,
                    severity,
                    file_path: "package.json".to_string(),
                    line_number: None,
                    type_id: source
                        .map(|id| format!("NPM_{id}"))
                        .unwrap_or_else(|| format!("NPM_{}", package.to_uppercase())),
                    description: truncate_description(&description),
                    code_snippet: Some(format!("{package}@{range}")),
                    cwe_id,
                    confidence: Some("HIGH".to_string()),
                });
            }
        }
        findings
    }
}

impl ToolAdapter for NpmAuditAdapter {
    fn tool(&self) -> ToolId {
        ToolId::NpmAudit
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<(Vec<Finding>, ToolStatus)> {
        let Some(manifest) = Self::find_manifest(ctx.project_root) else {
            return Ok((Vec::new(), ToolStatus::skipped("no package.json found")));
        };
        // The manifest is a file found by the walker, so it has a parent.
        let manifest_dir = manifest.parent().unwrap_or(ctx.project_root);

        info!("Running npm audit in {}", manifest_dir.display());

        let cmd = vec![
            ToolId::NpmAudit.executable().to_string(),
            "audit".to_string(),
            "--json".to_string(),
        ];
        let opts = RunOptions::new("npm audit", ctx.timeouts.for_tool(ToolId::NpmAudit))
            .current_dir(manifest_dir);

        let output = match run_tool(&cmd, &opts, ctx.retry) {
            Ok(output) => output,
            Err(e) => {
                return Ok((
                    Vec::new(),
                    status_from_process_error(ToolId::NpmAudit, &e, ctx.logs),
                ))
            }
        };
        ctx.logs.save_output(ToolId::NpmAudit, &output);

        // npm audit exits 1 when vulnerabilities exist; the JSON body is
        // authoritative either way.
        let json = match parse_json_output(ToolId::NpmAudit, &output, ctx.logs) {
            Ok(json) => json,
            Err(status) => return Ok((Vec::new(), status)),
        };

        if let Some(error) = json.get("error") {
            let summary = error
                .get("summary")
                .and_then(|s| s.as_str())
                .unwrap_or("npm audit reported an error");
            return Ok((Vec::new(), ToolStatus::failed(truncate_description(summary))));
        }

        let findings = Self::findings_from(&json);
        debug!("npm audit reported {} vulnerable packages", findings.len());
        Ok((findings, ToolStatus::Success))
    }
}

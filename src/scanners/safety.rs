//! Safety adapter: Python dependency vulnerability audit
//!
//! Audits `requirements.txt` against the safety advisory database.
//! Known-vulnerable dependencies are always actionable, so every
//! finding is reported HIGH. A manifest with broken text encoding is
//! repaired into a clean temporary copy before invocation rather than
//! letting the tool choke on it.

use crate::models::{Finding, Severity, ToolId, ToolStatus};
use crate::process::{run_tool, RunOptions};
use crate::scanners::base::{
    parse_json_output, status_from_process_error, truncate_description, ScanContext, ToolAdapter,
};
use anyhow::{Context, Result};
use serde_json::Value as JsonValue;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MANIFEST: &str = "requirements.txt";

pub struct SafetyAdapter;

enum ManifestSource {
    Original(PathBuf),
    /// Clean re-encoded copy; the temp file must outlive the tool run.
    Cleaned(tempfile::NamedTempFile),
}

impl ManifestSource {
    fn path(&self) -> &Path {
        match self {
            ManifestSource::Original(path) => path,
            ManifestSource::Cleaned(file) => file.path(),
        }
    }
}

impl SafetyAdapter {
    /// Use the manifest as-is when it is valid UTF-8, otherwise write a
    /// lossily re-encoded copy and point safety at that.
    fn prepare_manifest(path: PathBuf) -> Result<ManifestSource> {
        let bytes = std::fs::read(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        match std::str::from_utf8(&bytes) {
            Ok(_) => Ok(ManifestSource::Original(path)),
            Err(e) => {
                warn!(
                    "{} has invalid UTF-8 ({}); auditing a cleaned copy",
                    path.display(),
                    e
                );
                let clean = String::from_utf8_lossy(&bytes);
                let mut file = tempfile::Builder::new()
                    .prefix("requirements-clean-")
                    .suffix(".txt")
                    .tempfile()
                    .context("failed to create cleaned requirements copy")?;
                file.write_all(clean.as_bytes())
                    .context("failed to write cleaned requirements copy")?;
                Ok(ManifestSource::Cleaned(file))
            }
        }
    }

    fn findings_from(json: &JsonValue) -> Vec<Finding> {
        // Modern safety emits an object with a vulnerabilities array;
        // older releases emit a bare list.
        if let Some(vulns) = json.get("vulnerabilities").and_then(|v| v.as_array()) {
            vulns.iter().map(Self::finding_from_modern).collect()
        } else if let Some(items) = json.as_array() {
            items.iter().map(Self::finding_from_legacy).collect()
        } else {
            Vec::new()
        }
    }

    fn finding_from_modern(vuln: &JsonValue) -> Finding {
        let package = vuln
            .get("package_name")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let version = vuln
            .get("analyzed_version")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let vuln_id = vuln
            .get("vulnerability_id")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let cve = vuln.get("CVE").and_then(|v| v.as_str()).unwrap_or("");
        let advisory = vuln
            .get("advisory")
            .and_then(|v| v.as_str())
            .unwrap_or("No description available");

        let type_id = if cve.is_empty() {
            format!("SAFETY_{vuln_id}")
        } else {
            format!("{cve}_{vuln_id}")
        };

        Finding {
            tool: ToolId::Safety,
            severity: Severity::High,
            file_path: MANIFEST.to_string(),
            line_number: None,
            type_id,
            description: truncate_description(&format!("{package} {version}: {advisory}")),
            code_snippet: Some(format!("{package}=={version}")),
            cwe_id: None,
            confidence: Some("HIGH".to_string()),
        }
    }

    fn finding_from_legacy(item: &JsonValue) -> Finding {
        let package = item.get("package").and_then(|v| v.as_str()).unwrap_or("unknown");
        let version = item
            .get("installed_version")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        let advisory = item
            .get("vulnerability")
            .and_then(|v| v.as_str())
            .unwrap_or("No description available");

        Finding {
            tool: ToolId::Safety,
            severity: Severity::High,
            file_path: MANIFEST.to_string(),
            line_number: None,
            type_id: format!("VULNERABLE_DEPENDENCY_{}", package.to_uppercase()),
            description: truncate_description(&format!("{package} {version}: {advisory}")),
            code_snippet: Some(format!("{package}=={version}")),
            cwe_id: None,
            confidence: Some("HIGH".to_string()),
        }
    }
}

impl ToolAdapter for SafetyAdapter {
    fn tool(&self) -> ToolId {
        ToolId::Safety
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<(Vec<Finding>, ToolStatus)> {
        let manifest_path = ctx.project_root.join(MANIFEST);
        if !manifest_path.exists() {
            return Ok((
                Vec::new(),
                ToolStatus::skipped("no requirements.txt found"),
            ));
        }

        let manifest = Self::prepare_manifest(manifest_path)?;

        info!("Running safety against {}", manifest.path().display());

        let cmd = vec![
            "safety".to_string(),
            "check".to_string(),
            "--file".to_string(),
            manifest.path().to_string_lossy().into_owned(),
            "--json".to_string(),
        ];
        let opts = RunOptions::new("safety", ctx.timeouts.for_tool(ToolId::Safety))
            .current_dir(ctx.project_root)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONUTF8", "1");

        let output = match run_tool(&cmd, &opts, ctx.retry) {
            Ok(output) => output,
            Err(e) => {
                return Ok((
                    Vec::new(),
                    status_from_process_error(ToolId::Safety, &e, ctx.logs),
                ))
            }
        };
        ctx.logs.save_output(ToolId::Safety, &output);

        // A clean dependency set yields exit 0 and nothing on stdout.
        if output.stdout.trim().is_empty() && output.exit_code == 0 {
            return Ok((Vec::new(), ToolStatus::Success));
        }

        let json = match parse_json_output(ToolId::Safety, &output, ctx.logs) {
            Ok(json) => json,
            Err(status) => return Ok((Vec::new(), status)),
        };

        let findings = Self::findings_from(&json);
        debug!("safety reported {} vulnerable dependencies", findings.len());
        Ok((findings, ToolStatus::Success))
    }
}

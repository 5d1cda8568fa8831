//! detect-secrets adapter: hardcoded credential detection
//!
//! Scans the whole project tree, not just the selected source buckets,
//! since secrets leak into config files, CI manifests, and anything
//! else. CWE-798: Use of Hard-coded Credentials.
//!
//! The secret value itself never reaches a finding: the snippet carries
//! only a short hash prefix for correlation.

use crate::models::{Finding, Severity, ToolId, ToolStatus};
use crate::process::{run_tool, RunOptions};
use crate::scanners::base::{
    parse_json_output, status_from_process_error, ScanContext, ToolAdapter,
};
use anyhow::Result;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

/// Characters of the secret hash surfaced for correlation.
const HASH_PREFIX_CHARS: usize = 8;

pub struct SecretsAdapter;

impl SecretsAdapter {
    /// Placeholder snippet carrying a hash prefix instead of the value.
    ///
    /// detect-secrets reports a `hashed_secret` for every result; if it
    /// is ever absent, a digest of the location stands in so findings
    /// stay correlatable across runs.
    fn redacted_snippet(item: &JsonValue, file: &str) -> String {
        let prefix: String = match item.get("hashed_secret").and_then(|h| h.as_str()) {
            Some(hash) => hash.chars().take(HASH_PREFIX_CHARS).collect(),
            None => {
                let line = item.get("line_number").and_then(|l| l.as_u64()).unwrap_or(0);
                let digest = Sha256::digest(format!("{file}:{line}").as_bytes());
                format!("{digest:x}").chars().take(HASH_PREFIX_CHARS).collect()
            }
        };
        format!("[secret redacted: {prefix}]")
    }

    fn findings_from(json: &JsonValue) -> Vec<Finding> {
        let Some(results) = json.get("results").and_then(|r| r.as_object()) else {
            return Vec::new();
        };

        let mut findings = Vec::new();
        for (file, items) in results {
            let Some(items) = items.as_array() else {
                continue;
            };
            for item in items {
                let secret_type = item
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("Unknown Secret");
                findings.push(Finding {
                    tool: ToolId::DetectSecrets,
                    severity: Severity::High,
                    file_path: file.clone(),
                    line_number: item
                        .get("line_number")
                        .and_then(|l| l.as_u64())
                        .map(|n| n as u32),
                    type_id: secret_type.to_string(),
                    description: format!("Potential hardcoded secret ({secret_type})"),
                    code_snippet: Some(Self::redacted_snippet(item, file)),
                    cwe_id: Some("CWE-798".to_string()),
                    confidence: item
                        .get("is_verified")
                        .and_then(|v| v.as_bool())
                        .map(|verified| if verified { "HIGH" } else { "MEDIUM" }.to_string()),
                });
            }
        }
        findings
    }
}

impl ToolAdapter for SecretsAdapter {
    fn tool(&self) -> ToolId {
        ToolId::DetectSecrets
    }

    fn scan(&self, ctx: &ScanContext<'_>) -> Result<(Vec<Finding>, ToolStatus)> {
        info!("Running detect-secrets over {}", ctx.project_root.display());

        let cmd = vec![
            "detect-secrets".to_string(),
            "scan".to_string(),
            "--all-files".to_string(),
            ctx.project_root.to_string_lossy().into_owned(),
        ];
        let opts = RunOptions::new(
            "detect-secrets",
            ctx.timeouts.for_tool(ToolId::DetectSecrets),
        )
        .current_dir(ctx.project_root);

        let output = match run_tool(&cmd, &opts, ctx.retry) {
            Ok(output) => output,
            Err(e) => {
                return Ok((
                    Vec::new(),
                    status_from_process_error(ToolId::DetectSecrets, &e, ctx.logs),
                ))
            }
        };
        ctx.logs.save_output(ToolId::DetectSecrets, &output);

        let json = match parse_json_output(ToolId::DetectSecrets, &output, ctx.logs) {
            Ok(json) => json,
            Err(status) => return Ok((Vec::new(), status)),
        };

        let findings = Self::findings_from(&json);
        debug!("detect-secrets reported {} potential secrets", findings.len());
        Ok((findings, ToolStatus::Success))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn findings_are_high_and_redacted() {
        let json: JsonValue = serde_json::from_str(
            r#"{
                "results": {
                    "config/settings.py": [{
                        "type": "Secret Keyword",
                        "line_number": 12,
                        "hashed_secret": "414d0d3dc54232cc1a5a5f9ee2c110a00b021456",
                        "is_verified": false
                    }]
                }
            }"#,
        )
        .unwrap();

        let findings = SecretsAdapter::findings_from(&json);
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.severity, Severity::High);
        assert_eq!(f.file_path, "config/settings.py");
        assert_eq!(f.line_number, Some(12));
        assert_eq!(f.cwe_id.as_deref(), Some("CWE-798"));
        assert_eq!(
            f.code_snippet.as_deref(),
            Some("[secret redacted: 414d0d3d]")
        );
        assert_eq!(f.confidence.as_deref(), Some("MEDIUM"));
    }

    #[test]
    fn snippet_never_contains_the_secret() {
        let json: JsonValue = serde_json::from_str(
            r#"{
                "results": {
                    ".env": [{
                        "type": "Basic Auth Credentials",
                        "line_number": 2,
                        "hashed_secret": "abcdef0123456789"
                    }]
                }
            }"#,
        )
        .unwrap();

        let findings = SecretsAdapter::findings_from(&json);
        let snippet = findings[0].code_snippet.as_deref().unwrap();
        assert!(snippet.starts_with("[secret redacted: "));
        assert!(!snippet.contains("hunter2"));
        assert_eq!(snippet.len(), "[secret redacted: ".len() + 8 + 1);
    }

    #[test]
    fn missing_hash_falls_back_to_location_digest() {
        let json: JsonValue = serde_json::from_str(
            r#"{"results": {"a.py": [{"type": "Hex High Entropy String", "line_number": 7}]}}"#,
        )
        .unwrap();

        let findings = SecretsAdapter::findings_from(&json);
        let snippet = findings[0].code_snippet.as_deref().unwrap();
        assert!(snippet.starts_with("[secret redacted: "));
    }

    #[test]
    fn empty_results_give_no_findings() {
        let json: JsonValue = serde_json::from_str(r#"{"results": {}}"#).unwrap();
        assert!(SecretsAdapter::findings_from(&json).is_empty());
    }
}

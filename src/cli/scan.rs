//! Scan command - run the orchestrator against a project

use crate::config::ScanConfig;
use crate::engine::ScanEngine;
use crate::models::{ScanResult, Severity, ToolId};
use anyhow::{bail, Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

pub(super) fn run(
    path: PathBuf,
    format: &str,
    output: Option<PathBuf>,
    fail_on: Option<String>,
    workers: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let project_root = path
        .canonicalize()
        .with_context(|| format!("project path does not exist: {}", path.display()))?;

    let mut config = ScanConfig::load(&project_root);
    if let Some(workers) = workers {
        config.workers = workers;
    }

    let mut engine = ScanEngine::new(&project_root, config);

    let spinner = if quiet {
        None
    } else {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .expect("static spinner template"),
        );
        bar.enable_steady_tick(Duration::from_millis(100));
        Some(bar)
    };

    if let Some(ref bar) = spinner {
        let bar = bar.clone();
        engine = engine.with_progress_callback(Box::new(move |snapshot: &str| {
            if let Some(line) = snapshot.lines().last() {
                bar.set_message(line.to_string());
            }
        }));
    }

    let result = engine.run()?;

    if let Some(bar) = spinner {
        bar.finish_and_clear();
    }

    let rendered = match format {
        "json" => serde_json::to_string_pretty(&result)?,
        _ => render_text(&result),
    };

    match output {
        Some(path) => {
            std::fs::write(&path, &rendered)
                .with_context(|| format!("failed to write report to {}", path.display()))?;
            println!("Report saved to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    if let Some(threshold) = fail_on {
        let threshold: Severity = threshold
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))?;
        let hits = result
            .findings
            .iter()
            .filter(|f| f.severity >= threshold)
            .count();
        if hits > 0 {
            bail!("{hits} findings at or above {threshold}");
        }
    }

    Ok(())
}

fn render_text(result: &ScanResult) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{}\n",
        style(format!(
            "Scan {} — {} issues, score {:.0} ({})",
            result.overall_status,
            result.total_issues(),
            result.health_score,
            result.grade
        ))
        .bold()
    ));

    out.push_str(&format!(
        "  {} critical, {} high, {} medium, {} low\n\n",
        style(result.severity_counts.critical).red(),
        style(result.severity_counts.high).yellow(),
        result.severity_counts.medium,
        result.severity_counts.low
    ));

    out.push_str("Tools:\n");
    for tool in ToolId::ALL {
        if let Some(status) = result.tool_statuses.get(&tool) {
            let marker = if status.is_success() {
                style("✓").green()
            } else if status.is_skipped() {
                style("-").dim()
            } else {
                style("✗").red()
            };
            out.push_str(&format!("  {} {:<15} {}\n", marker, tool.to_string(), status));
        }
    }

    if !result.findings.is_empty() {
        out.push('\n');
        for finding in &result.findings {
            let location = match finding.line_number {
                Some(line) => format!("{}:{}", finding.file_path, line),
                None => finding.file_path.clone(),
            };
            out.push_str(&format!(
                "  [{}] {} {} — {}\n",
                finding.severity,
                style(&finding.type_id).cyan(),
                location,
                finding.description
            ));
        }
    }

    out.push_str(&format!("\nLogs: {}\n", result.logs_path.display()));
    out
}

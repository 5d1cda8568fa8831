//! Scan orchestration engine
//!
//! Drives one scan end to end:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                      ScanEngine                        │
//! ├────────────────────────────────────────────────────────┤
//! │  1. Select files, create run logs                      │
//! │  2. Probe tool availability (short-circuit if none)    │
//! │  3. Run available adapters on a bounded worker pool    │
//! │  4. Aggregate findings in fixed tool precedence        │
//! │  5. Score, grade, write the badge                      │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! Per-tool problems become statuses, never errors: a panicking or
//! erroring adapter is caught and recorded as failed while the other
//! tools keep running. The engine is single-use; `run` consumes it.

use crate::badge;
use crate::config::ScanConfig;
use crate::logs::RunLogs;
use crate::models::{
    OverallStatus, ScanResult, SeverityCounts, ToolId, ToolRunOutcome, ToolStatus,
};
use crate::probe::{Probe, ProbeCache, ProbeResult, ToolProber};
use crate::process::RetryPolicy;
use crate::progress::{ProgressCallback, ProgressLog};
use crate::scanners::{default_adapters, ScanContext, ToolAdapter};
use crate::scoring;
use crate::selection::select_files;
use anyhow::Result;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub struct ScanEngine {
    project_root: PathBuf,
    config: ScanConfig,
    adapters: Vec<Arc<dyn ToolAdapter>>,
    prober: Box<dyn Probe>,
    probe_cache: ProbeCache,
    retry: RetryPolicy,
    progress: ProgressLog,
    run_id: String,
}

impl ScanEngine {
    /// Engine over the full default adapter set.
    ///
    /// `project_root` is assumed to be pre-validated by the caller
    /// (resolved, not a system directory); the engine does not
    /// re-implement path security.
    pub fn new(project_root: impl Into<PathBuf>, config: ScanConfig) -> Self {
        Self {
            project_root: project_root.into(),
            config,
            adapters: default_adapters(),
            prober: Box::new(ToolProber),
            probe_cache: ProbeCache::default(),
            retry: RetryPolicy::standard(),
            progress: ProgressLog::default(),
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Stream progress lines to an observer after every state change.
    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress = ProgressLog::new(Some(callback));
        self
    }

    /// Replace the adapter set (tests, partial scans).
    pub fn with_adapters(mut self, adapters: Vec<Arc<dyn ToolAdapter>>) -> Self {
        self.adapters = adapters;
        self
    }

    /// Replace the availability prober (tests).
    pub fn with_prober(mut self, prober: Box<dyn Probe>) -> Self {
        self.prober = prober;
        self
    }

    /// Replace the process retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Execute the scan. Consuming `self` makes a run single-use: the
    /// state machine never re-enters a state.
    pub fn run(self) -> Result<ScanResult> {
        let start = Instant::now();
        let project_name = self
            .project_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.project_root.display().to_string());

        self.progress
            .push(format!("Initializing scan for {project_name}"));
        let logs = RunLogs::create(&self.config.logs_dir, &self.run_id)?;

        let files = select_files(&self.project_root, &self.config.limits, &self.progress);

        // DETECTING_TOOLS
        self.progress.push("Detecting available tools".to_string());
        let tools: Vec<ToolId> = self.adapters.iter().map(|a| a.tool()).collect();
        let probes = self.probe_cache.probe_all(self.prober.as_ref(), &tools);
        for (tool, probe) in &probes {
            self.progress.push(format!(
                "{tool}: {}",
                if probe.available {
                    probe.detail.as_str()
                } else {
                    "unavailable"
                }
            ));
        }

        let available: Vec<Arc<dyn ToolAdapter>> = self
            .adapters
            .iter()
            .filter(|a| probes.get(&a.tool()).map(|p| p.available).unwrap_or(false))
            .cloned()
            .collect();

        if available.is_empty() {
            warn!("No analysis tools available; scan cannot run");
            self.progress
                .push("No analysis tools available; scan failed".to_string());
            return Ok(self.short_circuit_result(&tools, &probes, logs));
        }

        // RUNNING
        let width = self.config.workers.min(available.len()).max(1);
        self.progress.push(format!(
            "Running {} tools on {} workers",
            available.len(),
            width
        ));

        let ctx = ScanContext {
            project_root: &self.project_root,
            files: &files,
            logs: &logs,
            timeouts: &self.config.timeouts,
            retry: &self.retry,
        };

        let pool = rayon::ThreadPoolBuilder::new().num_threads(width).build()?;
        let mut outcomes: Vec<ToolRunOutcome> = pool.install(|| {
            available
                .par_iter()
                .map(|adapter| {
                    let outcome = run_adapter(adapter.as_ref(), &ctx);
                    // Completion order, not submission order.
                    self.progress.push(format!(
                        "{}: {} ({} findings)",
                        outcome.tool,
                        outcome.status,
                        outcome.findings.len()
                    ));
                    outcome
                })
                .collect()
        });

        // AGGREGATING
        self.progress.push("Aggregating results".to_string());
        outcomes.sort_by_key(|o| o.tool);

        let mut tool_statuses: BTreeMap<ToolId, ToolStatus> = probes
            .iter()
            .filter(|(_, probe)| !probe.available)
            .map(|(&tool, probe)| (tool, ToolStatus::skipped(probe.detail.clone())))
            .collect();

        let mut findings = Vec::new();
        for outcome in outcomes {
            tool_statuses.insert(outcome.tool, outcome.status);
            findings.extend(outcome.findings);
        }

        let dispatched: Vec<ToolId> = available.iter().map(|a| a.tool()).collect();
        let failed_tools: Vec<ToolId> = dispatched
            .iter()
            .copied()
            .filter(|tool| {
                tool_statuses
                    .get(tool)
                    .map(|s| s.is_failed())
                    .unwrap_or(false)
            })
            .collect();

        let overall_status = if failed_tools.len() == dispatched.len() {
            OverallStatus::Failed
        } else if !failed_tools.is_empty() {
            OverallStatus::PartialComplete
        } else {
            OverallStatus::Complete
        };

        let severity_counts = SeverityCounts::from_findings(&findings);
        let health_score = scoring::health_score(&severity_counts);
        let grade = scoring::grade(health_score).to_string();

        let badge_path = self.project_root.join(badge::BADGE_FILE);
        if let Err(e) = badge::write(&badge_path, &grade, health_score) {
            warn!("Could not write badge: {e:#}");
        }

        self.progress.push(format!(
            "Scan {} in {:.1}s: {} issues (critical: {}, high: {}, medium: {}, low: {}), score {:.0} ({})",
            overall_status,
            start.elapsed().as_secs_f64(),
            findings.len(),
            severity_counts.critical,
            severity_counts.high,
            severity_counts.medium,
            severity_counts.low,
            health_score,
            grade
        ));
        if !failed_tools.is_empty() {
            self.progress.push(format!(
                "Failed tools: {}",
                failed_tools
                    .iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        info!(
            "Scan {} finished: {} findings, score {:.0} ({})",
            self.run_id,
            findings.len(),
            health_score,
            grade
        );

        Ok(ScanResult {
            findings,
            severity_counts,
            tools_used: tools,
            tool_statuses,
            failed_tools,
            overall_status,
            health_score,
            grade,
            logs_path: logs.path().to_path_buf(),
        })
    }

    /// Terminal result when no tool could run at all. Not an error: the
    /// caller still gets a structured result with every tool recorded
    /// as unavailable.
    fn short_circuit_result(
        &self,
        tools: &[ToolId],
        probes: &BTreeMap<ToolId, ProbeResult>,
        logs: RunLogs,
    ) -> ScanResult {
        let tool_statuses: BTreeMap<ToolId, ToolStatus> = tools
            .iter()
            .map(|&tool| {
                let detail = probes
                    .get(&tool)
                    .map(|p| p.detail.clone())
                    .unwrap_or_else(|| format!("not installed ({})", tool.install_hint()));
                (tool, ToolStatus::skipped(detail))
            })
            .collect();

        let severity_counts = SeverityCounts::default();
        let health_score = scoring::health_score(&severity_counts);
        ScanResult {
            findings: Vec::new(),
            severity_counts,
            tools_used: tools.to_vec(),
            tool_statuses,
            failed_tools: Vec::new(),
            overall_status: OverallStatus::Failed,
            grade: scoring::grade(health_score).to_string(),
            health_score,
            logs_path: logs.path().to_path_buf(),
        }
    }
}

/// Run one adapter, converting errors and panics into a failed status
/// so a defective tool can never abort the run.
fn run_adapter(adapter: &dyn ToolAdapter, ctx: &ScanContext<'_>) -> ToolRunOutcome {
    let tool = adapter.tool();
    let result =
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| adapter.scan(ctx)));

    match result {
        Ok(Ok((findings, status))) => ToolRunOutcome {
            tool,
            status,
            findings,
        },
        Ok(Err(e)) => {
            warn!("{} adapter failed: {e:#}", tool);
            ToolRunOutcome {
                tool,
                status: ToolStatus::failed(format!("{e:#}")),
                findings: Vec::new(),
            }
        }
        Err(panic) => {
            let message = if let Some(s) = panic.downcast_ref::<&str>() {
                (*s).to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                "unknown panic".to_string()
            };
            error!("{} adapter panicked: {}", tool, message);
            ToolRunOutcome {
                tool,
                status: ToolStatus::failed(format!("panic: {message}")),
                findings: Vec::new(),
            }
        }
    }
}

/// Convenience entry point: configure from the project root and scan
/// with the default adapters.
pub fn scan_project(
    project_root: &Path,
    progress_callback: Option<ProgressCallback>,
) -> Result<ScanResult> {
    let config = ScanConfig::load(project_root);
    let mut engine = ScanEngine::new(project_root, config);
    if let Some(callback) = progress_callback {
        engine = engine.with_progress_callback(callback);
    }
    engine.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Finding, Severity};
    use crate::probe::ProbeResult;

    struct StubProber {
        available: Vec<ToolId>,
    }

    impl Probe for StubProber {
        fn probe(&self, tool: ToolId) -> ProbeResult {
            if self.available.contains(&tool) {
                ProbeResult {
                    available: true,
                    detail: "stub 1.0".to_string(),
                }
            } else {
                ProbeResult {
                    available: false,
                    detail: format!("not installed ({})", tool.install_hint()),
                }
            }
        }
    }

    enum MockBehavior {
        Findings(Vec<Severity>),
        Skip(&'static str),
        Fail(&'static str),
        Error,
        Panic,
    }

    struct MockAdapter {
        id: ToolId,
        behavior: MockBehavior,
    }

    impl ToolAdapter for MockAdapter {
        fn tool(&self) -> ToolId {
            self.id
        }

        fn scan(&self, _ctx: &ScanContext<'_>) -> Result<(Vec<Finding>, ToolStatus)> {
            match &self.behavior {
                MockBehavior::Findings(severities) => {
                    let findings = severities
                        .iter()
                        .map(|&severity| Finding {
                            tool: self.id,
                            severity,
                            file_path: "app.py".to_string(),
                            line_number: Some(1),
                            type_id: "T100".to_string(),
                            description: "mock finding".to_string(),
                            code_snippet: None,
                            cwe_id: None,
                            confidence: None,
                        })
                        .collect();
                    Ok((findings, ToolStatus::Success))
                }
                MockBehavior::Skip(reason) => Ok((Vec::new(), ToolStatus::skipped(*reason))),
                MockBehavior::Fail(reason) => Ok((Vec::new(), ToolStatus::failed(*reason))),
                MockBehavior::Error => anyhow::bail!("adapter blew up"),
                MockBehavior::Panic => panic!("adapter panicked hard"),
            }
        }
    }

    fn engine_with(
        adapters: Vec<Arc<dyn ToolAdapter>>,
        available: Vec<ToolId>,
    ) -> (tempfile::TempDir, ScanEngine) {
        let project = tempfile::tempdir().unwrap();
        let mut config = ScanConfig::default();
        config.logs_dir = project.path().join("logs");
        let engine = ScanEngine::new(project.path(), config)
            .with_adapters(adapters)
            .with_prober(Box::new(StubProber { available }));
        (project, engine)
    }

    #[test]
    fn all_tools_unavailable_short_circuits_to_failed() {
        let (_project, engine) = engine_with(default_adapters(), vec![]);
        let result = engine.run().unwrap();

        assert_eq!(result.overall_status, OverallStatus::Failed);
        assert!(result.findings.is_empty());
        assert!(result.failed_tools.is_empty());
        assert_eq!(result.tool_statuses.len(), ToolId::ALL.len());
        for status in result.tool_statuses.values() {
            assert!(status.is_skipped());
            assert!(status.to_string().contains("not installed"));
        }
    }

    #[test]
    fn successful_tools_aggregate_to_complete() {
        let adapters: Vec<Arc<dyn ToolAdapter>> = vec![
            Arc::new(MockAdapter {
                id: ToolId::Bandit,
                behavior: MockBehavior::Findings(vec![Severity::High, Severity::Low]),
            }),
            Arc::new(MockAdapter {
                id: ToolId::Safety,
                behavior: MockBehavior::Skip("no requirements.txt found"),
            }),
            Arc::new(MockAdapter {
                id: ToolId::DetectSecrets,
                behavior: MockBehavior::Findings(vec![Severity::High]),
            }),
        ];
        let (_project, engine) = engine_with(
            adapters,
            vec![ToolId::Bandit, ToolId::Safety, ToolId::DetectSecrets],
        );
        let result = engine.run().unwrap();

        assert_eq!(result.overall_status, OverallStatus::Complete);
        assert_eq!(result.findings.len(), 3);
        assert_eq!(result.severity_counts.total(), result.findings.len());
        assert_eq!(result.severity_counts.high, 2);
        assert!(result.failed_tools.is_empty());
        assert!(result
            .tool_statuses
            .get(&ToolId::Safety)
            .unwrap()
            .is_skipped());
    }

    #[test]
    fn partial_failure_yields_partial_complete() {
        let adapters: Vec<Arc<dyn ToolAdapter>> = vec![
            Arc::new(MockAdapter {
                id: ToolId::Bandit,
                behavior: MockBehavior::Findings(vec![Severity::Medium]),
            }),
            Arc::new(MockAdapter {
                id: ToolId::Semgrep,
                behavior: MockBehavior::Fail("unparseable output"),
            }),
        ];
        let (_project, engine) = engine_with(adapters, vec![ToolId::Bandit, ToolId::Semgrep]);
        let result = engine.run().unwrap();

        assert_eq!(result.overall_status, OverallStatus::PartialComplete);
        assert_eq!(result.failed_tools, vec![ToolId::Semgrep]);
        assert_eq!(result.findings.len(), 1);
    }

    #[test]
    fn every_dispatched_tool_failing_yields_failed() {
        let adapters: Vec<Arc<dyn ToolAdapter>> = vec![
            Arc::new(MockAdapter {
                id: ToolId::Bandit,
                behavior: MockBehavior::Fail("timeout after 120s"),
            }),
            Arc::new(MockAdapter {
                id: ToolId::Semgrep,
                behavior: MockBehavior::Error,
            }),
        ];
        let (_project, engine) = engine_with(adapters, vec![ToolId::Bandit, ToolId::Semgrep]);
        let result = engine.run().unwrap();

        assert_eq!(result.overall_status, OverallStatus::Failed);
        assert_eq!(result.failed_tools.len(), 2);
    }

    #[test]
    fn panicking_adapter_becomes_failed_status() {
        let adapters: Vec<Arc<dyn ToolAdapter>> = vec![
            Arc::new(MockAdapter {
                id: ToolId::Bandit,
                behavior: MockBehavior::Panic,
            }),
            Arc::new(MockAdapter {
                id: ToolId::DetectSecrets,
                behavior: MockBehavior::Findings(vec![Severity::Critical]),
            }),
        ];
        let (_project, engine) =
            engine_with(adapters, vec![ToolId::Bandit, ToolId::DetectSecrets]);
        let result = engine.run().unwrap();

        assert_eq!(result.overall_status, OverallStatus::PartialComplete);
        let bandit = result.tool_statuses.get(&ToolId::Bandit).unwrap();
        assert!(bandit.to_string().contains("panic"));
        // The panicking tool did not take the others down.
        assert_eq!(result.findings.len(), 1);
    }

    #[test]
    fn findings_are_ordered_by_tool_precedence() {
        // DetectSecrets is declared last in precedence even though its
        // mock finishes instantly.
        let adapters: Vec<Arc<dyn ToolAdapter>> = vec![
            Arc::new(MockAdapter {
                id: ToolId::DetectSecrets,
                behavior: MockBehavior::Findings(vec![Severity::High]),
            }),
            Arc::new(MockAdapter {
                id: ToolId::Bandit,
                behavior: MockBehavior::Findings(vec![Severity::Low]),
            }),
        ];
        let (_project, engine) =
            engine_with(adapters, vec![ToolId::Bandit, ToolId::DetectSecrets]);
        let result = engine.run().unwrap();

        let order: Vec<ToolId> = result.findings.iter().map(|f| f.tool).collect();
        assert_eq!(order, vec![ToolId::Bandit, ToolId::DetectSecrets]);
    }

    #[test]
    fn unavailable_tool_does_not_count_as_failed() {
        let adapters: Vec<Arc<dyn ToolAdapter>> = vec![
            Arc::new(MockAdapter {
                id: ToolId::Bandit,
                behavior: MockBehavior::Findings(vec![]),
            }),
            Arc::new(MockAdapter {
                id: ToolId::Semgrep,
                behavior: MockBehavior::Findings(vec![]),
            }),
        ];
        // Semgrep is registered but absent from the environment.
        let (_project, engine) = engine_with(adapters, vec![ToolId::Bandit]);
        let result = engine.run().unwrap();

        assert_eq!(result.overall_status, OverallStatus::Complete);
        assert!(result.failed_tools.is_empty());
        assert!(result
            .tool_statuses
            .get(&ToolId::Semgrep)
            .unwrap()
            .is_skipped());
    }

    #[test]
    fn progress_callback_streams_lines() {
        use std::sync::Mutex;
        let seen: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        let adapters: Vec<Arc<dyn ToolAdapter>> = vec![Arc::new(MockAdapter {
            id: ToolId::Bandit,
            behavior: MockBehavior::Findings(vec![Severity::High]),
        })];
        let (_project, engine) = engine_with(adapters, vec![ToolId::Bandit]);
        let engine = engine.with_progress_callback(Box::new(move |snapshot: &str| {
            seen_clone.lock().unwrap().push(snapshot.to_string());
        }));
        engine.run().unwrap();

        let seen = seen.lock().unwrap();
        assert!(!seen.is_empty());
        let last = seen.last().unwrap();
        assert!(last.contains("Detecting available tools"));
        assert!(last.contains("bandit: success (1 findings)"));
    }

    #[test]
    fn badge_is_written_next_to_the_project() {
        let adapters: Vec<Arc<dyn ToolAdapter>> = vec![Arc::new(MockAdapter {
            id: ToolId::Bandit,
            behavior: MockBehavior::Findings(vec![]),
        })];
        let (project, engine) = engine_with(adapters, vec![ToolId::Bandit]);
        engine.run().unwrap();
        assert!(project.path().join(badge::BADGE_FILE).exists());
    }
}

//! Tool availability probing
//!
//! A tool counts as available only if its executable resolves on the
//! search path *and* answers a `--version` query with exit code 0 within
//! a short timeout. Probes run concurrently so a slow or broken tool
//! never delays the others. Results are cached with a short
//! re-validation interval; the cache is owned by the engine, not a
//! process-wide singleton.

use crate::models::ToolId;
use crate::process::{run_tool, ProcessError, RetryPolicy, RunOptions};
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long a single version query may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Worker cap for concurrent probing.
const PROBE_WORKERS: usize = 4;

/// Result of probing one tool.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub available: bool,
    /// Version line when available, otherwise an explanation with an
    /// install hint.
    pub detail: String,
}

/// Seam for availability checks so the engine can be driven with stub
/// probers in tests.
pub trait Probe: Send + Sync {
    fn probe(&self, tool: ToolId) -> ProbeResult;

    /// Probe several tools concurrently on a small worker pool.
    fn probe_all(&self, tools: &[ToolId]) -> BTreeMap<ToolId, ProbeResult> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(PROBE_WORKERS.min(tools.len().max(1)))
            .build();
        match pool {
            Ok(pool) => pool.install(|| {
                use rayon::prelude::*;
                tools
                    .par_iter()
                    .map(|&tool| (tool, self.probe(tool)))
                    .collect()
            }),
            // Pool creation failing is no reason to skip probing.
            Err(_) => tools.iter().map(|&t| (t, self.probe(t))).collect(),
        }
    }
}

/// Probes real executables by running their version query.
pub struct ToolProber;

impl Probe for ToolProber {
    fn probe(&self, tool: ToolId) -> ProbeResult {
        let cmd = vec![tool.executable().to_string(), "--version".to_string()];
        let opts = RunOptions::new(tool.as_str(), PROBE_TIMEOUT);

        match run_tool(&cmd, &opts, &RetryPolicy::disabled()) {
            Ok(output) if output.exit_code == 0 => {
                let version = output
                    .stdout
                    .lines()
                    .next()
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .unwrap_or("installed")
                    .to_string();
                debug!("{}: {}", tool, version);
                ProbeResult {
                    available: true,
                    detail: version,
                }
            }
            Ok(output) => ProbeResult {
                available: false,
                detail: format!(
                    "version check failed (exit code {}): {}",
                    output.exit_code,
                    output.stderr.lines().next().unwrap_or("").trim()
                ),
            },
            Err(ProcessError::NotFound { .. }) => ProbeResult {
                available: false,
                detail: format!("not installed ({})", tool.install_hint()),
            },
            Err(ProcessError::Timeout { .. }) => ProbeResult {
                available: false,
                detail: "version check timed out".to_string(),
            },
            Err(e) => {
                warn!("Probing {} failed: {}", tool, e);
                ProbeResult {
                    available: false,
                    detail: format!("probe error: {e}"),
                }
            }
        }
    }
}

/// Probe results with a re-validation TTL.
///
/// Owned by the orchestrator for the duration of a run; callers that
/// keep an engine context alive across runs get cheap re-probes within
/// the TTL and fresh ones after it.
pub struct ProbeCache {
    ttl: Duration,
    entries: Mutex<HashMap<ToolId, (Instant, ProbeResult)>>,
}

impl ProbeCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return fresh-enough cached results, probing the rest through
    /// `prober` and caching what comes back.
    pub fn probe_all(
        &self,
        prober: &dyn Probe,
        tools: &[ToolId],
    ) -> BTreeMap<ToolId, ProbeResult> {
        let now = Instant::now();
        let mut results = BTreeMap::new();
        let mut stale = Vec::new();

        {
            let entries = self.entries.lock().expect("probe cache poisoned");
            for &tool in tools {
                match entries.get(&tool) {
                    Some((at, cached)) if now.duration_since(*at) < self.ttl => {
                        results.insert(tool, cached.clone());
                    }
                    _ => stale.push(tool),
                }
            }
        }

        if !stale.is_empty() {
            let probed = prober.probe_all(&stale);
            let mut entries = self.entries.lock().expect("probe cache poisoned");
            for (tool, result) in probed {
                entries.insert(tool, (now, result.clone()));
                results.insert(tool, result);
            }
        }

        results
    }
}

impl Default for ProbeCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProber {
        calls: AtomicUsize,
    }

    impl Probe for CountingProber {
        fn probe(&self, _tool: ToolId) -> ProbeResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            ProbeResult {
                available: true,
                detail: "stub 1.0".to_string(),
            }
        }
    }

    #[test]
    fn cache_serves_fresh_entries_without_reprobing() {
        let prober = CountingProber {
            calls: AtomicUsize::new(0),
        };
        let cache = ProbeCache::new(Duration::from_secs(60));

        let first = cache.probe_all(&prober, &ToolId::ALL);
        assert_eq!(first.len(), ToolId::ALL.len());
        assert_eq!(prober.calls.load(Ordering::SeqCst), ToolId::ALL.len());

        let second = cache.probe_all(&prober, &ToolId::ALL);
        assert_eq!(second.len(), ToolId::ALL.len());
        assert_eq!(prober.calls.load(Ordering::SeqCst), ToolId::ALL.len());
    }

    #[test]
    fn cache_reprobes_after_ttl() {
        let prober = CountingProber {
            calls: AtomicUsize::new(0),
        };
        let cache = ProbeCache::new(Duration::ZERO);

        cache.probe_all(&prober, &[ToolId::Bandit]);
        cache.probe_all(&prober, &[ToolId::Bandit]);
        assert_eq!(prober.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn probing_a_missing_tool_reports_not_installed() {
        // None of the analyzers ship in the test environment, so the
        // real prober exercises the not-found path.
        let result = ToolProber.probe(ToolId::Bandit);
        if !result.available {
            assert!(!result.detail.is_empty());
        }
    }
}

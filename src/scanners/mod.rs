//! Tool adapters
//!
//! One adapter per external analysis tool. Each builds its command
//! line from the selected files, invokes the resilient process runner,
//! parses the tool-specific output, and maps it into the canonical
//! finding schema. Severity mapping is fixed per adapter; unknown
//! native values default to MEDIUM.

pub mod bandit;
pub mod base;
pub mod npm_audit;
pub mod safety;
pub mod secrets;
pub mod semgrep;

pub use base::{ScanContext, ToolAdapter};

use std::sync::Arc;

/// The full adapter set, in aggregation precedence order.
pub fn default_adapters() -> Vec<Arc<dyn ToolAdapter>> {
    vec![
        Arc::new(bandit::BanditAdapter),
        Arc::new(safety::SafetyAdapter),
        Arc::new(npm_audit::NpmAuditAdapter),
        Arc::new(semgrep::SemgrepAdapter),
        Arc::new(secrets::SecretsAdapter),
    ]
}

//! Progress reporting abstraction for long-running upstream operations.
//!
//! Decouples the poll loop and services from the MCP transport. MCP tools
//! build a reporter from their `Meta`/`Peer`; CLI handlers and tests use
//! the no-op reporter.

use std::sync::Arc;

use async_trait::async_trait;

/// Reports progress for long-running operations.
///
/// `progress` runs from 0.0 to `total` (conventionally 1.0). Reporting is
/// fire-and-forget: implementations must never fail the caller.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, progress: f64, total: f64, message: Option<String>);

    /// Report one poll attempt out of a capped number of attempts.
    async fn attempt(&self, attempt: usize, max_attempts: usize, message: &str) {
        let progress = attempt as f64 / max_attempts as f64;
        self.report(progress, 1.0, Some(message.to_string())).await;
    }
}

/// No-op reporter for the CLI, tests, and clients without a progress token.
pub struct NoopProgressReporter;

#[async_trait]
impl ProgressReporter for NoopProgressReporter {
    async fn report(&self, _progress: f64, _total: f64, _message: Option<String>) {}
}

pub fn noop_progress() -> Arc<dyn ProgressReporter> {
    Arc::new(NoopProgressReporter)
}

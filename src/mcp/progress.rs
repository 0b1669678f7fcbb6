//! MCP-specific progress reporter.
//!
//! Wraps `Peer<RoleServer>` and the request's `ProgressToken` to forward
//! progress notifications while an upstream operation is still polling.
//! Built from tool `Meta`; falls back to the no-op reporter when the client
//! did not ask for progress.

use async_trait::async_trait;
use rmcp::model::{ProgressNotificationParam, ProgressToken};
use rmcp::{Peer, RoleServer};

use crate::progress::ProgressReporter;

pub struct McpProgressReporter {
    client: Peer<RoleServer>,
    token: ProgressToken,
}

impl McpProgressReporter {
    pub fn new(client: Peer<RoleServer>, token: ProgressToken) -> Self {
        Self { client, token }
    }
}

#[async_trait]
impl ProgressReporter for McpProgressReporter {
    async fn report(&self, progress: f64, total: f64, message: Option<String>) {
        let _ = self
            .client
            .notify_progress(ProgressNotificationParam {
                progress_token: self.token.clone(),
                progress,
                total: Some(total),
                message,
            })
            .await;
    }
}

/// Create a progress reporter from MCP Meta + Peer, falling back to noop.
pub fn make_mcp_progress(
    meta: &rmcp::model::Meta,
    client: &Peer<RoleServer>,
) -> std::sync::Arc<dyn ProgressReporter> {
    match meta.get_progress_token() {
        Some(token) => std::sync::Arc::new(McpProgressReporter::new(client.clone(), token.clone())),
        None => crate::progress::noop_progress(),
    }
}

//! MCP-backed elicitation transport.
//!
//! Bridges the coordinator's `ElicitationClient` seam onto the protocol's
//! elicitation feature: support is whatever the client advertised in its
//! initialize-time capabilities, and one round trip is one
//! `elicitation/create` request. The request and result cross through
//! serde so this adapter owns no schema shape of its own.

use async_trait::async_trait;
use rmcp::model::{CreateElicitationRequestParams, CreateElicitationResult};
use rmcp::{Peer, RoleServer};
use serde_json::{json, Value};

use crate::pipeline::{ElicitAction, ElicitOutcome, ElicitRequest, ElicitationClient};
use crate::FathomError;

pub struct McpElicitationClient {
    client: Peer<RoleServer>,
}

impl McpElicitationClient {
    pub fn new(client: Peer<RoleServer>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ElicitationClient for McpElicitationClient {
    fn supported(&self) -> bool {
        self.client
            .peer_info()
            .is_some_and(|info| info.capabilities.elicitation.is_some())
    }

    async fn elicit(&self, request: &ElicitRequest) -> Result<ElicitOutcome, FathomError> {
        let param: CreateElicitationRequestParams = serde_json::from_value(json!({
            "message": request.message,
            "requestedSchema": request.requested_schema(),
        }))
        .map_err(|e| FathomError::Elicitation(format!("unrepresentable request: {}", e)))?;

        let result: CreateElicitationResult = self
            .client
            .create_elicitation(param)
            .await
            .map_err(|e| FathomError::Elicitation(format!("round trip failed: {}", e)))?;

        let raw = serde_json::to_value(&result)
            .map_err(|e| FathomError::Elicitation(format!("unreadable response: {}", e)))?;

        let action = match raw.get("action").and_then(Value::as_str) {
            Some("accept") => ElicitAction::Accept,
            Some("decline") => ElicitAction::Decline,
            Some("cancel") => ElicitAction::Cancel,
            other => {
                return Err(FathomError::Elicitation(format!(
                    "unknown elicitation action {:?}",
                    other
                )))
            }
        };
        let content = raw
            .get("content")
            .and_then(Value::as_object)
            .cloned();

        Ok(ElicitOutcome { action, content })
    }
}

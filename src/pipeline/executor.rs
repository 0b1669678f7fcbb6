//! The composition root of the pipeline.
//!
//! One path for every tool call: structural validation → elicitation of
//! missing parameters → re-validation → execution under the deadline →
//! shaping on success, classification then shaping on failure. Exactly one
//! of the two terminal paths runs; no outcome is ever swallowed, and no
//! domain failure escapes as a transport-level error.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::pipeline::deadline::with_deadline;
use crate::pipeline::elicit::{ElicitStep, ElicitationCoordinator};
use crate::pipeline::insight::{classify_error, Insight};
use crate::pipeline::shape::{shape, ShapeConfig, Summarizer};
use crate::FathomError;

/// Ephemeral per-invocation record. Created and destroyed within one call;
/// never persisted.
#[derive(Debug, Clone)]
pub struct ToolCallContext {
    pub tool_name: String,
    pub raw_params: Value,
    /// Parameters after elicitation merged in; equals `raw_params` when no
    /// elicitation ran.
    pub merged_params: Value,
    pub deadline_at: DateTime<Utc>,
    pub request_id: String,
}

impl ToolCallContext {
    pub fn new(tool_name: &str, raw_params: Value, deadline_ms: u64) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            merged_params: raw_params.clone(),
            raw_params,
            deadline_at: Utc::now() + Duration::milliseconds(deadline_ms as i64),
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

/// The in-band result envelope handed back to the transport layer.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub text: String,
    pub structured: Option<Value>,
    pub is_error: bool,
    /// Present on the error path: the classified failure.
    pub insight: Option<Insight>,
}

/// Wires deadline, elicitation, classification, and shaping around each
/// domain operation. Holds only initialization-time configuration; safe to
/// share across concurrent invocations.
pub struct ToolExecutor {
    tool_timeout_ms: u64,
    shape_config: ShapeConfig,
    summarizer: Option<Arc<dyn Summarizer>>,
}

impl ToolExecutor {
    pub fn new(config: &PipelineConfig, summarizer: Option<Arc<dyn Summarizer>>) -> Self {
        Self {
            tool_timeout_ms: config.tool_timeout_ms,
            shape_config: ShapeConfig {
                max_chars: config.response_budget,
                summarizer_timeout_ms: config.summarizer_timeout_ms,
                summary_token_budget: config.response_budget / 16,
            },
            summarizer,
        }
    }

    /// Full pipeline run for one tool call.
    ///
    /// `validate` checks the parameter map structurally and is applied both
    /// before and after elicitation; `steps` describe what to elicit when
    /// the first validation fails. The domain `operation` receives the
    /// merged parameters and runs under the call deadline.
    pub async fn run<T, V, O, Fut>(
        &self,
        ctx: &mut ToolCallContext,
        coordinator: &ElicitationCoordinator,
        steps: &[ElicitStep],
        validate: V,
        operation: O,
    ) -> Envelope
    where
        T: serde::Serialize,
        V: Fn(&Map<String, Value>) -> Result<(), FathomError>,
        O: FnOnce(Map<String, Value>) -> Fut,
        Fut: Future<Output = Result<T, FathomError>>,
    {
        let mut params = match ctx.raw_params.as_object() {
            Some(map) => map.clone(),
            None => {
                return self
                    .failure(
                        ctx,
                        &FathomError::Validation("tool arguments must be a JSON object".into()),
                    )
                    .await;
            }
        };

        if let Err(first_failure) = validate(&params) {
            if steps.is_empty() {
                return self.failure(ctx, &first_failure).await;
            }
            if let Err(e) = coordinator.run_sequence(&mut params, steps).await {
                return self.failure(ctx, &e).await;
            }
            // Re-validate after the merge; an unsupported client changed
            // nothing and fails here with the original complaint.
            if let Err(e) = validate(&params) {
                return self.failure(ctx, &e).await;
            }
        }

        ctx.merged_params = Value::Object(params.clone());
        tracing::debug!(
            request_id = %ctx.request_id,
            tool = %ctx.tool_name,
            "Executing under {}ms deadline",
            self.tool_timeout_ms
        );

        match with_deadline(operation(params), self.tool_timeout_ms, &ctx.tool_name).await {
            Ok(result) => self.success(result).await,
            Err(e) => self.failure(ctx, &e).await,
        }
    }

    async fn success<T: serde::Serialize>(&self, result: T) -> Envelope {
        let payload = match serde_json::to_value(&result) {
            Ok(v) => v,
            Err(e) => {
                // Unserializable results are a bug in the tool, but even
                // then the caller gets an envelope, not a transport error.
                return Envelope {
                    text: format!("Result serialization failed: {}", e),
                    structured: None,
                    is_error: true,
                    insight: None,
                };
            }
        };
        let shaped = shape(
            &payload,
            &self.shape_config,
            self.summarizer.as_deref(),
            Some(payload.clone()),
        )
        .await;
        Envelope {
            text: shaped.text,
            structured: shaped.structured,
            is_error: false,
            insight: None,
        }
    }

    /// Classification then shaping; the classifier's output is itself the
    /// payload so even a huge upstream error message respects the budget.
    pub async fn failure(&self, ctx: &ToolCallContext, err: &FathomError) -> Envelope {
        let insight = classify_error(err, &ctx.tool_name);
        tracing::warn!(
            request_id = %ctx.request_id,
            tool = %ctx.tool_name,
            code = insight.code.as_str(),
            "Tool call failed: {}",
            insight.message
        );
        let payload = serde_json::to_value(&insight).unwrap_or_else(|_| {
            Value::String(insight.message.clone())
        });
        // No summarizer on the error path: errors should truncate, not
        // paraphrase.
        let shaped = shape(&payload, &self.shape_config, None, None).await;
        Envelope {
            text: shaped.text,
            structured: None,
            is_error: true,
            insight: Some(insight),
        }
    }
}

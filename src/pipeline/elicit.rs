//! Interactive parameter elicitation.
//!
//! When a tool call arrives without required parameters and the client
//! advertised elicitation support at session start, the call pauses and asks
//! the client for them: a schema restricted to primitive fields goes out,
//! and an accept/decline/cancel answer comes back. The suspension is an
//! ordinary `await` on the round trip — no separate thread, no callback.
//!
//! State machine per request:
//! `NotNeeded → Requested → { Accepted | Declined | Cancelled | TimedOut }`.
//! TimedOut is treated as Cancelled for merge purposes. Decline and Cancel
//! are terminal: the coordinator returns a "user declined" failure and
//! nothing is retried.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::pipeline::deadline::with_deadline;
use crate::FathomError;

/// Schema for one elicited field. Deliberately closed over primitives:
/// no nested objects, no arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveSchema {
    String {
        description: Option<String>,
        min_length: Option<usize>,
        max_length: Option<usize>,
    },
    Integer {
        description: Option<String>,
        minimum: Option<i64>,
        maximum: Option<i64>,
    },
    Number {
        description: Option<String>,
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean {
        description: Option<String>,
    },
    Enum {
        description: Option<String>,
        values: Vec<String>,
    },
}

impl PrimitiveSchema {
    pub fn string(description: &str) -> Self {
        PrimitiveSchema::String {
            description: Some(description.to_string()),
            min_length: None,
            max_length: None,
        }
    }

    pub fn integer(description: &str, minimum: Option<i64>, maximum: Option<i64>) -> Self {
        PrimitiveSchema::Integer {
            description: Some(description.to_string()),
            minimum,
            maximum,
        }
    }

    pub fn boolean(description: &str) -> Self {
        PrimitiveSchema::Boolean {
            description: Some(description.to_string()),
        }
    }

    pub fn string_enum(description: &str, values: &[&str]) -> Self {
        PrimitiveSchema::Enum {
            description: Some(description.to_string()),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    /// JSON-schema rendering used on the wire.
    pub fn to_schema_value(&self) -> Value {
        let mut out = Map::new();
        match self {
            PrimitiveSchema::String {
                description,
                min_length,
                max_length,
            } => {
                out.insert("type".into(), json!("string"));
                if let Some(d) = description {
                    out.insert("description".into(), json!(d));
                }
                if let Some(n) = min_length {
                    out.insert("minLength".into(), json!(n));
                }
                if let Some(n) = max_length {
                    out.insert("maxLength".into(), json!(n));
                }
            }
            PrimitiveSchema::Integer {
                description,
                minimum,
                maximum,
            } => {
                out.insert("type".into(), json!("integer"));
                if let Some(d) = description {
                    out.insert("description".into(), json!(d));
                }
                if let Some(n) = minimum {
                    out.insert("minimum".into(), json!(n));
                }
                if let Some(n) = maximum {
                    out.insert("maximum".into(), json!(n));
                }
            }
            PrimitiveSchema::Number {
                description,
                minimum,
                maximum,
            } => {
                out.insert("type".into(), json!("number"));
                if let Some(d) = description {
                    out.insert("description".into(), json!(d));
                }
                if let Some(n) = minimum {
                    out.insert("minimum".into(), json!(n));
                }
                if let Some(n) = maximum {
                    out.insert("maximum".into(), json!(n));
                }
            }
            PrimitiveSchema::Boolean { description } => {
                out.insert("type".into(), json!("boolean"));
                if let Some(d) = description {
                    out.insert("description".into(), json!(d));
                }
            }
            PrimitiveSchema::Enum {
                description,
                values,
            } => {
                out.insert("type".into(), json!("string"));
                if let Some(d) = description {
                    out.insert("description".into(), json!(d));
                }
                out.insert("enum".into(), json!(values));
            }
        }
        Value::Object(out)
    }

    /// Validate a returned value against this schema. A violation is a hard
    /// error — values are never silently dropped or coerced.
    pub fn validate(&self, name: &str, value: &Value) -> Result<(), FathomError> {
        let fail = |why: String| Err(FathomError::Elicitation(format!("field '{}': {}", name, why)));
        match self {
            PrimitiveSchema::String {
                min_length,
                max_length,
                ..
            } => {
                let Some(s) = value.as_str() else {
                    return fail("expected a string".into());
                };
                if let Some(min) = min_length {
                    if s.chars().count() < *min {
                        return fail(format!("shorter than minimum length {}", min));
                    }
                }
                if let Some(max) = max_length {
                    if s.chars().count() > *max {
                        return fail(format!("longer than maximum length {}", max));
                    }
                }
                Ok(())
            }
            PrimitiveSchema::Integer { minimum, maximum, .. } => {
                let Some(n) = value.as_i64() else {
                    return fail("expected an integer".into());
                };
                if let Some(min) = minimum {
                    if n < *min {
                        return fail(format!("{} is below minimum {}", n, min));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        return fail(format!("{} is above maximum {}", n, max));
                    }
                }
                Ok(())
            }
            PrimitiveSchema::Number { minimum, maximum, .. } => {
                let Some(n) = value.as_f64() else {
                    return fail("expected a number".into());
                };
                if let Some(min) = minimum {
                    if n < *min {
                        return fail(format!("{} is below minimum {}", n, min));
                    }
                }
                if let Some(max) = maximum {
                    if n > *max {
                        return fail(format!("{} is above maximum {}", n, max));
                    }
                }
                Ok(())
            }
            PrimitiveSchema::Boolean { .. } => {
                if value.is_boolean() {
                    Ok(())
                } else {
                    fail("expected a boolean".into())
                }
            }
            PrimitiveSchema::Enum { values, .. } => {
                let Some(s) = value.as_str() else {
                    return fail("expected a string".into());
                };
                if values.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    fail(format!("'{}' is not one of {:?}", s, values))
                }
            }
        }
    }
}

/// A request for structured input from the calling client.
#[derive(Debug, Clone)]
pub struct ElicitRequest {
    pub message: String,
    /// Ordered field name → schema pairs.
    pub properties: Vec<(String, PrimitiveSchema)>,
    pub required: Vec<String>,
}

impl ElicitRequest {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            properties: Vec::new(),
            required: Vec::new(),
        }
    }

    pub fn field(mut self, name: &str, schema: PrimitiveSchema, required: bool) -> Self {
        self.properties.push((name.to_string(), schema));
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    fn schema_for(&self, name: &str) -> Option<&PrimitiveSchema> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    /// Wire rendering: `{ "type": "object", "properties": ..., "required": ... }`.
    pub fn requested_schema(&self) -> Value {
        let mut properties = Map::new();
        for (name, schema) in &self.properties {
            properties.insert(name.clone(), schema.to_schema_value());
        }
        json!({
            "type": "object",
            "properties": properties,
            "required": self.required,
        })
    }
}

/// How the client answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElicitAction {
    Accept,
    Decline,
    Cancel,
}

/// The client's answer: an action plus, on accept, the field values.
#[derive(Debug, Clone)]
pub struct ElicitOutcome {
    pub action: ElicitAction,
    pub content: Option<Map<String, Value>>,
}

/// Terminal states of one elicitation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElicitState {
    /// Client does not support elicitation; nothing was requested.
    NotNeeded,
    Requested,
    Accepted,
    Declined,
    Cancelled,
    TimedOut,
}

/// Transport seam: how an elicitation request reaches the client.
#[async_trait]
pub trait ElicitationClient: Send + Sync {
    /// Whether the client advertised elicitation support at session start.
    fn supported(&self) -> bool;

    async fn elicit(&self, request: &ElicitRequest) -> Result<ElicitOutcome, FathomError>;
}

/// Builds one step of a multi-step flow from the parameters accumulated so
/// far, or `None` when the step is not needed. Earlier accepted answers are
/// already merged into the map, so later steps can seed their schemas and
/// defaults from them.
pub type ElicitStep = Box<dyn Fn(&Map<String, Value>) -> Option<ElicitRequest> + Send + Sync>;

/// Runs elicitation rounds and merges accepted answers into call parameters.
pub struct ElicitationCoordinator {
    client: Arc<dyn ElicitationClient>,
    timeout_ms: u64,
}

impl ElicitationCoordinator {
    pub fn new(client: Arc<dyn ElicitationClient>, timeout_ms: u64) -> Self {
        Self { client, timeout_ms }
    }

    /// Run one elicitation round for `request`, merging accepted content
    /// into `params`.
    ///
    /// Returns `Ok(NotNeeded)` when the client lacks elicitation support
    /// (the caller then proceeds to its normal validation failure), and
    /// `Ok(Accepted)` after a validated merge. Decline, cancel, and timeout
    /// come back as `FathomError::Declined`; schema violations and transport
    /// failures as `FathomError::Elicitation`.
    pub async fn fill_missing(
        &self,
        params: &mut Map<String, Value>,
        request: &ElicitRequest,
    ) -> Result<ElicitState, FathomError> {
        if !self.client.supported() {
            return Ok(ElicitState::NotNeeded);
        }

        tracing::debug!(
            fields = request.properties.len(),
            "Requesting input from client: {}",
            request.message
        );

        let outcome = match with_deadline(
            self.client.elicit(request),
            self.timeout_ms,
            "elicitation",
        )
        .await
        {
            Ok(outcome) => outcome,
            Err(FathomError::Timeout { .. }) => {
                // Treated as a cancellation: nothing merges, nothing retries.
                return Err(FathomError::Declined(format!(
                    "no answer to '{}' within {}ms (treated as cancelled)",
                    request.message, self.timeout_ms
                )));
            }
            Err(other) => return Err(other),
        };

        match outcome.action {
            ElicitAction::Decline => Err(FathomError::Declined(format!(
                "declined to provide input for '{}'",
                request.message
            ))),
            ElicitAction::Cancel => Err(FathomError::Declined(format!(
                "cancelled the request for '{}'",
                request.message
            ))),
            ElicitAction::Accept => {
                let content = outcome.content.unwrap_or_default();
                Self::merge_validated(params, request, content)?;
                Ok(ElicitState::Accepted)
            }
        }
    }

    /// Validate every returned field against its declared schema, then merge.
    /// Caller-supplied non-empty values always win over elicited ones.
    fn merge_validated(
        params: &mut Map<String, Value>,
        request: &ElicitRequest,
        content: Map<String, Value>,
    ) -> Result<(), FathomError> {
        for (name, value) in &content {
            let Some(schema) = request.schema_for(name) else {
                return Err(FathomError::Elicitation(format!(
                    "field '{}' was not requested",
                    name
                )));
            };
            schema.validate(name, value)?;
        }

        for (name, value) in content {
            if is_empty(params.get(&name)) {
                params.insert(name, value);
            }
        }
        Ok(())
    }

    /// Run a fixed, ordered sequence of elicitation steps. Each step sees
    /// the parameters accumulated so far; abandoning any step (decline,
    /// cancel, timeout, validation failure) aborts the whole sequence.
    pub async fn run_sequence(
        &self,
        params: &mut Map<String, Value>,
        steps: &[ElicitStep],
    ) -> Result<ElicitState, FathomError> {
        let mut state = ElicitState::NotNeeded;
        for step in steps {
            let Some(request) = step(params) else {
                continue;
            };
            match self.fill_missing(params, &request).await? {
                ElicitState::NotNeeded => return Ok(ElicitState::NotNeeded),
                s => state = s,
            }
        }
        Ok(state)
    }
}

/// True when `params` lacks a usable value for `key`. Step builders use
/// this to decide what still needs asking.
pub fn missing(params: &Map<String, Value>, key: &str) -> bool {
    is_empty(params.get(key))
}

/// Absent, null, and empty-string values may be overwritten by elicited
/// content; anything else the caller supplied is kept.
fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted client: returns canned outcomes in order.
    struct ScriptedClient {
        supported: bool,
        outcomes: Vec<ElicitOutcome>,
        calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn accepting(content: Map<String, Value>) -> Self {
            Self {
                supported: true,
                outcomes: vec![ElicitOutcome {
                    action: ElicitAction::Accept,
                    content: Some(content),
                }],
                calls: AtomicUsize::new(0),
            }
        }

        fn with(action: ElicitAction) -> Self {
            Self {
                supported: true,
                outcomes: vec![ElicitOutcome {
                    action,
                    content: None,
                }],
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ElicitationClient for ScriptedClient {
        fn supported(&self) -> bool {
            self.supported
        }

        async fn elicit(&self, _request: &ElicitRequest) -> Result<ElicitOutcome, FathomError> {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcomes[i.min(self.outcomes.len() - 1)].clone())
        }
    }

    fn name_request() -> ElicitRequest {
        ElicitRequest::new("The index name is required")
            .field("name", PrimitiveSchema::string("Index name"), true)
    }

    fn content(pairs: &[(&str, Value)]) -> Map<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_unsupported_client_short_circuits() {
        let client = Arc::new(ScriptedClient {
            supported: false,
            outcomes: vec![],
            calls: AtomicUsize::new(0),
        });
        let coordinator = ElicitationCoordinator::new(client.clone(), 1_000);
        let mut params = Map::new();
        let state = coordinator
            .fill_missing(&mut params, &name_request())
            .await
            .expect("Should short-circuit");
        assert_eq!(state, ElicitState::NotNeeded);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        assert!(params.is_empty());
    }

    #[tokio::test]
    async fn test_accept_merges_validated_content() {
        let client = Arc::new(ScriptedClient::accepting(content(&[(
            "name",
            json!("products"),
        )])));
        let coordinator = ElicitationCoordinator::new(client, 1_000);
        let mut params = Map::new();
        let state = coordinator
            .fill_missing(&mut params, &name_request())
            .await
            .expect("Should accept");
        assert_eq!(state, ElicitState::Accepted);
        assert_eq!(params.get("name"), Some(&json!("products")));
    }

    #[tokio::test]
    async fn test_caller_values_are_never_overwritten() {
        let client = Arc::new(ScriptedClient::accepting(content(&[(
            "name",
            json!("elicited"),
        )])));
        let coordinator = ElicitationCoordinator::new(client, 1_000);
        let mut params = content(&[("name", json!("caller-supplied"))]);
        coordinator
            .fill_missing(&mut params, &name_request())
            .await
            .expect("Should accept");
        assert_eq!(params.get("name"), Some(&json!("caller-supplied")));
    }

    #[tokio::test]
    async fn test_empty_string_counts_as_missing() {
        let client = Arc::new(ScriptedClient::accepting(content(&[(
            "name",
            json!("elicited"),
        )])));
        let coordinator = ElicitationCoordinator::new(client, 1_000);
        let mut params = content(&[("name", json!(""))]);
        coordinator
            .fill_missing(&mut params, &name_request())
            .await
            .expect("Should accept");
        assert_eq!(params.get("name"), Some(&json!("elicited")));
    }

    #[tokio::test]
    async fn test_decline_is_terminal_and_merges_nothing() {
        let client = Arc::new(ScriptedClient::with(ElicitAction::Decline));
        let coordinator = ElicitationCoordinator::new(client, 1_000);
        let mut params = Map::new();
        let result = coordinator.fill_missing(&mut params, &name_request()).await;
        assert!(matches!(result, Err(FathomError::Declined(_))));
        assert!(params.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_is_terminal() {
        let client = Arc::new(ScriptedClient::with(ElicitAction::Cancel));
        let coordinator = ElicitationCoordinator::new(client, 1_000);
        let mut params = Map::new();
        let result = coordinator.fill_missing(&mut params, &name_request()).await;
        assert!(matches!(result, Err(FathomError::Declined(_))));
    }

    #[tokio::test]
    async fn test_timeout_is_treated_as_cancelled() {
        struct StallingClient;

        #[async_trait]
        impl ElicitationClient for StallingClient {
            fn supported(&self) -> bool {
                true
            }
            async fn elicit(&self, _: &ElicitRequest) -> Result<ElicitOutcome, FathomError> {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                Ok(ElicitOutcome {
                    action: ElicitAction::Accept,
                    content: Some(Map::new()),
                })
            }
        }

        let coordinator = ElicitationCoordinator::new(Arc::new(StallingClient), 20);
        let mut params = Map::new();
        let result = coordinator.fill_missing(&mut params, &name_request()).await;
        match result {
            Err(FathomError::Declined(msg)) => assert!(msg.contains("cancelled")),
            other => panic!("Expected declined, got ok={}", other.is_ok()),
        }
    }

    #[tokio::test]
    async fn test_type_violation_is_a_hard_failure() {
        let client = Arc::new(ScriptedClient::accepting(content(&[("name", json!(42))])));
        let coordinator = ElicitationCoordinator::new(client, 1_000);
        let mut params = Map::new();
        let result = coordinator.fill_missing(&mut params, &name_request()).await;
        assert!(matches!(result, Err(FathomError::Elicitation(_))));
        assert!(params.is_empty());
    }

    #[tokio::test]
    async fn test_unrequested_field_is_rejected() {
        let client = Arc::new(ScriptedClient::accepting(content(&[
            ("name", json!("ok")),
            ("sneaky", json!("extra")),
        ])));
        let coordinator = ElicitationCoordinator::new(client, 1_000);
        let mut params = Map::new();
        let result = coordinator.fill_missing(&mut params, &name_request()).await;
        assert!(matches!(result, Err(FathomError::Elicitation(_))));
    }

    #[tokio::test]
    async fn test_enum_membership_enforced() {
        let request = ElicitRequest::new("Pick an approach").field(
            "approach",
            PrimitiveSchema::string_enum("Index approach", &["keyword", "vector"]),
            true,
        );
        let client = Arc::new(ScriptedClient::accepting(content(&[(
            "approach",
            json!("psychic"),
        )])));
        let coordinator = ElicitationCoordinator::new(client, 1_000);
        let mut params = Map::new();
        let result = coordinator.fill_missing(&mut params, &request).await;
        assert!(matches!(result, Err(FathomError::Elicitation(_))));
    }

    #[tokio::test]
    async fn test_integer_bounds_enforced() {
        let request = ElicitRequest::new("Vector size").field(
            "dimensions",
            PrimitiveSchema::integer("Dimensions", Some(1), Some(4096)),
            true,
        );
        let client = Arc::new(ScriptedClient::accepting(content(&[(
            "dimensions",
            json!(100_000),
        )])));
        let coordinator = ElicitationCoordinator::new(client, 1_000);
        let mut params = Map::new();
        assert!(coordinator
            .fill_missing(&mut params, &request)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_string_length_bounds_enforced() {
        let request = ElicitRequest::new("Name it").field(
            "name",
            PrimitiveSchema::String {
                description: None,
                min_length: Some(2),
                max_length: Some(10),
            },
            true,
        );
        let client = Arc::new(ScriptedClient::accepting(content(&[("name", json!("x"))])));
        let coordinator = ElicitationCoordinator::new(client, 1_000);
        let mut params = Map::new();
        assert!(coordinator
            .fill_missing(&mut params, &request)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_sequence_seeds_later_steps_from_earlier_answers() {
        struct SequenceClient {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl ElicitationClient for SequenceClient {
            fn supported(&self) -> bool {
                true
            }
            async fn elicit(&self, request: &ElicitRequest) -> Result<ElicitOutcome, FathomError> {
                let i = self.calls.fetch_add(1, Ordering::SeqCst);
                let content = match i {
                    0 => content(&[("approach", json!("vector"))]),
                    _ => {
                        // The second step only exists because step one
                        // answered "vector".
                        assert!(request.message.contains("vector"));
                        content(&[("dimensions", json!(768))])
                    }
                };
                Ok(ElicitOutcome {
                    action: ElicitAction::Accept,
                    content: Some(content),
                })
            }
        }

        let client = Arc::new(SequenceClient {
            calls: AtomicUsize::new(0),
        });
        let coordinator = ElicitationCoordinator::new(client.clone(), 1_000);
        let mut params = Map::new();

        let steps: Vec<ElicitStep> = vec![
            Box::new(|params| {
                is_empty(params.get("approach")).then(|| {
                    ElicitRequest::new("Pick an approach").field(
                        "approach",
                        PrimitiveSchema::string_enum("Approach", &["keyword", "vector"]),
                        true,
                    )
                })
            }),
            Box::new(|params| {
                (params.get("approach") == Some(&json!("vector"))
                    && is_empty(params.get("dimensions")))
                .then(|| {
                    ElicitRequest::new("This is a vector index; how many dimensions?").field(
                        "dimensions",
                        PrimitiveSchema::integer("Dimensions", Some(1), Some(4096)),
                        true,
                    )
                })
            }),
        ];

        let state = coordinator
            .run_sequence(&mut params, &steps)
            .await
            .expect("Sequence should complete");
        assert_eq!(state, ElicitState::Accepted);
        assert_eq!(params.get("approach"), Some(&json!("vector")));
        assert_eq!(params.get("dimensions"), Some(&json!(768)));
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_sequence_aborts_on_decline() {
        let client = Arc::new(ScriptedClient::with(ElicitAction::Decline));
        let coordinator = ElicitationCoordinator::new(client.clone(), 1_000);
        let mut params = Map::new();

        let steps: Vec<ElicitStep> = vec![
            Box::new(|_| Some(ElicitRequest::new("step one").field(
                "a",
                PrimitiveSchema::string("a"),
                true,
            ))),
            Box::new(|_| Some(ElicitRequest::new("step two").field(
                "b",
                PrimitiveSchema::string("b"),
                true,
            ))),
        ];

        let result = coordinator.run_sequence(&mut params, &steps).await;
        assert!(matches!(result, Err(FathomError::Declined(_))));
        // Step two never ran.
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_requested_schema_wire_shape() {
        let request = ElicitRequest::new("Fill in the details")
            .field("name", PrimitiveSchema::string("Index name"), true)
            .field(
                "replicas",
                PrimitiveSchema::integer("Replica count", Some(1), Some(12)),
                false,
            );
        let schema = request.requested_schema();
        assert_eq!(schema["type"], json!("object"));
        assert_eq!(schema["properties"]["name"]["type"], json!("string"));
        assert_eq!(schema["properties"]["replicas"]["minimum"], json!(1));
        assert_eq!(schema["required"], json!(["name"]));
    }
}

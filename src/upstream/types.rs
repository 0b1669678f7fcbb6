//! Domain types exchanged with the upstream search service.
//!
//! Deliberately minimal: only what the exposed tools need. Documents are an
//! open schema (arbitrary JSON objects) because the upstream is genuinely
//! schema-free there; everything else is typed.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field data kinds supported by the upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Int,
    Double,
    Bool,
    /// Vector field; `dimensions` must match the embedding model output.
    Vector { dimensions: usize },
}

/// One field in an index schema.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    /// Exactly one field per index must be the key.
    #[serde(default)]
    pub key: bool,
    #[serde(default)]
    pub searchable: bool,
    #[serde(default)]
    pub filterable: bool,
}

/// An index schema as the upstream reports it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexDefinition {
    pub name: String,
    pub fields: Vec<FieldDefinition>,
}

/// Per-index document and storage counters.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexStats {
    pub document_count: u64,
    pub storage_bytes: u64,
}

/// A search request against one index.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    /// Upstream filter expression, passed through verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Upper bound on hits fetched from the upstream per call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<usize>,
}

/// One scored hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub score: f64,
    pub document: Map<String, Value>,
}

/// A full result snapshot for one search call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total_count: usize,
}

/// Per-document outcome of a batch upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    pub succeeded: usize,
    pub failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Indexer run state as reported by the upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Succeeded,
    Failed,
}

/// Status snapshot of an indexer run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerRun {
    pub status: RunStatus,
    pub items_processed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl IndexDefinition {
    /// Structural sanity check applied before sending to the upstream.
    pub fn validate(&self) -> Result<(), crate::FathomError> {
        if self.name.is_empty() {
            return Err(crate::FathomError::Validation(
                "index name must not be empty".into(),
            ));
        }
        if self.fields.is_empty() {
            return Err(crate::FathomError::Validation(
                "an index needs at least one field".into(),
            ));
        }
        let keys = self.fields.iter().filter(|f| f.key).count();
        if keys != 1 {
            return Err(crate::FathomError::Validation(format!(
                "an index needs exactly one key field, found {}",
                keys
            )));
        }
        Ok(())
    }
}

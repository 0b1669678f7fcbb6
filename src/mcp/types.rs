//! Tool input and response types.
//!
//! Fields that elicitation can fill are `Option` even when logically
//! required — structural validation and the elicitation steps in
//! `server.rs` decide what is actually mandatory.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::upstream::types::FieldDefinition;

/// Search documents in one index.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SearchInput {
    /// Index to search. Elicited when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<String>,
    /// Query text. Elicited when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    /// Upstream filter expression, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Results per page (clamped to the configured maximum).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    /// Continuation token from a previous page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// List index schemas, paginated.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListIndexesInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetIndexInput {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexStatsInput {
    pub name: String,
}

/// Create an index, either from an explicit field list or from an elicited
/// approach ("keyword" or "vector").
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreateIndexInput {
    /// Index name. Elicited when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Explicit schema; when present, `approach` is ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDefinition>>,
    /// "keyword" or "vector"; elicited when neither this nor `fields` is given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approach: Option<String>,
    /// Vector dimensions; elicited for the vector approach.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct DeleteIndexInput {
    pub name: String,
    /// Deletion proceeds only with an explicit true; elicited when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct UploadDocumentsInput {
    pub index: String,
    /// Arbitrary JSON documents — the upstream is schema-free here.
    pub documents: Vec<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RunIndexerInput {
    pub name: String,
    /// Poll until the run finishes (bounded), reporting progress.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct IndexerStatusInput {
    pub name: String,
}

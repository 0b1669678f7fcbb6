//! Shared test doubles: a scripted upstream and a scripted elicitation client.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use fathom::pipeline::{
    ElicitAction, ElicitOutcome, ElicitRequest, ElicitationClient, ElicitationCoordinator,
};
use fathom::upstream::types::{
    BatchResult, FieldDefinition, FieldKind, IndexDefinition, IndexStats, IndexerRun, RunStatus,
    SearchHit, SearchQuery, SearchResults,
};
use fathom::upstream::SearchApi;
use fathom::FathomError;

/// Upstream double: serves a fixed set of indexes and hits, or a scripted
/// failure. Records every call for assertions.
pub struct MockSearchApi {
    pub indexes: Vec<IndexDefinition>,
    pub hits: Vec<SearchHit>,
    /// When set, every call fails with this upstream error.
    pub failure: Option<(Option<u16>, String, Option<String>)>,
    /// Indexer status sequence, one per status call (last repeats).
    pub runs: Mutex<Vec<IndexerRun>>,
    pub calls: AtomicUsize,
}

impl MockSearchApi {
    pub fn new() -> Self {
        Self {
            indexes: vec![sample_index("products"), sample_index("reviews")],
            hits: sample_hits(5),
            failure: None,
            runs: Mutex::new(vec![]),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(status: Option<u16>, message: &str, retry_after: Option<&str>) -> Self {
        Self {
            failure: Some((status, message.to_string(), retry_after.map(String::from))),
            ..Self::new()
        }
    }

    pub fn with_hits(hits: Vec<SearchHit>) -> Self {
        Self {
            hits,
            ..Self::new()
        }
    }

    fn fail_if_scripted(&self) -> Result<(), FathomError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((status, message, retry_after)) = &self.failure {
            return Err(FathomError::Upstream {
                status: *status,
                message: message.clone(),
                retry_after: retry_after.clone(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl SearchApi for MockSearchApi {
    async fn list_indexes(&self) -> Result<Vec<IndexDefinition>, FathomError> {
        self.fail_if_scripted()?;
        Ok(self.indexes.clone())
    }

    async fn get_index(&self, name: &str) -> Result<IndexDefinition, FathomError> {
        self.fail_if_scripted()?;
        self.indexes
            .iter()
            .find(|i| i.name == name)
            .cloned()
            .ok_or_else(|| FathomError::Upstream {
                status: Some(404),
                message: format!("index '{}' does not exist", name),
                retry_after: None,
            })
    }

    async fn create_index(&self, definition: &IndexDefinition) -> Result<(), FathomError> {
        self.fail_if_scripted()?;
        definition.validate()
    }

    async fn delete_index(&self, _name: &str) -> Result<(), FathomError> {
        self.fail_if_scripted()
    }

    async fn index_stats(&self, _name: &str) -> Result<IndexStats, FathomError> {
        self.fail_if_scripted()?;
        Ok(IndexStats {
            document_count: 1234,
            storage_bytes: 567_890,
        })
    }

    async fn search(
        &self,
        _index: &str,
        _query: &SearchQuery,
    ) -> Result<SearchResults, FathomError> {
        self.fail_if_scripted()?;
        Ok(SearchResults {
            hits: self.hits.clone(),
            total_count: self.hits.len(),
        })
    }

    async fn upload_documents(
        &self,
        _index: &str,
        documents: &[Map<String, Value>],
    ) -> Result<BatchResult, FathomError> {
        self.fail_if_scripted()?;
        Ok(BatchResult {
            succeeded: documents.len(),
            failed: 0,
            errors: vec![],
        })
    }

    async fn run_indexer(&self, _name: &str) -> Result<(), FathomError> {
        self.fail_if_scripted()
    }

    async fn indexer_status(&self, _name: &str) -> Result<IndexerRun, FathomError> {
        self.fail_if_scripted()?;
        let mut runs = self.runs.lock().unwrap();
        Ok(if runs.len() > 1 {
            runs.remove(0)
        } else {
            runs.first().cloned().unwrap_or(IndexerRun {
                status: RunStatus::Succeeded,
                items_processed: 10,
                error: None,
                started_at: None,
            })
        })
    }
}

/// Elicitation double: scripted answers in order, call count recorded.
pub struct ScriptedElicitation {
    pub supported: bool,
    pub outcomes: Mutex<Vec<ElicitOutcome>>,
    pub calls: AtomicUsize,
}

impl ScriptedElicitation {
    pub fn unsupported() -> Self {
        Self {
            supported: false,
            outcomes: Mutex::new(vec![]),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn accepting(content: Map<String, Value>) -> Self {
        Self {
            supported: true,
            outcomes: Mutex::new(vec![ElicitOutcome {
                action: ElicitAction::Accept,
                content: Some(content),
            }]),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn answering(outcomes: Vec<ElicitOutcome>) -> Self {
        Self {
            supported: true,
            outcomes: Mutex::new(outcomes),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn declining() -> Self {
        Self {
            supported: true,
            outcomes: Mutex::new(vec![ElicitOutcome {
                action: ElicitAction::Decline,
                content: None,
            }]),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ElicitationClient for ScriptedElicitation {
    fn supported(&self) -> bool {
        self.supported
    }

    async fn elicit(&self, _request: &ElicitRequest) -> Result<ElicitOutcome, FathomError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.len() > 1 {
            Ok(outcomes.remove(0))
        } else {
            outcomes
                .first()
                .cloned()
                .ok_or_else(|| FathomError::Elicitation("no scripted outcome".into()))
        }
    }
}

pub fn coordinator(client: std::sync::Arc<dyn ElicitationClient>) -> ElicitationCoordinator {
    ElicitationCoordinator::new(client, 1_000)
}

pub fn sample_index(name: &str) -> IndexDefinition {
    IndexDefinition {
        name: name.to_string(),
        fields: vec![
            FieldDefinition {
                name: "id".into(),
                kind: FieldKind::String,
                key: true,
                searchable: false,
                filterable: true,
            },
            FieldDefinition {
                name: "content".into(),
                kind: FieldKind::String,
                key: false,
                searchable: true,
                filterable: false,
            },
        ],
    }
}

pub fn sample_hits(count: usize) -> Vec<SearchHit> {
    (0..count)
        .map(|i| {
            let mut document = Map::new();
            document.insert("id".into(), json!(format!("doc-{}", i)));
            document.insert("content".into(), json!(format!("document number {}", i)));
            SearchHit {
                score: 1.0 - i as f64 * 0.1,
                document,
            }
        })
        .collect()
}

pub fn content(pairs: &[(&str, Value)]) -> Map<String, Value> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

//! The upstream collaborator interface.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::upstream::types::{
    BatchResult, IndexDefinition, IndexStats, IndexerRun, SearchQuery, SearchResults,
};
use crate::FathomError;

/// Everything the tools need from the upstream search service.
///
/// Injected as an explicit `Arc<dyn SearchApi>` dependency at construction
/// time — tools never reach for a global client. Implementations: the real
/// HTTP client in [`crate::upstream::http`], scripted mocks in tests.
#[async_trait]
pub trait SearchApi: Send + Sync {
    async fn list_indexes(&self) -> Result<Vec<IndexDefinition>, FathomError>;

    async fn get_index(&self, name: &str) -> Result<IndexDefinition, FathomError>;

    async fn create_index(&self, definition: &IndexDefinition) -> Result<(), FathomError>;

    async fn delete_index(&self, name: &str) -> Result<(), FathomError>;

    async fn index_stats(&self, name: &str) -> Result<IndexStats, FathomError>;

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResults, FathomError>;

    async fn upload_documents(
        &self,
        index: &str,
        documents: &[Map<String, Value>],
    ) -> Result<BatchResult, FathomError>;

    /// Trigger an indexer run; status is observed separately via
    /// [`SearchApi::indexer_status`].
    async fn run_indexer(&self, name: &str) -> Result<(), FathomError>;

    async fn indexer_status(&self, name: &str) -> Result<IndexerRun, FathomError>;
}

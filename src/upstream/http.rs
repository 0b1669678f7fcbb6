//! HTTP client for the upstream search service.
//!
//! Thin and mechanical: build the request, check the status, decode the
//! body. Failures become `FathomError::Upstream` with the status and the
//! `Retry-After` header preserved for the classifier — no classification
//! happens here.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;

use crate::config::UpstreamConfig;
use crate::upstream::api::SearchApi;
use crate::upstream::types::{
    BatchResult, IndexDefinition, IndexStats, IndexerRun, SearchQuery, SearchResults,
};
use crate::FathomError;

/// Cap on upstream error bodies carried into error messages.
const MAX_ERROR_BODY: usize = 600;

pub struct HttpSearchApi {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_version: String,
}

#[derive(Deserialize)]
struct ListIndexesBody {
    indexes: Vec<IndexDefinition>,
}

impl HttpSearchApi {
    pub fn new(config: &UpstreamConfig) -> Result<Self, FathomError> {
        // No request timeout here: the deadline guard owns time limits.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FathomError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_version: config.api_version.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.endpoint, path, self.api_version
        )
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("api-key", &self.api_key)
    }

    /// Turn a non-2xx response into a classified-ready upstream error.
    async fn check(response: reqwest::Response) -> Result<reqwest::Response, FathomError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let mut body = response.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
            body.push('…');
        }
        Err(FathomError::Upstream {
            status: Some(status.as_u16()),
            message: body,
            retry_after,
        })
    }
}

#[async_trait]
impl SearchApi for HttpSearchApi {
    async fn list_indexes(&self) -> Result<Vec<IndexDefinition>, FathomError> {
        let response = self.request(reqwest::Method::GET, "indexes").send().await?;
        let body: ListIndexesBody = Self::check(response).await?.json().await?;
        Ok(body.indexes)
    }

    async fn get_index(&self, name: &str) -> Result<IndexDefinition, FathomError> {
        let response = self
            .request(reqwest::Method::GET, &format!("indexes/{}", name))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn create_index(&self, definition: &IndexDefinition) -> Result<(), FathomError> {
        let response = self
            .request(reqwest::Method::POST, "indexes")
            .json(definition)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete_index(&self, name: &str) -> Result<(), FathomError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("indexes/{}", name))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn index_stats(&self, name: &str) -> Result<IndexStats, FathomError> {
        let response = self
            .request(reqwest::Method::GET, &format!("indexes/{}/stats", name))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn search(&self, index: &str, query: &SearchQuery) -> Result<SearchResults, FathomError> {
        let response = self
            .request(reqwest::Method::POST, &format!("indexes/{}/search", index))
            .json(query)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn upload_documents(
        &self,
        index: &str,
        documents: &[Map<String, Value>],
    ) -> Result<BatchResult, FathomError> {
        let response = self
            .request(reqwest::Method::POST, &format!("indexes/{}/docs", index))
            .json(&json!({ "documents": documents }))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn run_indexer(&self, name: &str) -> Result<(), FathomError> {
        let response = self
            .request(reqwest::Method::POST, &format!("indexers/{}/run", name))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn indexer_status(&self, name: &str) -> Result<IndexerRun, FathomError> {
        let response = self
            .request(reqwest::Method::GET, &format!("indexers/{}/status", name))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }
}

//! Shared initialization logic for MCP and CLI modes.

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use crate::config::FathomConfig;
use crate::pipeline::{OutlineSummarizer, Summarizer};
use crate::upstream::{HttpSearchApi, SearchApi};

/// Application context holding configuration and the upstream client.
///
/// Shared between the MCP server and CLI commands. Built once at startup;
/// read-only afterwards.
pub struct AppContext {
    pub config: FathomConfig,
    pub api: Arc<dyn SearchApi>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
}

impl AppContext {
    /// Initialize from configuration (file + env overrides).
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config = FathomConfig::load(config_path)?;
        tracing::info!("Upstream endpoint: {}", config.upstream.endpoint);

        let api: Arc<dyn SearchApi> = Arc::new(HttpSearchApi::new(&config.upstream)?);
        let summarizer: Option<Arc<dyn Summarizer>> = Some(Arc::new(OutlineSummarizer));

        Ok(Self {
            config,
            api,
            summarizer,
        })
    }

    /// Build a context around an existing `SearchApi` (tests, embedding).
    pub fn with_api(config: FathomConfig, api: Arc<dyn SearchApi>) -> Self {
        Self {
            config,
            api,
            summarizer: Some(Arc::new(OutlineSummarizer)),
        }
    }
}

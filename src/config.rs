//! Configuration loading for MCP and CLI modes.
//!
//! Resolution order: explicit `--config` path > `FATHOM_CONFIG` env >
//! `./fathom.toml` > `~/.fathom/config.toml`. `FATHOM_ENDPOINT` and
//! `FATHOM_API_KEY` override the file values so credentials can stay out
//! of checked-in config.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::FathomError;

/// Default per-tool response budget, in characters (~2000 tokens).
pub const DEFAULT_RESPONSE_BUDGET: usize = 8_000;

/// Default overall deadline for a tool call, in milliseconds.
pub const DEFAULT_TOOL_TIMEOUT_MS: u64 = 30_000;

/// Default deadline for a summarizer call. Kept well under the tool
/// deadline so a slow summarizer degrades to truncation instead of
/// timing out the whole call.
pub const DEFAULT_SUMMARIZER_TIMEOUT_MS: u64 = 5_000;

/// Default deadline for one elicitation round trip.
pub const DEFAULT_ELICIT_TIMEOUT_MS: u64 = 120_000;

/// Connection settings for the upstream search service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Base URL of the search service, e.g. `https://search.example.net`.
    pub endpoint: String,
    /// API key sent in the `api-key` header.
    pub api_key: String,
    /// API version appended as a query parameter.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

fn default_api_version() -> String {
    "2024-07-01".to_string()
}

/// Tunables for the tool invocation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Response payload budget in characters.
    #[serde(default = "default_response_budget")]
    pub response_budget: usize,
    /// Overall deadline per tool call, milliseconds.
    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
    /// Deadline for the summarizer call, milliseconds.
    #[serde(default = "default_summarizer_timeout_ms")]
    pub summarizer_timeout_ms: u64,
    /// Deadline for one elicitation round trip, milliseconds.
    #[serde(default = "default_elicit_timeout_ms")]
    pub elicit_timeout_ms: u64,
    /// Interval between status polls for long-running operations, milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Maximum number of status polls before giving up.
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: usize,
    /// Default page size when the caller does not specify one.
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
    /// Hard cap on page size.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,
    /// Hard cap on documents per upload batch.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
}

fn default_response_budget() -> usize {
    DEFAULT_RESPONSE_BUDGET
}
fn default_tool_timeout_ms() -> u64 {
    DEFAULT_TOOL_TIMEOUT_MS
}
fn default_summarizer_timeout_ms() -> u64 {
    DEFAULT_SUMMARIZER_TIMEOUT_MS
}
fn default_elicit_timeout_ms() -> u64 {
    DEFAULT_ELICIT_TIMEOUT_MS
}
fn default_poll_interval_ms() -> u64 {
    2_000
}
fn default_poll_max_attempts() -> usize {
    12
}
fn default_page_size() -> usize {
    20
}
fn default_max_page_size() -> usize {
    200
}
fn default_max_batch_size() -> usize {
    500
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            response_budget: default_response_budget(),
            tool_timeout_ms: default_tool_timeout_ms(),
            summarizer_timeout_ms: default_summarizer_timeout_ms(),
            elicit_timeout_ms: default_elicit_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_max_attempts: default_poll_max_attempts(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FathomConfig {
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl FathomConfig {
    /// Load configuration, resolving the file path and applying env overrides.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, FathomError> {
        let path = resolve_config_path(explicit_path);

        let mut config = match path {
            Some(ref p) => {
                let raw = std::fs::read_to_string(p).map_err(|e| {
                    FathomError::Config(format!("Failed to read {}: {}", p.display(), e))
                })?;
                toml::from_str::<FathomConfig>(&raw).map_err(|e| {
                    FathomError::Config(format!("Failed to parse {}: {}", p.display(), e))
                })?
            }
            None => {
                // No file anywhere: endpoint and key must come from env.
                FathomConfig {
                    upstream: UpstreamConfig {
                        endpoint: String::new(),
                        api_key: String::new(),
                        api_version: default_api_version(),
                    },
                    pipeline: PipelineConfig::default(),
                }
            }
        };

        if let Ok(endpoint) = std::env::var("FATHOM_ENDPOINT") {
            config.upstream.endpoint = endpoint;
        }
        if let Ok(key) = std::env::var("FATHOM_API_KEY") {
            config.upstream.api_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), FathomError> {
        if self.upstream.endpoint.is_empty() {
            return Err(FathomError::Config(
                "No upstream endpoint configured (set upstream.endpoint in fathom.toml or FATHOM_ENDPOINT)".into(),
            ));
        }
        if self.pipeline.default_page_size == 0
            || self.pipeline.default_page_size > self.pipeline.max_page_size
        {
            return Err(FathomError::Config(format!(
                "default_page_size must be in 1..={}",
                self.pipeline.max_page_size
            )));
        }
        if self.pipeline.summarizer_timeout_ms >= self.pipeline.tool_timeout_ms {
            return Err(FathomError::Config(
                "summarizer_timeout_ms must be shorter than tool_timeout_ms".into(),
            ));
        }
        let poll_budget_ms =
            self.pipeline.poll_interval_ms * self.pipeline.poll_max_attempts as u64;
        if poll_budget_ms >= self.pipeline.tool_timeout_ms {
            // Otherwise the outer deadline always fires before the attempt
            // cap and poll exhaustion can never be reported.
            return Err(FathomError::Config(format!(
                "poll budget ({}ms x {} attempts) must fit within tool_timeout_ms ({}ms)",
                self.pipeline.poll_interval_ms,
                self.pipeline.poll_max_attempts,
                self.pipeline.tool_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Config file path priority: explicit > FATHOM_CONFIG env > ./fathom.toml > ~/.fathom/config.toml
fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    if let Ok(p) = std::env::var("FATHOM_CONFIG") {
        return Some(PathBuf::from(p));
    }
    let local = Path::new("fathom.toml");
    if local.exists() {
        return Some(local.to_path_buf());
    }
    let home = dirs::home_dir().map(|h| h.join(".fathom").join("config.toml"))?;
    if home.exists() {
        return Some(home);
    }
    None
}

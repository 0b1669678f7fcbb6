use std::sync::Arc;

use rmcp::{
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::*,
    tool, tool_handler, tool_router, ErrorData as McpError, Peer, RoleServer, ServerHandler,
    ServiceExt,
};
use serde_json::{json, Map, Value};
use tracing::instrument;

use crate::config::FathomConfig;
use crate::init::AppContext;
use crate::mcp::elicit::McpElicitationClient;
use crate::mcp::progress::make_mcp_progress;
use crate::mcp::types::{
    CreateIndexInput, DeleteIndexInput, GetIndexInput, IndexStatsInput, IndexerStatusInput,
    ListIndexesInput, RunIndexerInput, SearchInput, UploadDocumentsInput,
};
use crate::pipeline::{
    missing, paginate, poll_until, ElicitRequest, ElicitStep, ElicitationCoordinator, Envelope,
    PollConfig, PollStatus, PrimitiveSchema, ToolCallContext, ToolExecutor,
};
use crate::upstream::types::{
    FieldDefinition, FieldKind, IndexDefinition, RunStatus, SearchQuery,
};
use crate::upstream::SearchApi;
use crate::FathomError;

/// Upper bound on hits fetched from the upstream as one pagination snapshot.
const MAX_SNAPSHOT: usize = 1_000;

/// MCP server bridging tool calls to the upstream search service.
///
/// Holds only the injected upstream client and initialization-time
/// configuration; every invocation is an independent task with its own
/// ephemeral context.
#[derive(Clone)]
pub struct FathomServer {
    api: Arc<dyn SearchApi>,
    config: FathomConfig,
    executor: Arc<ToolExecutor>,
    tool_router: ToolRouter<Self>,
}

fn to_call_result(envelope: Envelope) -> CallToolResult {
    let content = vec![Content::text(envelope.text)];
    let mut result = if envelope.is_error {
        CallToolResult::error(content)
    } else {
        CallToolResult::success(content)
    };
    result.structured_content = envelope.structured;
    result
}

fn require_str(params: &Map<String, Value>, key: &str) -> Result<String, FathomError> {
    match params.get(key).and_then(Value::as_str) {
        Some(s) if !s.is_empty() => Ok(s.to_string()),
        _ => Err(FathomError::Validation(format!(
            "missing required field '{}'",
            key
        ))),
    }
}

fn search_steps() -> Vec<ElicitStep> {
    vec![Box::new(|params: &Map<String, Value>| {
        let mut request = ElicitRequest::new("Search needs an index and a query");
        let mut any = false;
        if missing(params, "index") {
            request = request.field(
                "index",
                PrimitiveSchema::string("Name of the index to search"),
                true,
            );
            any = true;
        }
        if missing(params, "query") {
            request = request.field(
                "query",
                PrimitiveSchema::string("Free-text search query"),
                true,
            );
            any = true;
        }
        any.then_some(request)
    })]
}

/// Two steps: choose an approach, then fill in the details the chosen
/// approach needs. Step two's schema is seeded from step one's answer.
fn create_index_steps() -> Vec<ElicitStep> {
    vec![
        Box::new(|params: &Map<String, Value>| {
            (missing(params, "fields") && missing(params, "approach")).then(|| {
                ElicitRequest::new("What kind of index should this be?").field(
                    "approach",
                    PrimitiveSchema::string_enum(
                        "Index approach: plain keyword search, or vector similarity",
                        &["keyword", "vector"],
                    ),
                    true,
                )
            })
        }),
        Box::new(|params: &Map<String, Value>| {
            let vector = params.get("approach").and_then(Value::as_str) == Some("vector");
            let mut request = ElicitRequest::new(if vector {
                "Details for the new vector index"
            } else {
                "Details for the new index"
            });
            let mut any = false;
            if missing(params, "name") {
                request = request.field(
                    "name",
                    PrimitiveSchema::String {
                        description: Some("Index name".into()),
                        min_length: Some(1),
                        max_length: Some(128),
                    },
                    true,
                );
                any = true;
            }
            if vector && missing(params, "dimensions") {
                request = request.field(
                    "dimensions",
                    PrimitiveSchema::integer(
                        "Vector dimensions (must match your embedding model)",
                        Some(1),
                        Some(4_096),
                    ),
                    true,
                );
                any = true;
            }
            any.then_some(request)
        }),
    ]
}

fn delete_index_steps() -> Vec<ElicitStep> {
    vec![Box::new(|params: &Map<String, Value>| {
        missing(params, "confirm").then(|| {
            let name = params
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("this index");
            ElicitRequest::new(&format!(
                "Really delete index '{}'? All its documents will be lost.",
                name
            ))
            .field(
                "confirm",
                PrimitiveSchema::boolean("Confirm the deletion"),
                true,
            )
        })
    })]
}

fn validate_create_index(params: &Map<String, Value>) -> Result<(), FathomError> {
    require_str(params, "name")?;
    let has_fields = !missing(params, "fields");
    if has_fields {
        return Ok(());
    }
    match params.get("approach").and_then(Value::as_str) {
        Some("keyword") => Ok(()),
        Some("vector") => match params.get("dimensions").and_then(Value::as_u64) {
            Some(d) if d > 0 => Ok(()),
            _ => Err(FathomError::Validation(
                "a vector index needs 'dimensions'".into(),
            )),
        },
        Some(other) => Err(FathomError::Validation(format!(
            "unknown approach '{}' (expected 'keyword' or 'vector')",
            other
        ))),
        None => Err(FathomError::Validation(
            "provide either 'fields' or an 'approach'".into(),
        )),
    }
}

/// Build the index definition from merged parameters. Explicit fields win;
/// otherwise a starter schema is derived from the approach.
fn build_definition(params: &Map<String, Value>) -> Result<IndexDefinition, FathomError> {
    let name = require_str(params, "name")?;
    if let Some(fields_value) = params.get("fields").filter(|v| !v.is_null()) {
        let fields: Vec<FieldDefinition> = serde_json::from_value(fields_value.clone())?;
        return Ok(IndexDefinition { name, fields });
    }

    let key = FieldDefinition {
        name: "id".into(),
        kind: FieldKind::String,
        key: true,
        searchable: false,
        filterable: true,
    };
    let content = FieldDefinition {
        name: "content".into(),
        kind: FieldKind::String,
        key: false,
        searchable: true,
        filterable: false,
    };
    let mut fields = vec![key, content];
    if params.get("approach").and_then(Value::as_str) == Some("vector") {
        let dimensions = params
            .get("dimensions")
            .and_then(Value::as_u64)
            .ok_or_else(|| FathomError::Validation("a vector index needs 'dimensions'".into()))?
            as usize;
        fields.push(FieldDefinition {
            name: "embedding".into(),
            kind: FieldKind::Vector { dimensions },
            key: false,
            searchable: true,
            filterable: false,
        });
    }
    Ok(IndexDefinition { name, fields })
}

#[tool_router]
impl FathomServer {
    pub fn new(ctx: &AppContext) -> Self {
        let executor = Arc::new(ToolExecutor::new(
            &ctx.config.pipeline,
            ctx.summarizer.clone(),
        ));
        Self {
            api: ctx.api.clone(),
            config: ctx.config.clone(),
            executor,
            tool_router: Self::tool_router(),
        }
    }

    fn coordinator(&self, client: &Peer<RoleServer>) -> ElicitationCoordinator {
        ElicitationCoordinator::new(
            Arc::new(McpElicitationClient::new(client.clone())),
            self.config.pipeline.elicit_timeout_ms,
        )
    }

    fn context(&self, tool_name: &str, raw_params: Value) -> ToolCallContext {
        ToolCallContext::new(tool_name, raw_params, self.config.pipeline.tool_timeout_ms)
    }

    fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.config.pipeline.default_page_size)
            .clamp(1, self.config.pipeline.max_page_size)
    }

    #[tool(
        description = "Full-text search over one index. Returns one page of scored hits; pass the returned cursor to continue. Missing index/query are requested interactively when the client supports it."
    )]
    #[instrument(name = "mcp.search", skip_all)]
    pub async fn search(
        &self,
        request: Parameters<SearchInput>,
        client: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let Parameters(input) = request;
        let raw = serde_json::to_value(&input).unwrap_or_default();
        let mut ctx = self.context("search", raw);
        let api = self.api.clone();
        let page_size = self.page_size(input.page_size);

        let envelope = self
            .executor
            .run(
                &mut ctx,
                &self.coordinator(&client),
                &search_steps(),
                |params| {
                    require_str(params, "index")?;
                    require_str(params, "query")?;
                    Ok(())
                },
                move |params| async move {
                    let index = require_str(&params, "index")?;
                    let text = require_str(&params, "query")?;
                    let filter = params
                        .get("filter")
                        .and_then(Value::as_str)
                        .map(|s| s.to_string());
                    let cursor = params
                        .get("cursor")
                        .and_then(Value::as_str)
                        .map(|s| s.to_string());

                    // Fresh snapshot per call; the cursor is the only state.
                    let results = api
                        .search(
                            &index,
                            &SearchQuery {
                                text,
                                filter,
                                top: Some(MAX_SNAPSHOT),
                            },
                        )
                        .await?;
                    let page = paginate(&results.hits, page_size, cursor.as_deref())?;
                    Ok(json!({
                        "items": page.items,
                        "next_cursor": page.next_cursor,
                        "has_more": page.has_more,
                        "total_count": page.total_count,
                    }))
                },
            )
            .await;
        Ok(to_call_result(envelope))
    }

    #[tool(description = "List index schemas, one page at a time.")]
    #[instrument(name = "mcp.list_indexes", skip_all)]
    pub async fn list_indexes(
        &self,
        request: Parameters<ListIndexesInput>,
        client: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let Parameters(input) = request;
        let raw = serde_json::to_value(&input).unwrap_or_default();
        let mut ctx = self.context("list_indexes", raw);
        let api = self.api.clone();
        let page_size = self.page_size(input.page_size);

        let envelope = self
            .executor
            .run(
                &mut ctx,
                &self.coordinator(&client),
                &[],
                |_| Ok(()),
                move |params| async move {
                    let cursor = params
                        .get("cursor")
                        .and_then(Value::as_str)
                        .map(|s| s.to_string());
                    let indexes = api.list_indexes().await?;
                    let page = paginate(&indexes, page_size, cursor.as_deref())?;
                    Ok(json!({
                        "items": page.items,
                        "next_cursor": page.next_cursor,
                        "has_more": page.has_more,
                        "total_count": page.total_count,
                    }))
                },
            )
            .await;
        Ok(to_call_result(envelope))
    }

    #[tool(description = "Get one index schema by name.")]
    #[instrument(name = "mcp.get_index", skip_all)]
    pub async fn get_index(
        &self,
        request: Parameters<GetIndexInput>,
        client: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let Parameters(input) = request;
        let raw = serde_json::to_value(&input).unwrap_or_default();
        let mut ctx = self.context("get_index", raw);
        let api = self.api.clone();

        let envelope = self
            .executor
            .run(
                &mut ctx,
                &self.coordinator(&client),
                &[],
                |params| require_str(params, "name").map(|_| ()),
                move |params| async move {
                    let name = require_str(&params, "name")?;
                    api.get_index(&name).await
                },
            )
            .await;
        Ok(to_call_result(envelope))
    }

    #[tool(description = "Document and storage counters for one index.")]
    #[instrument(name = "mcp.index_stats", skip_all)]
    pub async fn index_stats(
        &self,
        request: Parameters<IndexStatsInput>,
        client: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let Parameters(input) = request;
        let raw = serde_json::to_value(&input).unwrap_or_default();
        let mut ctx = self.context("index_stats", raw);
        let api = self.api.clone();

        let envelope = self
            .executor
            .run(
                &mut ctx,
                &self.coordinator(&client),
                &[],
                |params| require_str(params, "name").map(|_| ()),
                move |params| async move {
                    let name = require_str(&params, "name")?;
                    api.index_stats(&name).await
                },
            )
            .await;
        Ok(to_call_result(envelope))
    }

    #[tool(
        description = "Create an index from an explicit field list, or from an approach ('keyword' or 'vector'). Missing details are requested interactively: first the approach, then name and vector dimensions."
    )]
    #[instrument(name = "mcp.create_index", skip_all)]
    pub async fn create_index(
        &self,
        request: Parameters<CreateIndexInput>,
        client: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let Parameters(input) = request;
        let raw = serde_json::to_value(&input).unwrap_or_default();
        let mut ctx = self.context("create_index", raw);
        let api = self.api.clone();

        let envelope = self
            .executor
            .run(
                &mut ctx,
                &self.coordinator(&client),
                &create_index_steps(),
                validate_create_index,
                move |params| async move {
                    let definition = build_definition(&params)?;
                    definition.validate()?;
                    api.create_index(&definition).await?;
                    Ok(json!({
                        "created": definition.name,
                        "fields": definition.fields.len(),
                    }))
                },
            )
            .await;
        Ok(to_call_result(envelope))
    }

    #[tool(
        description = "Delete an index and all its documents. Requires explicit confirmation; asks for it when the client supports interactive input."
    )]
    #[instrument(name = "mcp.delete_index", skip_all)]
    pub async fn delete_index(
        &self,
        request: Parameters<DeleteIndexInput>,
        client: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let Parameters(input) = request;
        let raw = serde_json::to_value(&input).unwrap_or_default();
        let mut ctx = self.context("delete_index", raw);
        let api = self.api.clone();

        let envelope = self
            .executor
            .run(
                &mut ctx,
                &self.coordinator(&client),
                &delete_index_steps(),
                |params| {
                    require_str(params, "name")?;
                    match params.get("confirm").and_then(Value::as_bool) {
                        Some(true) => Ok(()),
                        _ => Err(FathomError::Validation(
                            "deletion was not confirmed (set confirm: true)".into(),
                        )),
                    }
                },
                move |params| async move {
                    let name = require_str(&params, "name")?;
                    api.delete_index(&name).await?;
                    Ok(json!({ "deleted": name }))
                },
            )
            .await;
        Ok(to_call_result(envelope))
    }

    #[tool(
        description = "Upload a batch of JSON documents into an index. Batches are bounded; oversized batches are rejected."
    )]
    #[instrument(name = "mcp.upload_documents", skip_all)]
    pub async fn upload_documents(
        &self,
        request: Parameters<UploadDocumentsInput>,
        client: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let Parameters(input) = request;
        let raw = serde_json::to_value(&input).unwrap_or_default();
        let mut ctx = self.context("upload_documents", raw);
        let api = self.api.clone();
        let max_batch = self.config.pipeline.max_batch_size;

        let envelope = self
            .executor
            .run(
                &mut ctx,
                &self.coordinator(&client),
                &[],
                move |params| {
                    require_str(params, "index")?;
                    let count = params
                        .get("documents")
                        .and_then(Value::as_array)
                        .map(|a| a.len())
                        .unwrap_or(0);
                    if count == 0 {
                        return Err(FathomError::Validation(
                            "'documents' must be a non-empty array".into(),
                        ));
                    }
                    if count > max_batch {
                        return Err(FathomError::Validation(format!(
                            "batch of {} exceeds the {}-document limit; split it",
                            count, max_batch
                        )));
                    }
                    Ok(())
                },
                move |params| async move {
                    let index = require_str(&params, "index")?;
                    let documents: Vec<Map<String, Value>> = serde_json::from_value(
                        params.get("documents").cloned().unwrap_or(Value::Null),
                    )?;
                    api.upload_documents(&index, &documents).await
                },
            )
            .await;
        Ok(to_call_result(envelope))
    }

    #[tool(
        description = "Trigger an indexer run. With wait=true, polls the run (bounded) and reports progress until it finishes."
    )]
    #[instrument(name = "mcp.run_indexer", skip_all)]
    pub async fn run_indexer(
        &self,
        request: Parameters<RunIndexerInput>,
        meta: Meta,
        client: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let Parameters(input) = request;
        let raw = serde_json::to_value(&input).unwrap_or_default();
        let mut ctx = self.context("run_indexer", raw);
        let api = self.api.clone();
        let progress = make_mcp_progress(&meta, &client);
        let poll_config = PollConfig {
            interval_ms: self.config.pipeline.poll_interval_ms,
            max_attempts: self.config.pipeline.poll_max_attempts,
        };

        let envelope = self
            .executor
            .run(
                &mut ctx,
                &self.coordinator(&client),
                &[],
                |params| require_str(params, "name").map(|_| ()),
                move |params| async move {
                    let name = require_str(&params, "name")?;
                    api.run_indexer(&name).await?;
                    if !params.get("wait").and_then(Value::as_bool).unwrap_or(false) {
                        return Ok(json!({ "started": name }));
                    }

                    let run = poll_until(
                        || {
                            let api = api.clone();
                            let name = name.clone();
                            async move {
                                let run = api.indexer_status(&name).await?;
                                Ok(match run.status {
                                    RunStatus::Running => PollStatus::Running(Some(format!(
                                        "{} items processed",
                                        run.items_processed
                                    ))),
                                    RunStatus::Succeeded => PollStatus::Done(run),
                                    RunStatus::Failed => {
                                        PollStatus::Failed(FathomError::Upstream {
                                            status: None,
                                            message: run
                                                .error
                                                .unwrap_or_else(|| "indexer run failed".into()),
                                            retry_after: None,
                                        })
                                    }
                                })
                            }
                        },
                        &poll_config,
                        progress.as_ref(),
                        &format!("indexer '{}'", name),
                    )
                    .await?;
                    Ok(serde_json::to_value(run)?)
                },
            )
            .await;
        Ok(to_call_result(envelope))
    }

    #[tool(description = "Latest run status of one indexer.")]
    #[instrument(name = "mcp.indexer_status", skip_all)]
    pub async fn indexer_status(
        &self,
        request: Parameters<IndexerStatusInput>,
        client: Peer<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        let Parameters(input) = request;
        let raw = serde_json::to_value(&input).unwrap_or_default();
        let mut ctx = self.context("indexer_status", raw);
        let api = self.api.clone();

        let envelope = self
            .executor
            .run(
                &mut ctx,
                &self.coordinator(&client),
                &[],
                |params| require_str(params, "name").map(|_| ()),
                move |params| async move {
                    let name = require_str(&params, "name")?;
                    api.indexer_status(&name).await
                },
            )
            .await;
        Ok(to_call_result(envelope))
    }
}

#[tool_handler]
impl ServerHandler for FathomServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "fathom".to_string(),
                title: Some("Fathom Search Bridge".to_string()),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                r#"# Fathom Search Bridge

Tools for querying and managing an upstream search service.

## Reading
- search — full-text search over one index (paginated; follow next_cursor)
- list_indexes — index schemas, paginated
- get_index / index_stats — one index's schema or counters
- indexer_status — latest run status of an indexer

## Writing
- create_index — explicit field list, or approach 'keyword'/'vector'
- upload_documents — batch JSON documents into an index
- delete_index — requires explicit confirmation
- run_indexer — trigger a run; wait=true polls with progress

Errors come back as structured insights: a code (AUTH, NOT_FOUND, RATE_LIMIT, ...),
the upstream message, a recommendation, and a retry delay when the service
reported one. Rate limits are never retried server-side — honor the delay."#
                    .to_string(),
            ),
        }
    }
}

/// Run the MCP server on stdio transport.
pub async fn run_mcp_server(ctx: AppContext) -> anyhow::Result<()> {
    let server = FathomServer::new(&ctx);
    tracing::info!("Starting Fathom MCP server v{}", env!("CARGO_PKG_VERSION"));

    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let service = server.serve(transport).await?;
    tracing::info!("MCP server listening on stdio (9 tools)");

    tokio::spawn(async {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
    });

    service.waiting().await?;
    tracing::info!("MCP server shutting down");
    Ok(())
}

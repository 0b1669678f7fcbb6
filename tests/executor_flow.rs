//! End-to-end pipeline runs against a scripted upstream: the same
//! executor-plus-operation wiring the MCP tools use, minus the transport.

mod common;

use std::sync::Arc;

use serde_json::{json, Map, Value};

use fathom::config::PipelineConfig;
use fathom::pipeline::{
    paginate, ElicitationCoordinator, InsightCode, ToolCallContext, ToolExecutor,
};
use fathom::upstream::types::SearchQuery;
use fathom::upstream::SearchApi;
use fathom::FathomError;

use common::{MockSearchApi, ScriptedElicitation};

fn executor() -> ToolExecutor {
    ToolExecutor::new(&PipelineConfig::default(), None)
}

fn coordinator() -> ElicitationCoordinator {
    common::coordinator(Arc::new(ScriptedElicitation::unsupported()))
}

fn require_index_and_query(params: &Map<String, Value>) -> Result<(), FathomError> {
    for key in ["index", "query"] {
        match params.get(key).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => {}
            _ => {
                return Err(FathomError::Validation(format!(
                    "missing required field '{}'",
                    key
                )))
            }
        }
    }
    Ok(())
}

/// The search operation as the server wires it: fetch a snapshot, slice the
/// requested page.
async fn search_page(
    api: Arc<dyn SearchApi>,
    params: Map<String, Value>,
) -> Result<Value, FathomError> {
    let index = params["index"].as_str().unwrap_or_default().to_string();
    let query = SearchQuery {
        text: params["query"].as_str().unwrap_or_default().to_string(),
        filter: None,
        top: None,
    };
    let results = api.search(&index, &query).await?;
    let cursor = params.get("cursor").and_then(Value::as_str);
    let page = paginate(&results.hits, 2, cursor)?;
    serde_json::to_value(&page).map_err(Into::into)
}

#[tokio::test]
async fn search_success_returns_shaped_page() {
    let api: Arc<dyn SearchApi> = Arc::new(MockSearchApi::new());
    let mut ctx = ToolCallContext::new(
        "search",
        json!({"index": "products", "query": "widgets"}),
        30_000,
    );

    let envelope = executor()
        .run(
            &mut ctx,
            &coordinator(),
            &[],
            require_index_and_query,
            |params| search_page(api.clone(), params),
        )
        .await;

    assert!(!envelope.is_error);
    let structured = envelope.structured.expect("Structured page");
    assert_eq!(structured["items"].as_array().unwrap().len(), 2);
    assert_eq!(structured["total_count"], json!(5));
    assert_eq!(structured["has_more"], json!(true));
    assert!(structured["next_cursor"].is_string());
}

#[tokio::test]
async fn cursor_walk_through_the_executor_covers_the_snapshot() {
    let api: Arc<dyn SearchApi> = Arc::new(MockSearchApi::new());
    let mut cursor: Option<String> = None;
    let mut ids = Vec::new();

    loop {
        let mut args = Map::new();
        args.insert("index".into(), json!("products"));
        args.insert("query".into(), json!("widgets"));
        if let Some(c) = &cursor {
            args.insert("cursor".into(), json!(c));
        }
        let mut ctx = ToolCallContext::new("search", Value::Object(args), 30_000);
        let api = api.clone();
        let envelope = executor()
            .run(
                &mut ctx,
                &coordinator(),
                &[],
                require_index_and_query,
                |params| search_page(api, params),
            )
            .await;

        assert!(!envelope.is_error);
        let page = envelope.structured.unwrap();
        for item in page["items"].as_array().unwrap() {
            ids.push(item["document"]["id"].clone());
        }
        match page["next_cursor"].as_str() {
            Some(next) => cursor = Some(next.to_string()),
            None => break,
        }
    }

    let expected: Vec<Value> = (0..5).map(|i| json!(format!("doc-{}", i))).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn upstream_404_surfaces_as_not_found_insight() {
    let api: Arc<dyn SearchApi> = Arc::new(MockSearchApi::failing(
        Some(404),
        "index 'nope' does not exist",
        None,
    ));
    let mut ctx = ToolCallContext::new("search", json!({"index": "nope", "query": "q"}), 30_000);

    let envelope = executor()
        .run(
            &mut ctx,
            &coordinator(),
            &[],
            require_index_and_query,
            |params| search_page(api.clone(), params),
        )
        .await;

    assert!(envelope.is_error);
    let insight = envelope.insight.expect("Classified failure");
    assert_eq!(insight.code, InsightCode::NotFound);
    assert!(!insight.is_retryable());
    assert!(envelope.text.contains("NOT_FOUND"));
    assert!(envelope.text.contains("list_indexes"));
}

#[tokio::test]
async fn rate_limit_carries_the_retry_delay() {
    let api: Arc<dyn SearchApi> = Arc::new(MockSearchApi::failing(
        Some(429),
        "too many requests",
        Some("30"),
    ));
    let mut ctx = ToolCallContext::new("search", json!({"index": "i", "query": "q"}), 30_000);

    let envelope = executor()
        .run(
            &mut ctx,
            &coordinator(),
            &[],
            require_index_and_query,
            |params| search_page(api.clone(), params),
        )
        .await;

    let insight = envelope.insight.expect("Classified failure");
    assert_eq!(insight.code, InsightCode::RateLimit);
    assert_eq!(insight.retry_after_secs, Some(30));
    assert!(insight.is_retryable());
}

#[tokio::test]
async fn slow_upstream_times_out_in_band() {
    let config = PipelineConfig {
        tool_timeout_ms: 50,
        summarizer_timeout_ms: 10,
        ..PipelineConfig::default()
    };
    let executor = ToolExecutor::new(&config, None);
    let mut ctx = ToolCallContext::new("search", json!({"index": "i", "query": "q"}), 50);

    let envelope = executor
        .run(
            &mut ctx,
            &coordinator(),
            &[],
            require_index_and_query,
            |_params| async {
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
                Ok(json!("unreachable"))
            },
        )
        .await;

    assert!(envelope.is_error);
    let insight = envelope.insight.expect("Classified failure");
    assert_eq!(insight.extras.get("timed_out"), Some(&json!(true)));
    assert!(insight.is_retryable());
}

#[tokio::test]
async fn bad_cursor_in_a_call_is_an_in_band_cursor_failure() {
    let api: Arc<dyn SearchApi> = Arc::new(MockSearchApi::new());
    let mut ctx = ToolCallContext::new(
        "search",
        json!({"index": "i", "query": "q", "cursor": "garbage-token"}),
        30_000,
    );

    let envelope = executor()
        .run(
            &mut ctx,
            &coordinator(),
            &[],
            require_index_and_query,
            |params| search_page(api.clone(), params),
        )
        .await;

    assert!(envelope.is_error);
    // Local failures fall to the network default but are marked terminal.
    let insight = envelope.insight.expect("Classified failure");
    assert!(!insight.is_retryable());
    assert!(insight.message.contains("token"));
}

//! Adaptive response sizing.
//!
//! Payloads within budget pass through untouched. Oversized payloads are
//! summarized when a summarizer is configured (under its own, shorter
//! deadline — a summarizer failure can never fail the call), and otherwise
//! hard-truncated with a marker stating the original size.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::pipeline::deadline::with_deadline;
use crate::FathomError;

/// Rough token estimate used for summary budgets (4 chars per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Budget and summarizer settings for one shaping pass.
#[derive(Debug, Clone)]
pub struct ShapeConfig {
    /// Maximum payload size in characters.
    pub max_chars: usize,
    /// Deadline for the summarizer call, milliseconds.
    pub summarizer_timeout_ms: u64,
    /// Token budget handed to the summarizer.
    pub summary_token_budget: usize,
}

impl Default for ShapeConfig {
    fn default() -> Self {
        Self {
            max_chars: crate::config::DEFAULT_RESPONSE_BUDGET,
            summarizer_timeout_ms: crate::config::DEFAULT_SUMMARIZER_TIMEOUT_MS,
            summary_token_budget: 500,
        }
    }
}

/// Compresses an oversized payload within a token budget.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str, token_budget: usize) -> Result<String, FathomError>;
}

/// The shaped response envelope.
#[derive(Debug, Clone)]
pub struct Shaped {
    pub text: String,
    pub summarized: bool,
    pub truncated: bool,
    /// Size of the serialized payload before degradation, when degraded.
    pub original_chars: Option<usize>,
    /// Machine-readable payload, attached only when the text passed through
    /// unmodified (a summarized or truncated text no longer matches it).
    pub structured: Option<Value>,
}

/// Serialize `payload` and fit it to the budget.
pub async fn shape(
    payload: &Value,
    config: &ShapeConfig,
    summarizer: Option<&dyn Summarizer>,
    structured: Option<Value>,
) -> Shaped {
    let text = payload.to_string();

    if text.len() <= config.max_chars {
        return Shaped {
            text,
            summarized: false,
            truncated: false,
            original_chars: None,
            structured,
        };
    }

    let original_chars = text.len();

    if let Some(summarizer) = summarizer {
        let attempt = with_deadline(
            summarizer.summarize(&text, config.summary_token_budget),
            config.summarizer_timeout_ms,
            "summarize",
        )
        .await;

        match attempt {
            Ok(summary) => {
                // The summarizer is trusted for content, not for size.
                let (text, re_truncated) = fit(&summary, config.max_chars, original_chars);
                return Shaped {
                    text,
                    summarized: true,
                    truncated: re_truncated,
                    original_chars: Some(original_chars),
                    structured: None,
                };
            }
            Err(e) => {
                tracing::debug!("Summarizer failed, degrading to truncation: {}", e);
            }
        }
    }

    let (text, _) = fit(&text, config.max_chars, original_chars);
    Shaped {
        text,
        summarized: false,
        truncated: true,
        original_chars: Some(original_chars),
        structured: None,
    }
}

/// Truncate to `max_chars` on a char boundary, appending a marker naming the
/// original size. Returns the text and whether truncation was applied.
fn fit(text: &str, max_chars: usize, original_chars: usize) -> (String, bool) {
    if text.len() <= max_chars {
        return (text.to_string(), false);
    }
    let mut cut = max_chars;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = text[..cut].to_string();
    out.push_str(&format!(
        "\n[truncated — original response was {} characters]",
        original_chars
    ));
    (out, true)
}

/// Deterministic structural summarizer: compacts a JSON payload into counts,
/// a field inventory, and a few leading items. The `Summarizer` trait is the
/// seam for model-backed implementations; this one never needs a network.
pub struct OutlineSummarizer;

#[async_trait]
impl Summarizer for OutlineSummarizer {
    async fn summarize(&self, text: &str, token_budget: usize) -> Result<String, FathomError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| FathomError::Validation(format!("unsummarizable payload: {}", e)))?;
        let budget_chars = token_budget.saturating_mul(4);
        let outline = outline(&value, budget_chars);
        Ok(outline.to_string())
    }
}

fn outline(value: &Value, budget_chars: usize) -> Value {
    match value {
        Value::Array(items) => {
            let mut leading = Vec::new();
            let mut used = 0usize;
            for item in items {
                let compact = shallow(item);
                used += compact.to_string().len();
                if used > budget_chars / 2 && !leading.is_empty() {
                    break;
                }
                leading.push(compact);
                if leading.len() >= 5 {
                    break;
                }
            }
            json!({
                "summary": true,
                "item_count": items.len(),
                "leading_items": leading,
            })
        }
        Value::Object(map) => {
            let mut out = Map::new();
            out.insert("summary".into(), json!(true));
            out.insert("fields".into(), json!(map.keys().collect::<Vec<_>>()));
            for (key, v) in map {
                match v {
                    Value::Array(items) => {
                        out.insert(format!("{}_count", key), json!(items.len()));
                        if let Some(first) = items.first() {
                            out.insert(format!("{}_first", key), shallow(first));
                        }
                    }
                    Value::String(s) if s.len() > 200 => {
                        let mut cut = 200;
                        while !s.is_char_boundary(cut) {
                            cut -= 1;
                        }
                        out.insert(key.clone(), json!(format!("{}…", &s[..cut])));
                    }
                    scalar => {
                        out.insert(key.clone(), shallow(scalar));
                    }
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

/// One level deep, long strings clipped.
fn shallow(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, v) in map {
                match v {
                    Value::String(s) if s.len() > 120 => {
                        let mut cut = 120;
                        while !s.is_char_boundary(cut) {
                            cut -= 1;
                        }
                        out.insert(key.clone(), json!(format!("{}…", &s[..cut])));
                    }
                    Value::Array(items) => {
                        out.insert(key.clone(), json!(format!("[{} items]", items.len())));
                    }
                    Value::Object(_) => {
                        out.insert(key.clone(), json!("{…}"));
                    }
                    scalar => {
                        out.insert(key.clone(), scalar.clone());
                    }
                }
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

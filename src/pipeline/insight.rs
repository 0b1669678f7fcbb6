//! Failure classification for upstream errors.
//!
//! Every failure resolves to exactly one code from a closed taxonomy, with a
//! remediation hint the calling model can act on. Classification is an
//! ordered, first-match-wins rule table: the downtime marker is checked
//! before the status rules (a 409 whose body says the schema change needs a
//! rebuild is a downtime problem, not a generic conflict), then status
//! rules, then message-pattern rules, then the `Network` default.
//!
//! The message patterns are heuristics over upstream error strings and will
//! drift as the upstream evolves; keep them centralized here and covered by
//! one test per pattern so new strings are a one-line addition.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::FathomError;

/// Closed set of failure classifications surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InsightCode {
    Ok,
    Auth,
    NotFound,
    Conflict,
    RateLimit,
    DowntimeRequired,
    VectorDimMismatch,
    BadFilter,
    Cooldown,
    Network,
}

impl InsightCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightCode::Ok => "OK",
            InsightCode::Auth => "AUTH",
            InsightCode::NotFound => "NOT_FOUND",
            InsightCode::Conflict => "CONFLICT",
            InsightCode::RateLimit => "RATE_LIMIT",
            InsightCode::DowntimeRequired => "DOWNTIME_REQUIRED",
            InsightCode::VectorDimMismatch => "VECTOR_DIM_MISMATCH",
            InsightCode::BadFilter => "BAD_FILTER",
            InsightCode::Cooldown => "COOLDOWN",
            InsightCode::Network => "NETWORK",
        }
    }
}

/// Immutable classification result.
#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub ok: bool,
    pub code: InsightCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extras: Map<String, Value>,
}

impl Insight {
    /// Successful-outcome marker.
    pub fn success() -> Self {
        Self {
            ok: true,
            code: InsightCode::Ok,
            message: String::new(),
            recommendation: None,
            retry_after_secs: None,
            extras: Map::new(),
        }
    }

    /// Whether the caller may retry the same request as-is (after any
    /// reported delay).
    pub fn is_retryable(&self) -> bool {
        self.extras
            .get("retryable")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

/// Raw failure material fed to the classifier.
#[derive(Debug, Clone, Default)]
pub struct RawFailure {
    /// HTTP status, when the failure came from an HTTP response.
    pub status: Option<u16>,
    pub message: String,
    /// Raw `Retry-After` header value, if present.
    pub retry_after: Option<String>,
}

static DOWNTIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)requires?\s+(an?\s+)?(index\s+)?(rebuild|downtime)|cannot\s+be\s+(chang|modifi)ed\s+without\s+(a\s+)?rebuild")
        .expect("downtime pattern")
});

static VECTOR_DIM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(vector\s+)?dimensions?\s+((mis)?match|do(es)?\s+not\s+match)|expected\s+\d+\s+dimensions?")
        .expect("vector dimension pattern")
});

static BAD_FILTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(invalid|malformed|unparseable)\s+\$?filter|filter\s+(expression|syntax)|syntax\s+error.*\$?filter")
        .expect("filter pattern")
});

static COOLDOWN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)cool\s?down|temporarily\s+throttled|too\s+many\s+(index(ing)?|service)\s+operations")
        .expect("cooldown pattern")
});

struct Rule {
    code: InsightCode,
    applies: fn(&RawFailure) -> bool,
    recommendation: &'static str,
    retryable: bool,
}

/// First match wins. Order matters: see module docs.
static RULES: &[Rule] = &[
    Rule {
        code: InsightCode::DowntimeRequired,
        applies: |raw| DOWNTIME_RE.is_match(&raw.message),
        recommendation: "This schema change cannot be applied in place. Recreate the index (or schedule a rebuild window) instead of updating it.",
        retryable: false,
    },
    Rule {
        code: InsightCode::RateLimit,
        applies: |raw| matches!(raw.status, Some(429) | Some(503)),
        recommendation: "The service is rate limiting requests. Wait the reported delay before retrying; do not tighten the loop.",
        retryable: true,
    },
    Rule {
        code: InsightCode::Auth,
        applies: |raw| matches!(raw.status, Some(401) | Some(403)),
        recommendation: "Authentication failed. Verify the API key and that it has permission for this operation.",
        retryable: false,
    },
    Rule {
        code: InsightCode::NotFound,
        applies: |raw| raw.status == Some(404),
        recommendation: "The target does not exist. Check the index/indexer name; use list_indexes to see what is available.",
        retryable: false,
    },
    Rule {
        code: InsightCode::Conflict,
        applies: |raw| raw.status == Some(409),
        recommendation: "A conflicting resource or concurrent modification blocked this request. Fetch the current state and retry with it.",
        retryable: false,
    },
    Rule {
        code: InsightCode::VectorDimMismatch,
        applies: |raw| VECTOR_DIM_RE.is_match(&raw.message),
        recommendation: "The vector length does not match the field's configured dimensions. Check the embedding model and the index's vector field definition.",
        retryable: false,
    },
    Rule {
        code: InsightCode::BadFilter,
        applies: |raw| BAD_FILTER_RE.is_match(&raw.message),
        recommendation: "The filter expression failed to parse. Check operator syntax and that every referenced field is filterable.",
        retryable: false,
    },
    Rule {
        code: InsightCode::Cooldown,
        applies: |raw| COOLDOWN_RE.is_match(&raw.message),
        recommendation: "The service is in a cooldown period after heavy indexing. Pause briefly before issuing more operations.",
        retryable: true,
    },
];

/// Map a raw failure to an `Insight`. Total: anything the rules don't claim
/// is classified `NETWORK`.
pub fn classify(raw: &RawFailure, context: &str) -> Insight {
    let mut extras = Map::new();
    extras.insert("context".into(), json!(context));
    if let Some(status) = raw.status {
        extras.insert("status".into(), json!(status));
    }

    for rule in RULES {
        if (rule.applies)(raw) {
            extras.insert("retryable".into(), json!(rule.retryable));
            let retry_after_secs = if rule.code == InsightCode::RateLimit {
                raw.retry_after.as_deref().and_then(parse_retry_after)
            } else {
                None
            };
            return Insight {
                ok: false,
                code: rule.code,
                message: raw.message.clone(),
                recommendation: Some(rule.recommendation.to_string()),
                retry_after_secs,
                extras,
            };
        }
    }

    extras.insert("retryable".into(), json!(true));
    Insight {
        ok: false,
        code: InsightCode::Network,
        message: raw.message.clone(),
        recommendation: Some(
            "The request did not complete (network or service issue). Retrying once is safe; if it persists, check the endpoint configuration.".to_string(),
        ),
        retry_after_secs: None,
        extras,
    }
}

/// Classify any `FathomError`, handling the local (non-upstream) failures
/// the rule table never sees.
pub fn classify_error(err: &FathomError, context: &str) -> Insight {
    match err {
        FathomError::Upstream {
            status,
            message,
            retry_after,
        } => classify(
            &RawFailure {
                status: *status,
                message: message.clone(),
                retry_after: retry_after.clone(),
            },
            context,
        ),
        FathomError::Timeout { label, deadline_ms } => {
            let mut insight = classify(
                &RawFailure {
                    status: None,
                    message: err.to_string(),
                    retry_after: None,
                },
                context,
            );
            insight.recommendation = Some(
                "The operation outlived its deadline. The upstream call may still be running; retry with a narrower request or a larger timeout.".to_string(),
            );
            insight.extras.insert("timed_out".into(), json!(true));
            insight.extras.insert("label".into(), json!(label));
            insight
                .extras
                .insert("deadline_ms".into(), json!(deadline_ms));
            insight
        }
        FathomError::Declined(reason) => {
            let mut insight = classify(
                &RawFailure {
                    status: None,
                    message: format!("Declined by user: {}", reason),
                    retry_after: None,
                },
                context,
            );
            insight.recommendation = Some(
                "The user declined to provide the requested input. Do not retry; ask the user directly or proceed without this operation.".to_string(),
            );
            insight.extras.insert("retryable".into(), json!(false));
            insight
        }
        other => {
            // Validation, cursor, elicitation-transport, config. Unclaimed by
            // the rule table, so they land on the Network default; the
            // recommendation and retryable flag are corrected here.
            let mut insight = classify(
                &RawFailure {
                    status: None,
                    message: other.to_string(),
                    retry_after: None,
                },
                context,
            );
            insight.recommendation = Some(
                "The request shape was invalid. Fix the listed parameters before retrying; retrying unchanged will fail again.".to_string(),
            );
            insight.extras.insert("retryable".into(), json!(false));
            insight
        }
    }
}

/// Parse a Retry-After value, accepting both second- and millisecond-
/// denominated numbers (anything over 1000 is assumed to be milliseconds
/// and rounded up to whole seconds).
fn parse_retry_after(value: &str) -> Option<u64> {
    let n: u64 = value.trim().parse().ok()?;
    if n > 1_000 {
        Some(n.div_ceil(1_000))
    } else {
        Some(n)
    }
}

//! The tool invocation pipeline.
//!
//! Every tool call flows through the same cross-cutting machinery,
//! regardless of which upstream operation it wraps:
//!
//! validate → elicit missing parameters (if the client supports it) →
//! execute under a deadline → classify failures → shape the response.

pub mod cursor;
pub mod deadline;
pub mod elicit;
pub mod executor;
pub mod insight;
pub mod poll;
pub mod shape;

pub use cursor::{decode_cursor, encode_cursor, paginate, Page};
pub use deadline::with_deadline;
pub use elicit::{
    missing, ElicitAction, ElicitOutcome, ElicitRequest, ElicitState, ElicitStep,
    ElicitationClient, ElicitationCoordinator, PrimitiveSchema,
};
pub use executor::{Envelope, ToolCallContext, ToolExecutor};
pub use insight::{classify, classify_error, Insight, InsightCode, RawFailure};
pub use poll::{poll_until, PollConfig, PollStatus};
pub use shape::{shape, OutlineSummarizer, ShapeConfig, Shaped, Summarizer};

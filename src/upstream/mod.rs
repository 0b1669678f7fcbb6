//! The upstream search service seam: domain types, the `SearchApi` trait,
//! and the HTTP implementation.

pub mod api;
pub mod http;
pub mod types;

pub use api::SearchApi;
pub use http::HttpSearchApi;
pub use types::*;

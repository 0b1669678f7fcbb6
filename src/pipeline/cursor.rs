//! Stateless cursor pagination.
//!
//! Cursors are opaque, versioned continuation tokens: base64 over a small
//! JSON record carrying the offset and a page-size fingerprint. Decoding is
//! fail-closed — a token this module did not produce (bad base64, bad JSON,
//! unknown version, out-of-range offset, changed page size) is a hard
//! `FathomError::Cursor`, never a silent restart from offset zero.

use base64::engine::general_purpose;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::FathomError;

const CURSOR_VERSION: u8 = 1;

/// Internal cursor payload. Opaque to clients.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct CursorData {
    pub(crate) v: u8,
    pub(crate) offset: usize,
    /// Fingerprint: the page size the walk started with. Changing it
    /// mid-walk would silently re-chunk the collection, so it is rejected.
    pub(crate) page_size: usize,
}

pub fn encode_cursor(offset: usize, page_size: usize) -> String {
    let data = CursorData {
        v: CURSOR_VERSION,
        offset,
        page_size,
    };
    // Serializing a struct of three integers cannot fail.
    let json = serde_json::to_string(&data).expect("cursor serialization");
    general_purpose::STANDARD.encode(json)
}

pub(crate) fn decode_cursor_data(token: &str) -> Result<CursorData, FathomError> {
    let bytes = general_purpose::STANDARD
        .decode(token)
        .map_err(|_| FathomError::Cursor("not a valid continuation token".into()))?;
    let data: CursorData = serde_json::from_slice(&bytes)
        .map_err(|_| FathomError::Cursor("unrecognized continuation token".into()))?;
    if data.v != CURSOR_VERSION {
        return Err(FathomError::Cursor(format!(
            "unsupported cursor version {}",
            data.v
        )));
    }
    Ok(data)
}

/// Decode a cursor produced by [`encode_cursor`], returning the offset.
pub fn decode_cursor(token: &str) -> Result<usize, FathomError> {
    decode_cursor_data(token).map(|d| d.offset)
}

/// One page of results plus continuation state.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub has_more: bool,
    pub total_count: usize,
}

/// Slice one page out of a fresh snapshot of the collection.
///
/// `page_size` must be non-zero. An absent cursor starts at offset zero;
/// a present cursor must round-trip and must have been minted for the same
/// page size.
pub fn paginate<T: Clone>(
    items: &[T],
    page_size: usize,
    cursor: Option<&str>,
) -> Result<Page<T>, FathomError> {
    if page_size == 0 {
        return Err(FathomError::Validation("page_size must be at least 1".into()));
    }

    let offset = match cursor {
        None => 0,
        Some(token) => {
            let data = decode_cursor_data(token)?;
            if data.page_size != page_size {
                return Err(FathomError::Cursor(format!(
                    "cursor was created for page_size {}, request uses {}",
                    data.page_size, page_size
                )));
            }
            if data.offset > items.len() {
                return Err(FathomError::Cursor(format!(
                    "cursor offset {} is past the end of the collection ({} items)",
                    data.offset,
                    items.len()
                )));
            }
            data.offset
        }
    };

    let total_count = items.len();
    let end = (offset + page_size).min(total_count);
    let page: Vec<T> = items[offset..end].to_vec();
    let has_more = offset + page_size < total_count;
    let next_cursor = has_more.then(|| encode_cursor(end, page_size));

    Ok(Page {
        items: page,
        next_cursor,
        has_more,
        total_count,
    })
}

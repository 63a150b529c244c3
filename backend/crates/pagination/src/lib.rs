//! Offset pagination primitives shared by listing and export paths.
//!
//! A [`PageRequest`] is always clamped on construction, so adapters can pass
//! `offset` and `limit` straight into SQL without re-validating them. A
//! [`Page`] reports the total number of matching rows independently of the
//! window it carries, and can mint an opaque [`Cursor`] for the next window.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper bound applied when the caller does not supply its own maximum.
pub const DEFAULT_MAX_PAGE_SIZE: u32 = 200;

/// Offset/limit window over an ordered result set.
///
/// # Examples
///
/// ```
/// use pagination::PageRequest;
///
/// let request = PageRequest::new(20, Some(5_000), 200);
/// assert_eq!(request.offset(), 20);
/// assert_eq!(request.limit(), 200);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    offset: u64,
    limit: u32,
}

impl PageRequest {
    /// Build a request, clamping `limit` to `1..=max_limit`.
    ///
    /// A missing limit falls back to [`DEFAULT_PAGE_SIZE`]; a `max_limit` of
    /// zero is treated as one.
    #[must_use]
    pub fn new(offset: u64, limit: Option<u32>, max_limit: u32) -> Self {
        let max_limit = max_limit.max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, max_limit);
        Self { offset, limit }
    }

    /// Resume from a cursor previously issued by [`Page::next_cursor`].
    #[must_use]
    pub fn from_cursor(cursor: &Cursor, limit: Option<u32>, max_limit: u32) -> Self {
        Self::new(cursor.offset, limit, max_limit)
    }

    /// Number of rows to skip.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Maximum number of rows to return.
    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// The window immediately after this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit as u64),
            limit: self.limit,
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(0, None, DEFAULT_MAX_PAGE_SIZE)
    }
}

/// One window of results plus the total number of matching rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// Rows inside the requested window.
    pub items: Vec<T>,
    /// Number of rows matching the query, ignoring the window.
    pub total: u64,
    /// Window that produced `items`.
    pub request: PageRequest,
}

impl<T> Page<T> {
    /// Wrap a window of items.
    #[must_use]
    pub const fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            request,
        }
    }

    /// Cursor for the following window, or `None` when this page is the last.
    ///
    /// # Examples
    ///
    /// ```
    /// use pagination::{Page, PageRequest};
    ///
    /// let page = Page::new(vec![1, 2], 5, PageRequest::new(0, Some(2), 10));
    /// let cursor = page.next_cursor().expect("more rows remain");
    /// assert_eq!(cursor.offset(), 2);
    /// ```
    #[must_use]
    pub fn next_cursor(&self) -> Option<Cursor> {
        let next = self.request.next();
        (next.offset() < self.total).then(|| Cursor::new(next.offset()))
    }

    /// Transform the items while keeping the window metadata.
    #[must_use]
    pub fn map<U, F>(self, f: F) -> Page<U>
    where
        F: FnMut(T) -> U,
    {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            request: self.request,
        }
    }
}

/// Errors raised when decoding an opaque cursor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CursorError {
    /// The cursor was not valid URL-safe base64.
    #[error("cursor is not valid base64: {message}")]
    Encoding {
        /// Decoder diagnostic.
        message: String,
    },
    /// The decoded cursor payload was not understood.
    #[error("cursor payload is malformed: {message}")]
    Payload {
        /// Parser diagnostic.
        message: String,
    },
}

/// Opaque continuation token handed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "o")]
    offset: u64,
}

impl Cursor {
    /// Cursor pointing at `offset`.
    #[must_use]
    pub const fn new(offset: u64) -> Self {
        Self { offset }
    }

    /// Offset the cursor resumes from.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Encode as URL-safe base64 of a compact JSON payload.
    #[must_use]
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{{\"o\":{}}}", self.offset))
    }

    /// Decode a token produced by [`Cursor::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`CursorError`] when the token is not base64 or does not carry
    /// a cursor payload.
    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|err| CursorError::Encoding {
                message: err.to_string(),
            })?;
        serde_json::from_slice(&bytes).map_err(|err| CursorError::Payload {
            message: err.to_string(),
        })
    }
}

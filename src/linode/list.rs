//! List endpoint contract
//!
//! The executor only needs one upstream operation: fetch one page of a list
//! endpoint with an optional `X-Filter` predicate. [`ListApi`] is that seam;
//! [`super::client::LinodeClient`] implements it over HTTP and tests provide
//! in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Smallest page size the API accepts
pub const MIN_PAGE_SIZE: u32 = 25;
/// Largest page size the API accepts
pub const MAX_PAGE_SIZE: u32 = 500;
/// Page size used when nothing is configured
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Maximum length of an error body excerpt
const MAX_EXCERPT_LENGTH: usize = 200;

/// Clamp a requested page size into the range the API accepts
pub fn clamp_page_size(page_size: u32) -> u32 {
    page_size.clamp(MIN_PAGE_SIZE, MAX_PAGE_SIZE)
}

/// Pagination and filter parameters for one list call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    /// Encoded server predicate, sent as `X-Filter`
    pub filter: Option<String>,
    /// 1-based page index
    pub page: u32,
    pub page_size: u32,
}

impl ListOptions {
    pub fn new(filter: Option<String>, page: u32, page_size: u32) -> Self {
        Self {
            filter,
            page,
            page_size,
        }
    }
}

fn first_page() -> u32 {
    1
}

/// Paged envelope returned by every list endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub data: Vec<Value>,
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub results: u64,
}

/// Upstream client errors
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("API request failed: {status}")]
    Status { status: u16, body: String },

    #[error("Failed to send request: {0}")]
    Transport(String),

    #[error("Failed to parse response JSON: {0}")]
    Decode(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// HTTP status, when the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Error text with the response body reduced to a printable excerpt
    pub fn excerpt(&self) -> String {
        match self {
            ApiError::Status { status, body } if !body.is_empty() => {
                format!("API request failed: {}: {}", status, sanitize_excerpt(body))
            }
            other => other.to_string(),
        }
    }
}

/// Truncate a response body and drop non-printable characters
pub(crate) fn sanitize_excerpt(body: &str) -> String {
    let truncated = match body.char_indices().nth(MAX_EXCERPT_LENGTH) {
        Some((cut, _)) => format!(
            "{}... [truncated, {} bytes total]",
            &body[..cut],
            body.len()
        ),
        None => body.to_string(),
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// One page of a list endpoint
#[async_trait]
pub trait ListApi: Send + Sync {
    async fn list(&self, endpoint: &str, options: &ListOptions) -> Result<ListPage, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_page_size() {
        assert_eq!(clamp_page_size(0), MIN_PAGE_SIZE);
        assert_eq!(clamp_page_size(100), 100);
        assert_eq!(clamp_page_size(10_000), MAX_PAGE_SIZE);
    }

    #[test]
    fn test_list_page_defaults() {
        let page: ListPage = serde_json::from_str(r#"{"data": [{"id": 1}]}"#).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.pages, 0);
        assert_eq!(page.data.len(), 1);
    }

    #[test]
    fn test_excerpt_truncates_long_bodies() {
        let err = ApiError::Status {
            status: 500,
            body: "x".repeat(1000),
        };

        let excerpt = err.excerpt();
        assert!(excerpt.starts_with("API request failed: 500: xxx"));
        assert!(excerpt.contains("[truncated, 1000 bytes total]"));
    }

    #[test]
    fn test_excerpt_strips_control_characters() {
        assert_eq!(sanitize_excerpt("bad\nfilter\t!"), "badfilter!");
    }

    #[test]
    fn test_not_found() {
        let err = ApiError::Status {
            status: 404,
            body: String::new(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.excerpt(), "API request failed: 404");
        assert!(!ApiError::Transport("timeout".to_string()).is_not_found());
    }
}

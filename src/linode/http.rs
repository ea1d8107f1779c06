//! HTTP utilities for Linode REST API calls

use super::list::{sanitize_excerpt, ApiError, ListPage};
use reqwest::Client;
use url::Url;

/// Header carrying the encoded filter predicate
pub const FILTER_HEADER: &str = "X-Filter";

/// HTTP client wrapper for Linode API calls
#[derive(Clone)]
pub struct LinodeHttpClient {
    client: Client,
}

impl LinodeHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("linode-query/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// GET one page of a list endpoint
    pub async fn get_page(
        &self,
        url: Url,
        token: Option<&str>,
        filter: Option<&str>,
    ) -> Result<ListPage, ApiError> {
        tracing::debug!("GET {} filter={}", url, filter.unwrap_or("-"));

        let mut request = self.client.get(url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(filter) = filter {
            request = request.header(FILTER_HEADER, filter);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            // Only log a sanitized/truncated body
            tracing::error!("API error: {} - {}", status, sanitize_excerpt(&body));
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// User-facing hint for an upstream HTTP status
pub fn status_hint(status: Option<u16>) -> Option<&'static str> {
    match status? {
        401 => Some("Authentication failed. Check LINODE_TOKEN."),
        403 => Some("Permission denied. Check the token's scopes."),
        404 => Some("Resource not found."),
        429 => Some("Rate limit exceeded. Please try again later."),
        400 => Some("Invalid request. Check your filter."),
        500..=599 => Some("Linode API temporarily unavailable. Please try again."),
        _ => None,
    }
}

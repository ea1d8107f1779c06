//! Linode Client
//!
//! Main client for the Linode v4 API, combining the bearer token, base URL
//! and HTTP functionality.

use super::http::LinodeHttpClient;
use super::list::{ApiError, ListApi, ListOptions, ListPage};
use async_trait::async_trait;
use url::Url;

/// Default API base URL
pub const DEFAULT_API_URL: &str = "https://api.linode.com/v4";

/// Main Linode client
#[derive(Clone)]
pub struct LinodeClient {
    http: LinodeHttpClient,
    base_url: String,
    token: Option<String>,
}

impl LinodeClient {
    /// Create a client against the public API
    pub fn new(token: Option<String>) -> Result<Self, ApiError> {
        Self::with_base_url(token, DEFAULT_API_URL)
    }

    /// Create a client against a custom base URL
    pub fn with_base_url(token: Option<String>, base_url: &str) -> Result<Self, ApiError> {
        Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        Ok(Self {
            http: LinodeHttpClient::new()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build the URL of one list page
    pub fn list_url(&self, endpoint: &str, options: &ListOptions) -> Result<Url, ApiError> {
        let raw = format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'));
        let mut url = Url::parse(&raw).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", raw, e)))?;

        url.query_pairs_mut()
            .append_pair("page", &options.page.to_string())
            .append_pair("page_size", &options.page_size.to_string());

        Ok(url)
    }
}

#[async_trait]
impl ListApi for LinodeClient {
    async fn list(&self, endpoint: &str, options: &ListOptions) -> Result<ListPage, ApiError> {
        let url = self.list_url(endpoint, options)?;
        self.http
            .get_page(url, self.token.as_deref(), options.filter.as_deref())
            .await
    }
}

//! Configuration Management
//!
//! Handles persistent configuration storage for linode-query.

use crate::datasource::QuerySettings;
use crate::filter::PlannerOptions;
use crate::linode::{clamp_page_size, DEFAULT_API_URL};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the API token
pub const TOKEN_ENV: &str = "LINODE_TOKEN";
/// Environment variable overriding the API base URL
pub const URL_ENV: &str = "LINODE_URL";

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    /// Personal access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// API base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
    /// Upper bound on the encoded X-Filter header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_filter_len: Option<usize>,
    #[serde(default)]
    pub use_in_operator: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("linode-query").join("config.json"))
    }

    /// Load configuration from disk, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!("ignoring config file: {:#}", err);
                Self::default()
            }
        }
    }

    /// Load configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;

        Ok(())
    }

    /// Get effective token (CLI > LINODE_TOKEN > config)
    pub fn effective_token(&self, cli: Option<&str>) -> Option<String> {
        pick(cli, std::env::var(TOKEN_ENV).ok(), self.token.as_deref())
    }

    /// Get effective API URL (CLI > LINODE_URL > config > default)
    pub fn effective_api_url(&self, cli: Option<&str>) -> String {
        pick(cli, std::env::var(URL_ENV).ok(), self.api_url.as_deref())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Engine settings (CLI page size > config > default)
    pub fn query_settings(&self, cli_page_size: Option<u32>) -> QuerySettings {
        let defaults = QuerySettings::default();

        QuerySettings {
            page_size: clamp_page_size(cli_page_size.or(self.page_size).unwrap_or(defaults.page_size)),
            planner: PlannerOptions {
                max_filter_len: self.max_filter_len.unwrap_or(defaults.planner.max_filter_len),
                use_in_operator: self.use_in_operator,
            },
            read_timeout: self.read_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// First non-empty value in precedence order; blank sources are skipped
fn pick(cli: Option<&str>, env: Option<String>, file: Option<&str>) -> Option<String> {
    let present = |value: &String| !value.trim().is_empty();

    cli.map(str::to_string)
        .filter(present)
        .or_else(|| env.filter(present))
        .or_else(|| file.map(str::to_string).filter(present))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_precedence() {
        assert_eq!(pick(Some("cli"), Some("env".into()), Some("file")).as_deref(), Some("cli"));
        assert_eq!(pick(None, Some("env".into()), Some("file")).as_deref(), Some("env"));
        assert_eq!(pick(None, None, Some("file")).as_deref(), Some("file"));
        assert_eq!(pick(None, None, None), None);
        assert_eq!(pick(Some("  "), None, None), None);
    }

    #[test]
    fn test_pick_skips_blank_sources() {
        assert_eq!(pick(Some(""), Some("env".into()), Some("file")).as_deref(), Some("env"));
        assert_eq!(pick(Some(" "), Some(String::new()), Some("file")).as_deref(), Some("file"));
        assert_eq!(pick(Some(""), Some(" ".into()), Some("")), None);
    }

    #[test]
    fn test_query_settings_defaults() {
        let settings = Config::default().query_settings(None);
        assert_eq!(settings, QuerySettings::default());
    }

    #[test]
    fn test_query_settings_overrides() {
        let config = Config {
            page_size: Some(50),
            max_filter_len: Some(512),
            use_in_operator: true,
            read_timeout_secs: Some(30),
            ..Config::default()
        };

        let settings = config.query_settings(None);
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.planner.max_filter_len, 512);
        assert!(settings.planner.use_in_operator);
        assert_eq!(settings.read_timeout, Some(Duration::from_secs(30)));

        assert_eq!(config.query_settings(Some(10_000)).page_size, 500);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = std::env::temp_dir().join(format!("linode-query-config-{}", std::process::id()));
        let path = dir.join("config.json");
        let config = Config {
            token: Some("abc".to_string()),
            page_size: Some(200),
            ..Config::default()
        };

        config.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap(), config);

        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}

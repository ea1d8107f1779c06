//! Query manifest
//!
//! YAML file listing the data sources the CLI should read:
//!
//! ```yaml
//! data_sources:
//!   - name: web
//!     kind: instances
//!     filter:
//!       - name: label
//!         values: [web-1, web-2]
//!       - name: status
//!         values: [running]
//!       - name: id
//!         values: [1234, 5678]
//!     order_by: created
//!     order: desc
//! ```

use crate::datasource::ReadRequest;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One named data source in a manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceQuery {
    pub name: String,
    pub kind: String,
    #[serde(flatten)]
    pub request: ReadRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub data_sources: Vec<DataSourceQuery>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        Self::from_yaml(&content).with_context(|| format!("invalid manifest {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(content)?;

        let mut seen = HashSet::new();
        for source in &manifest.data_sources {
            if !seen.insert(source.name.as_str()) {
                bail!("duplicate data source name {:?}", source.name);
            }
        }

        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::RawFilter;

    #[test]
    fn test_parse_manifest() {
        let manifest = Manifest::from_yaml(
            r#"
data_sources:
  - name: web
    kind: instances
    filter:
      - name: label
        values: [web-1, web-2]
      - name: tags
        values: [prod]
        match_by: all_of
    order_by: created
    order: desc
  - name: newest-debian
    kind: images
    filter:
      - name: label
        values: [Debian]
        match_by: substring
    latest: true
"#,
        )
        .unwrap();

        assert_eq!(manifest.data_sources.len(), 2);
        let web = &manifest.data_sources[0];
        assert_eq!(web.kind, "instances");
        assert_eq!(web.request.filter[0], RawFilter::new("label", ["web-1", "web-2"]));
        assert_eq!(web.request.filter[1].match_by.as_deref(), Some("all_of"));
        assert_eq!(web.request.order.as_deref(), Some("desc"));
        assert!(manifest.data_sources[1].request.latest);
    }

    #[test]
    fn test_unquoted_values_are_stringified() {
        let manifest = Manifest::from_yaml(
            r#"
data_sources:
  - name: pinned
    kind: instances
    filter:
      - name: id
        values: [1, 2]
      - name: watchdog_enabled
        values: [true]
"#,
        )
        .unwrap();

        let filter = &manifest.data_sources[0].request.filter;
        assert_eq!(filter[0], RawFilter::new("id", ["1", "2"]));
        assert_eq!(filter[1].values, vec!["true"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Manifest::from_yaml(
            r#"
data_sources:
  - {name: a, kind: images}
  - {name: a, kind: regions}
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }
}

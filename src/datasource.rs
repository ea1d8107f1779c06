//! Data sources
//!
//! A data source is one registered kind plus the glue the host runtime needs
//! around the engine: decode the read request, plan, execute, optionally
//! reduce to the latest record, flatten onto the kind's attributes and
//! attach the synthetic identifier.

use crate::filter::{
    execute, get_registry, identity, plan, CancelSignal, FilterError, FilterExpression, KindDef,
    PlannedQuery, PlannerOptions, RawFilter, SortDirective,
};
use crate::linode::{clamp_page_size, ListApi, DEFAULT_PAGE_SIZE};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Per-read engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuerySettings {
    pub page_size: u32,
    pub planner: PlannerOptions,
    /// Deadline applied to each read on top of the caller's signal
    pub read_timeout: Option<Duration>,
}

impl Default for QuerySettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            planner: PlannerOptions::default(),
            read_timeout: None,
        }
    }
}

/// Configuration of one list data source, as the user wrote it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    #[serde(default)]
    pub filter: Vec<RawFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    /// Keep only the most recently created record
    #[serde(default)]
    pub latest: bool,
}

/// Computed state of a data source after a read
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadState {
    pub id: String,
    pub items: Vec<Value>,
}

/// Everything decided before the first HTTP call
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRead {
    pub expression: FilterExpression,
    pub sort: SortDirective,
    pub plan: PlannedQuery,
    pub id: String,
    pub latest: bool,
}

/// A registered kind bound to its definition
#[derive(Debug, Clone, Copy)]
pub struct DataSource<'a> {
    kind: &'a str,
    def: &'a KindDef,
}

impl DataSource<'static> {
    /// Look a kind up in the global registry
    pub fn lookup(kind: &str) -> Result<Self, FilterError> {
        get_registry()
            .kinds
            .get_key_value(kind)
            .map(|(key, def)| DataSource::new(key, def))
            .ok_or_else(|| FilterError::UnknownKind {
                kind: kind.to_string(),
            })
    }
}

impl<'a> DataSource<'a> {
    pub fn new(kind: &'a str, def: &'a KindDef) -> Self {
        Self { kind, def }
    }

    pub fn kind(&self) -> &str {
        self.kind
    }

    pub fn def(&self) -> &KindDef {
        self.def
    }

    /// Parse, validate and plan a request without touching the network
    pub fn prepare(&self, request: &ReadRequest, settings: &QuerySettings) -> Result<PreparedRead, FilterError> {
        if request.latest && !self.def.supports_latest {
            return Err(FilterError::UnknownField {
                field: "latest".to_string(),
                attribute: "latest".to_string(),
                valid: self.def.filterable_names(),
            });
        }

        let sort = SortDirective::parse(request.order_by.as_deref(), request.order.as_deref())?;
        let expression = FilterExpression::parse(&request.filter, self.def)?;
        let plan = plan(&expression, &sort, self.def, &settings.planner)?;
        let id = identity(&expression, &sort);

        Ok(PreparedRead {
            expression,
            sort,
            plan,
            id,
            latest: request.latest,
        })
    }

    /// Run a full read: plan, page through the endpoint, flatten
    pub async fn read<C>(
        &self,
        client: &C,
        request: &ReadRequest,
        settings: &QuerySettings,
        cancel: &CancelSignal,
    ) -> Result<ReadState, FilterError>
    where
        C: ListApi + ?Sized,
    {
        let prepared = self.prepare(request, settings)?;

        let cancel = match settings.read_timeout {
            Some(timeout) => cancel.clone().with_timeout(timeout),
            None => cancel.clone(),
        };

        let mut records = execute(
            client,
            self.def,
            &prepared.plan,
            clamp_page_size(settings.page_size),
            &cancel,
        )
        .await?;

        if prepared.latest {
            records = select_latest(records);
        }

        Ok(ReadState {
            id: prepared.id,
            items: records.iter().map(|record| self.flatten(record)).collect(),
        })
    }

    /// Project a record onto the kind's attributes
    pub fn flatten(&self, record: &Value) -> Value {
        if self.def.attributes.is_empty() {
            return record.clone();
        }

        let mut out = Map::new();
        for attribute in &self.def.attributes {
            out.insert(
                attribute.name.clone(),
                extract_json_value(record, &attribute.json_path).clone(),
            );
        }
        Value::Object(out)
    }
}

static NULL: Value = Value::Null;

/// Walk a dot-separated path; numeric segments index arrays
pub fn extract_json_value<'v>(item: &'v Value, path: &str) -> &'v Value {
    let mut current = item;

    for part in path.split('.') {
        let next = match part.parse::<usize>() {
            Ok(idx) if current.is_array() => current.get(idx),
            _ => current.get(part),
        };
        current = match next {
            Some(v) => v,
            None => return &NULL,
        };
    }

    current
}

/// Reduce records to the one with the greatest `created` timestamp
pub fn select_latest(records: Vec<Value>) -> Vec<Value> {
    let mut latest: Option<(DateTime<Utc>, Value)> = None;

    for record in records {
        let Some(created) = record.get("created").and_then(Value::as_str).and_then(parse_timestamp) else {
            tracing::debug!("skipping record without a parseable created timestamp");
            continue;
        };

        if latest.as_ref().map_or(true, |(best, _)| created > *best) {
            latest = Some((created, record));
        }
    }

    latest.into_iter().map(|(_, record)| record).collect()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|naive| naive.and_utc()))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::SortPlacement;
    use serde_json::json;

    #[test]
    fn test_lookup_unknown_kind() {
        let err = DataSource::lookup("widgets").unwrap_err();
        assert!(matches!(err, FilterError::UnknownKind { .. }));
        assert_eq!(DataSource::lookup("images").unwrap().kind(), "images");
    }

    #[test]
    fn test_prepare_plans_request() {
        let source = DataSource::lookup("instances").unwrap();
        let request = ReadRequest {
            filter: vec![
                RawFilter::new("label", ["web-1"]),
                RawFilter::new("status", ["running"]),
            ],
            order_by: Some("created".to_string()),
            order: Some("desc".to_string()),
            latest: false,
        };

        let prepared = source.prepare(&request, &QuerySettings::default()).unwrap();
        assert_eq!(prepared.plan.server_filter.as_deref(), Some(r#"{"label":"web-1"}"#));
        assert_eq!(prepared.plan.client_predicate.len(), 1);
        assert_eq!(prepared.plan.order_spec.placement, SortPlacement::Client);
        assert_eq!(prepared.id.len(), 64);
    }

    #[test]
    fn test_latest_requires_support() {
        let request = ReadRequest {
            latest: true,
            ..ReadRequest::default()
        };

        let err = DataSource::lookup("instances")
            .unwrap()
            .prepare(&request, &QuerySettings::default())
            .unwrap_err();
        assert_eq!(err.attribute(), Some("latest"));

        assert!(DataSource::lookup("images")
            .unwrap()
            .prepare(&request, &QuerySettings::default())
            .is_ok());
    }

    #[test]
    fn test_select_latest() {
        let records = vec![
            json!({"id": "a", "created": "2023-01-01T00:00:00"}),
            json!({"id": "b", "created": "2024-06-01T12:00:00"}),
            json!({"id": "c", "created": "not a date"}),
            json!({"id": "d", "created": "2024-06-01T12:00:00"}),
            json!({"id": "e", "created": "2024-01-01T00:00:00Z"}),
        ];

        let latest = select_latest(records);
        assert_eq!(latest, vec![json!({"id": "b", "created": "2024-06-01T12:00:00"})]);
        assert!(select_latest(Vec::new()).is_empty());
    }

    #[test]
    fn test_extract_json_value() {
        let record = json!({"specs": {"disk": 81920}, "ipv4": ["192.0.2.1", "192.0.2.2"]});

        assert_eq!(extract_json_value(&record, "specs.disk"), &json!(81920));
        assert_eq!(extract_json_value(&record, "ipv4.1"), &json!("192.0.2.2"));
        assert_eq!(extract_json_value(&record, "specs.missing"), &Value::Null);
    }

    #[test]
    fn test_flatten_missing_attributes_are_null() {
        let source = DataSource::lookup("instances").unwrap();
        let flat = source.flatten(&json!({"id": 7, "label": "web-1", "specs": {"vcpus": 2}}));

        assert_eq!(flat["id"], json!(7));
        assert_eq!(flat["specs_vcpus"], json!(2));
        assert_eq!(flat["status"], Value::Null);
        assert!(flat.get("region").is_some());
    }
}

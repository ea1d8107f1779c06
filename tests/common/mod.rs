//! Shared test fixtures
//!
//! [`FakeLinode`] is an in-memory list endpoint that understands the subset
//! of the `X-Filter` dialect the planner emits, so planner output can be
//! checked for semantics rather than for exact JSON.

#![allow(dead_code)]

use async_trait::async_trait;
use linode_query::filter::{
    sort_records, CancelHandle, KindDef, KindRegistry, OrderSpec, SortOrder, SortPlacement,
};
use linode_query::linode::{ApiError, ListApi, ListOptions, ListPage};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::Duration;

pub const WIDGETS: &str = r#"{"kinds": {
    "widgets": {
        "display_name": "Widgets",
        "endpoint": "widgets",
        "default_order_key": "id",
        "fields": {
            "id": {"type": "int", "api_filterable": true},
            "label": {"type": "string", "api_filterable": true},
            "size": {"type": "int", "api_filterable": true},
            "public": {"type": "bool", "api_filterable": true},
            "tags": {"type": "string", "api_filterable": true},
            "status": {"type": "string"},
            "region": {"type": "string"},
            "updated": {"type": "string", "allow_order_override": true}
        }
    },
    "gadgets": {
        "display_name": "Gadgets",
        "endpoint": "gadgets",
        "empty_on_not_found": true,
        "fields": {
            "id": {"type": "int", "api_filterable": true}
        }
    }
}}"#;

pub fn registry() -> KindRegistry {
    KindRegistry::from_json(WIDGETS).expect("widgets registry should parse")
}

pub fn widgets() -> KindDef {
    registry().kinds.remove("widgets").expect("widgets kind")
}

pub fn gadgets() -> KindDef {
    registry().kinds.remove("gadgets").expect("gadgets kind")
}

/// In-memory list endpoint
#[derive(Default)]
pub struct FakeLinode {
    records: Vec<Value>,
    calls: AtomicUsize,
    filters: Mutex<Vec<Option<String>>>,
    fail_at: Option<(u32, u16)>,
    cancel_after: Mutex<Option<(u32, CancelHandle)>>,
    delay: Option<Duration>,
}

impl FakeLinode {
    pub fn new(records: Vec<Value>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Answer `page` with the given HTTP status
    pub fn fail_at(mut self, page: u32, status: u16) -> Self {
        self.fail_at = Some((page, status));
        self
    }

    /// Fire `handle` once `page` has been served
    pub fn cancel_after(self, page: u32, handle: CancelHandle) -> Self {
        *self.cancel_after.lock().unwrap() = Some((page, handle));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// X-Filter values received, one per call
    pub fn filters(&self) -> Vec<Option<String>> {
        self.filters.lock().unwrap().clone()
    }

    /// Records the server predicate selects, in response order
    pub fn select(&self, filter: Option<&Value>) -> Vec<Value> {
        let mut selected: Vec<Value> = self
            .records
            .iter()
            .filter(|record| filter.map_or(true, |f| server_matches(f, record)))
            .cloned()
            .collect();

        if let Some(key) = filter.and_then(|f| f.get("+order_by")).and_then(Value::as_str) {
            let order = match filter.and_then(|f| f.get("+order")).and_then(Value::as_str) {
                Some("desc") => SortOrder::Desc,
                _ => SortOrder::Asc,
            };
            sort_records(
                &mut selected,
                &OrderSpec {
                    key: key.to_string(),
                    order,
                    tie_break: "id".to_string(),
                    placement: SortPlacement::Server,
                },
            );
        }

        selected
    }
}

#[async_trait]
impl ListApi for FakeLinode {
    async fn list(&self, _endpoint: &str, options: &ListOptions) -> Result<ListPage, ApiError> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        self.filters.lock().unwrap().push(options.filter.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some((page, status)) = self.fail_at {
            if page == options.page {
                return Err(ApiError::Status {
                    status,
                    body: format!(r#"{{"errors":[{{"reason":"fake failure on page {}"}}]}}"#, page),
                });
            }
        }

        let filter = options
            .filter
            .as_deref()
            .map(|raw| serde_json::from_str::<Value>(raw).expect("X-Filter should be JSON"));
        let selected = self.select(filter.as_ref());

        let page_size = options.page_size.max(1) as usize;
        let pages = selected.len().div_ceil(page_size).max(1) as u32;
        let start = (options.page as usize - 1) * page_size;
        let data = selected.iter().skip(start).take(page_size).cloned().collect();

        let mut cancel = self.cancel_after.lock().unwrap();
        if cancel.as_ref().is_some_and(|(page, _)| *page == options.page) {
            if let Some((_, handle)) = cancel.take() {
                handle.cancel();
            }
        }

        Ok(ListPage {
            data,
            page: options.page,
            pages,
            results: selected.len() as u64,
        })
    }
}

/// Evaluate an encoded server predicate against one record
pub fn server_matches(filter: &Value, record: &Value) -> bool {
    let Some(object) = filter.as_object() else {
        return false;
    };

    object.iter().all(|(key, value)| match key.as_str() {
        "+and" => value
            .as_array()
            .is_some_and(|parts| parts.iter().all(|part| server_matches(part, record))),
        "+or" => value
            .as_array()
            .is_some_and(|parts| parts.iter().any(|part| server_matches(part, record))),
        "+order_by" | "+order" => true,
        field => field_matches(record.get(field), value),
    })
}

fn field_matches(actual: Option<&Value>, condition: &Value) -> bool {
    let Some(actual) = actual.filter(|v| !v.is_null()) else {
        return false;
    };

    match condition {
        Value::Object(ops) => ops.iter().all(|(op, operand)| match op.as_str() {
            "+in" => operand
                .as_array()
                .is_some_and(|options| options.iter().any(|o| any_element(actual, |v| compare(v, o) == Some(Ordering::Equal)))),
            "+neq" => any_element(actual, |v| compare(v, operand).is_some_and(|o| o != Ordering::Equal)),
            "+gt" => any_element(actual, |v| compare(v, operand) == Some(Ordering::Greater)),
            "+gte" => any_element(actual, |v| compare(v, operand).is_some_and(|o| o != Ordering::Less)),
            "+lt" => any_element(actual, |v| compare(v, operand) == Some(Ordering::Less)),
            "+lte" => any_element(actual, |v| compare(v, operand).is_some_and(|o| o != Ordering::Greater)),
            "+contains" => any_element(actual, |v| match (v.as_str(), operand.as_str()) {
                (Some(v), Some(o)) => v.contains(o),
                _ => false,
            }),
            other => panic!("unsupported operator {other}"),
        }),
        operand => any_element(actual, |v| compare(v, operand) == Some(Ordering::Equal)),
    }
}

fn any_element(actual: &Value, check: impl Fn(&Value) -> bool) -> bool {
    match actual {
        Value::Array(items) => items.iter().any(check),
        value => check(value),
    }
}

fn compare(actual: &Value, operand: &Value) -> Option<Ordering> {
    match (actual, operand) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::Number(b)) => Some(a.as_i64()?.cmp(&b.as_i64()?)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

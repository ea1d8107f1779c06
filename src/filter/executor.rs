//! Query Executor
//!
//! Walks a list endpoint page by page with the planned server predicate,
//! keeps records the client residual accepts and applies local ordering when
//! the sort could not be pushed down.

use super::cancel::CancelSignal;
use super::error::FilterError;
use super::planner::{OrderSpec, PlannedQuery, SortPlacement};
use super::model::SortOrder;
use super::registry::KindDef;
use crate::linode::{ApiError, ListApi, ListOptions, ListPage};
use serde_json::Value;
use std::cmp::Ordering;

/// Fetch every page for a planned query and return the surviving records
///
/// Pages are fetched sequentially. Any upstream failure or cancellation
/// discards what was accumulated so far.
pub async fn execute<C>(
    client: &C,
    kind: &KindDef,
    plan: &PlannedQuery,
    page_size: u32,
    cancel: &CancelSignal,
) -> Result<Vec<Value>, FilterError>
where
    C: ListApi + ?Sized,
{
    let filter = plan.server_filter.as_deref();
    let mut all_items = Vec::new();
    let mut page = 1u32;

    loop {
        if cancel.is_cancelled() {
            tracing::debug!("{}: cancelled before page {}", kind.endpoint, page);
            return Err(FilterError::Cancelled);
        }

        let options = ListOptions::new(plan.server_filter.clone(), page, page_size);
        tracing::debug!("{}: fetching page {}", kind.endpoint, page);

        let result: Result<ListPage, ApiError> = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FilterError::Cancelled),
            result = client.list(&kind.endpoint, &options) => result,
        };

        let response = match result {
            Ok(response) => response,
            Err(err) if page == 1 && kind.empty_on_not_found && err.is_not_found() => {
                tracing::debug!("{}: 404 on first page, treating as empty", kind.endpoint);
                return Ok(Vec::new());
            }
            Err(err) => return Err(FilterError::upstream(&err, filter)),
        };

        for item in response.data {
            if plan.client_predicate.evaluate(&item)? {
                all_items.push(item);
            }
        }

        if page >= response.pages {
            break;
        }
        page += 1;
    }

    if plan.order_spec.placement == SortPlacement::Client {
        sort_records(&mut all_items, &plan.order_spec);
    }

    tracing::info!(
        "{}: {} records over {} page(s)",
        kind.endpoint,
        all_items.len(),
        page
    );

    Ok(all_items)
}

/// Stable sort by the order key, then the tie-break key ascending
pub fn sort_records(records: &mut [Value], order: &OrderSpec) {
    records.sort_by(|a, b| {
        let primary = compare_values(a.get(&order.key), b.get(&order.key));
        let primary = match order.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| compare_values(a.get(&order.tie_break), b.get(&order.tie_break)))
    });
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) => 1,
        Some(Value::Number(_)) => 2,
        Some(Value::String(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Object(_)) => 5,
    }
}

/// Total order over JSON values; missing and null sort first
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.total_cmp(&y)
            }
        },
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x @ Value::Array(_)), Some(y @ Value::Array(_)))
        | (Some(x @ Value::Object(_)), Some(y @ Value::Object(_))) => x.to_string().cmp(&y.to_string()),
        _ => rank(a).cmp(&rank(b)),
    }
}

//! Query Planner
//!
//! Splits a filter expression into the largest part the Linode API can
//! evaluate (encoded in its `X-Filter` JSON dialect) and a residual evaluated
//! on the client, and resolves where sorting happens.
//!
//! # Filter dialect
//!
//! ```text
//! {"label": "foo"}                                  single equality
//! {"size": {"+gte": 10}}                            operator wrapper
//! {"+or": [{"label": "a"}, {"label": "b"}]}         multi-operand any_of
//! {"+and": [...], "+order_by": "label", "+order": "desc"}
//! ```

use super::error::FilterError;
use super::model::{Comparator, FilterClause, FilterExpression, MatchMode, SortDirective, SortOrder};
use super::predicate::{check_clause, ClientPredicate};
use super::registry::{FieldType, KindDef};
use serde_json::{Map, Value};

/// Upper bound on the encoded `X-Filter` header, in bytes
pub const DEFAULT_MAX_FILTER_LEN: usize = 4096;

/// Key of the upstream's natural list order
const UPSTREAM_ORDER_KEY: &str = "id";

/// Planner tuning knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerOptions {
    /// Clauses are demoted to the client until the encoded filter fits
    pub max_filter_len: usize,
    /// Encode multi-operand `any_of` equality as `+in` instead of `+or`
    pub use_in_operator: bool,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            max_filter_len: DEFAULT_MAX_FILTER_LEN,
            use_in_operator: false,
        }
    }
}

/// Where the final ordering of a read comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortPlacement {
    /// Keep the upstream's natural order (`id` ascending)
    Upstream,
    /// Ordering keys travel in the server predicate
    Server,
    /// Executor sorts after residual filtering
    Client,
}

/// Resolved sort directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSpec {
    pub key: String,
    pub order: SortOrder,
    /// Always compared ascending after `key`
    pub tie_break: String,
    pub placement: SortPlacement,
}

/// Output of the planner; lives for one read
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedQuery {
    /// Encoded server predicate, `None` when nothing is pushed down
    pub server_predicate: Option<Value>,
    /// `server_predicate` serialized exactly as it is sent
    pub server_filter: Option<String>,
    /// Clauses carried by the server predicate
    pub pushed: Vec<FilterClause>,
    pub client_predicate: ClientPredicate,
    pub order_spec: OrderSpec,
}

/// Plan one read
pub fn plan(
    expression: &FilterExpression,
    sort: &SortDirective,
    kind: &KindDef,
    options: &PlannerOptions,
) -> Result<PlannedQuery, FilterError> {
    let mut pushed = Vec::new();
    let mut residual = Vec::new();

    for (index, clause) in expression.clauses().iter().enumerate() {
        let field_type = check_clause(index, clause, kind)?;
        let api_filterable = kind
            .get_field(&clause.name)
            .is_some_and(|field| field.api_filterable);

        if api_filterable && server_supports(field_type, clause.comparator) {
            pushed.push(clause.clone());
        } else {
            residual.push(clause.clone());
        }
    }

    let order_spec = resolve_order(sort, kind)?;

    let mut encoded = encode_server(&pushed, &order_spec, options);
    while exceeds(&encoded, options.max_filter_len) {
        let Some(demoted) = pushed.pop() else {
            break;
        };
        tracing::debug!(
            "server filter exceeds {} bytes, evaluating {} {} on the client",
            options.max_filter_len,
            demoted.name,
            demoted.comparator
        );
        residual.push(demoted);
        encoded = encode_server(&pushed, &order_spec, options);
    }

    let client_predicate = ClientPredicate::compile(&residual, kind)?;
    let server_filter = encoded.as_ref().map(Value::to_string);

    tracing::debug!(
        "planned: server={} residual={} order={} {} ({:?})",
        server_filter.as_deref().unwrap_or("-"),
        client_predicate.len(),
        order_spec.key,
        order_spec.order.as_str(),
        order_spec.placement
    );

    Ok(PlannedQuery {
        server_predicate: encoded,
        server_filter,
        pushed,
        client_predicate,
        order_spec,
    })
}

fn exceeds(encoded: &Option<Value>, max_len: usize) -> bool {
    encoded
        .as_ref()
        .is_some_and(|value| value.to_string().len() > max_len)
}

/// Clause shapes the upstream dialect can evaluate
pub fn server_supports(field_type: FieldType, comparator: Comparator) -> bool {
    match field_type {
        FieldType::String => matches!(
            comparator,
            Comparator::Eq | Comparator::NotEq | Comparator::Contains
        ),
        FieldType::Int => comparator.is_relational() || matches!(comparator, Comparator::Eq | Comparator::NotEq),
        FieldType::Bool => comparator == Comparator::Eq,
    }
}

fn resolve_order(sort: &SortDirective, kind: &KindDef) -> Result<OrderSpec, FilterError> {
    let tie_break = kind.canonical_default_order_key().to_string();

    let (key, placement) = match (&sort.order_by, sort.order) {
        // The upstream returns records by id ascending
        (None, SortOrder::Asc) if tie_break == UPSTREAM_ORDER_KEY => {
            (tie_break.clone(), SortPlacement::Upstream)
        }
        (None, _) => {
            let pushable = kind
                .get_field(&tie_break)
                .is_some_and(|field| field.api_filterable);
            (tie_break.clone(), placement_for(pushable))
        }
        (Some(order_by), _) => {
            let field = kind.validate_order(order_by)?;
            (order_by.clone(), placement_for(field.api_filterable))
        }
    };

    Ok(OrderSpec {
        key,
        order: sort.order,
        tie_break,
        placement,
    })
}

fn placement_for(api_filterable: bool) -> SortPlacement {
    if api_filterable {
        SortPlacement::Server
    } else {
        SortPlacement::Client
    }
}

/// Encode pushed clauses and server-side ordering; `None` means no filter
pub fn encode_server(clauses: &[FilterClause], order: &OrderSpec, options: &PlannerOptions) -> Option<Value> {
    let mut root = match clauses {
        [] => Map::new(),
        [single] => encode_clause(single, options),
        many => single_entry(
            "+and",
            Value::Array(
                many.iter()
                    .map(|c| Value::Object(encode_clause(c, options)))
                    .collect(),
            ),
        ),
    };

    if order.placement == SortPlacement::Server {
        root.insert("+order_by".to_string(), Value::from(order.key.as_str()));
        root.insert("+order".to_string(), Value::from(order.order.as_str()));
    }

    if root.is_empty() {
        None
    } else {
        Some(Value::Object(root))
    }
}

fn encode_clause(clause: &FilterClause, options: &PlannerOptions) -> Map<String, Value> {
    if let [single] = clause.values.as_slice() {
        return encode_operand(&clause.name, clause.comparator, Value::from(single));
    }

    if options.use_in_operator
        && clause.comparator == Comparator::Eq
        && clause.match_mode == MatchMode::AnyOf
    {
        let operands = clause.values.iter().map(Value::from).collect();
        return single_entry(&clause.name, Value::Object(single_entry("+in", Value::Array(operands))));
    }

    let joiner = match clause.match_mode {
        MatchMode::AnyOf => "+or",
        MatchMode::AllOf => "+and",
    };
    let parts = clause
        .values
        .iter()
        .map(|v| Value::Object(encode_operand(&clause.name, clause.comparator, Value::from(v))))
        .collect();

    single_entry(joiner, Value::Array(parts))
}

fn encode_operand(name: &str, comparator: Comparator, operand: Value) -> Map<String, Value> {
    match operator_key(comparator) {
        None => single_entry(name, operand),
        Some(key) => single_entry(name, Value::Object(single_entry(key, operand))),
    }
}

fn operator_key(comparator: Comparator) -> Option<&'static str> {
    match comparator {
        Comparator::Eq => None,
        Comparator::NotEq => Some("+neq"),
        Comparator::Gt => Some("+gt"),
        Comparator::Gte => Some("+gte"),
        Comparator::Lt => Some("+lt"),
        Comparator::Lte => Some("+lte"),
        Comparator::Contains => Some("+contains"),
        // Never pushed; see `server_supports`
        Comparator::Regex => None,
    }
}

fn single_entry(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

//! Filter-and-query engine
//!
//! Every list data source runs the same pipeline: parse the user's filter
//! blocks against the kind's registry entry, plan which clauses the Linode
//! API can evaluate, page through the list endpoint, apply the residual on
//! the client, sort, and derive a stable identifier for the filtered view.
//!
//! # Architecture
//!
//! - [`registry`] - Per-kind field descriptors, loaded from embedded JSON
//! - [`model`] - Raw filter blocks, typed clauses, canonical form
//! - [`planner`] - Server/client split and `X-Filter` encoding
//! - [`predicate`] - Compiled client residual
//! - [`executor`] - Sequential pagination and local ordering
//! - [`identity`] - SHA-256 synthetic identifier
//! - [`cancel`] - Cancellation and deadlines for in-flight reads
//! - [`error`] - Error kinds and diagnostics
//!
//! # Example
//!
//! ```ignore
//! use linode_query::filter::{get_kind, plan, FilterExpression, PlannerOptions, RawFilter, SortDirective};
//!
//! let kind = get_kind("instances").unwrap();
//! let expr = FilterExpression::parse(&[RawFilter::new("label", ["web-1"])], kind)?;
//! let planned = plan(&expr, &SortDirective::default(), kind, &PlannerOptions::default())?;
//! assert_eq!(planned.server_filter.as_deref(), Some(r#"{"label":"web-1"}"#));
//! ```

pub mod cancel;
pub mod error;
pub mod executor;
pub mod identity;
pub mod model;
pub mod planner;
pub mod predicate;
pub mod registry;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use error::{Diagnostic, Diagnostics, FilterError, Severity};
pub use executor::{execute, sort_records};
pub use identity::identity;
pub use model::{
    Comparator, FilterClause, FilterExpression, MatchMode, RawFilter, Scalar, SortDirective,
    SortOrder,
};
pub use planner::{
    plan, OrderSpec, PlannedQuery, PlannerOptions, SortPlacement, DEFAULT_MAX_FILTER_LEN,
};
pub use predicate::ClientPredicate;
pub use registry::{
    get_all_kind_keys, get_kind, get_registry, AttributeDef, FieldDescriptor, FieldType, KindDef,
    KindRegistry,
};

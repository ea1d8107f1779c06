//! linode-query
//!
//! Filter-and-query engine for Linode list data sources: typed filter
//! parsing, server/client pushdown planning, paginated execution with stable
//! ordering, and deterministic identifiers for filtered views.

pub mod config;
pub mod datasource;
pub mod filter;
pub mod linode;
pub mod manifest;

pub use datasource::{DataSource, QuerySettings, ReadRequest, ReadState};
pub use filter::{CancelSignal, Diagnostic, Diagnostics, FilterError};
pub use linode::{LinodeClient, ListApi};

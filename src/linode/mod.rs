//! Linode API interaction module
//!
//! The query engine talks to the Linode v4 API through one operation: fetch
//! a page of a list endpoint, optionally filtered by an `X-Filter` predicate.
//!
//! # Module Structure
//!
//! - [`list`] - The [`ListApi`] seam, paging types and [`ApiError`]
//! - [`client`] - [`LinodeClient`], the HTTP implementation of [`ListApi`]
//! - [`http`] - reqwest wrapper and status hints

pub mod client;
pub mod http;
pub mod list;

pub use client::{LinodeClient, DEFAULT_API_URL};
pub use http::status_hint;
pub use list::{
    clamp_page_size, ApiError, ListApi, ListOptions, ListPage, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE,
    MIN_PAGE_SIZE,
};

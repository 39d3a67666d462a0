//! # ContentKit Query
//!
//! Request-building types for ContentKit.
//!
//! This crate provides:
//! - [`Predicate`], the serializable filter tree sent as the `query` parameter
//! - [`Query`], a fluent builder over a named content type
//! - [`QuerySpec`], the immutable snapshot a builder hands to the client
//! - [`Projection`], `only` / `except` / reference-inclusion lists
//!
//! This is a pure request-building crate with no I/O operations.
//!
//! ## Example
//!
//! ```rust
//! use contentkit_query::Query;
//! use serde_json::json;
//!
//! let query = Query::new("product")
//!     .or(vec![
//!         Query::new("product").less_than("price", 90),
//!         Query::new("product").contained_in("discount", [20, 45]),
//!     ]);
//!
//! assert_eq!(
//!     query.query_document(),
//!     json!({"query": {"$or": [{"price": {"$lt": 90}}, {"discount": {"$in": [20, 45]}}]}})
//! );
//! ```
//!
//! ## Fail-slow validation
//!
//! Builder methods never fail. An invalid argument (empty key, `null`
//! value, empty combinator list) is recorded on the builder and surfaces
//! as a [`QueryError`] when the builder is snapshotted for execution.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod predicate;
mod projection;
mod query;

pub use error::{QueryError, QueryResult};
pub use predicate::{Condition, Operator, Predicate};
pub use projection::{Projection, BASE_FIELDS};
pub use query::{Query, QuerySpec, SortOrder};

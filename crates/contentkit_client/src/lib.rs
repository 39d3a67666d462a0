//! # ContentKit Client
//!
//! Cache-policy aware content retrieval and incremental sync.
//!
//! This crate provides:
//! - [`Stack`], the entry point that executes requests and sync sessions
//! - [`CachePolicy`] and the [`CachePolicyOrchestrator`] that applies it
//! - [`ResultDispatcher`], which tags every [`Delivery`] with its [`Provenance`]
//! - [`SyncProtocol`], a resumable pager over the delta feed
//! - [`Transport`], the seam to the HTTP layer, and [`MockTransport`] for tests
//!
//! ## Delivery contract
//!
//! Every request delivers exactly once, except
//! [`CachePolicy::CacheThenNetwork`] with a cache record present, which
//! delivers the cache result and then the network result, in that order.
//! Errors use the same callback as successes.
//!
//! ## Example
//!
//! ```rust,no_run
//! use contentkit_client::{CachePolicy, MockTransport, Stack, StackConfig, SyncRequest};
//! use contentkit_query::Query;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> contentkit_client::ContentResult<()> {
//! let config = StackConfig::new("blt123", "cs456", "production")
//!     .with_cache_dir("/var/cache/contentkit")
//!     .with_max_cache_age(Duration::from_secs(300));
//! let stack = Stack::builder(config)
//!     .with_transport(Arc::new(MockTransport::new()))
//!     .build()?;
//!
//! let query = Query::new("product").less_than("price", 90).limit(8);
//! stack.execute(query, CachePolicy::CacheThenNetwork, |delivery| {
//!     println!("{:?}: {:?}", delivery.provenance, delivery.payload().map(|r| r.entries.len()));
//! });
//!
//! let session = stack.sync(SyncRequest::Init, |delivery| {
//!     if let Some(page) = delivery.payload() {
//!         println!("{} changed items", page.items.len());
//!     }
//! });
//! let cursor = session.finished().await;
//! # let _ = cursor;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cancel;
mod config;
mod connectivity;
mod dispatcher;
mod error;
mod orchestrator;
mod policy;
mod request;
mod stack;
mod sync;
mod transport;

pub use cancel::{CancellationRegistry, RequestTag, Ticket};
pub use config::{
    Region, StackConfig, ACCESS_TOKEN_HEADER, API_KEY_HEADER, ENVIRONMENT_HEADER, REQUIRED_HEADERS,
};
pub use connectivity::{ConnectivityProvider, StaticConnectivity};
pub use dispatcher::{Delivery, Provenance, ResultDispatcher};
pub use error::{ContentError, ContentResult, ErrorKind, DEFAULT_ERROR_MESSAGE};
pub use orchestrator::CachePolicyOrchestrator;
pub use policy::CachePolicy;
pub use request::{
    validate_headers, AssetLibraryRequest, AssetList, AssetRequest, ContentRequest,
    ContentTypeList, ContentTypesRequest, EntryRequest, PreparedRequest, QueryResponse,
};
pub use stack::{RequestHandle, Stack, StackBuilder};
pub use sync::{
    PublishType, SyncCursor, SyncFilter, SyncHandle, SyncPage, SyncProtocol, SyncRequest,
    SyncState,
};
pub use transport::{Method, MockTransport, Transport, TransportFailure, TransportRequest};

// Re-exported so callers need only this crate for the common types.
pub use contentkit_cache::{CacheStore, SweepReport};
pub use contentkit_query::{Query, QuerySpec};

//! Cache-policy orchestration.

use crate::config::StackConfig;
use crate::connectivity::ConnectivityProvider;
use crate::dispatcher::{Delivery, Provenance, ResultDispatcher};
use crate::error::{ContentError, ContentResult};
use crate::policy::CachePolicy;
use crate::request::{ContentRequest, PreparedRequest};
use crate::transport::{Transport, TransportRequest};
use contentkit_cache::{CacheRecord, CacheStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Performs one network round-trip, checking connectivity first.
pub(crate) async fn fetch(
    transport: Arc<dyn Transport>,
    connectivity: Arc<dyn ConnectivityProvider>,
    request: TransportRequest,
) -> ContentResult<Value> {
    if !connectivity.is_connected() {
        return Err(ContentError::NoConnectivity);
    }
    transport
        .send(&request)
        .await
        .map_err(|failure| ContentError::from_response(failure.status, &failure.body))
}

/// Resolves requests through a [`CachePolicy`].
///
/// Each call to [`CachePolicyOrchestrator::run`] handles one request:
///
/// | Policy | Behavior |
/// |---|---|
/// | `IgnoreCache` | network; no cache write |
/// | `NetworkOnly` | network; cache write on success |
/// | `CacheOnly` | fresh cache record or `NotInCache`; never the network |
/// | `CacheElseNetwork` | fresh cache record, else network with cache write |
/// | `NetworkElseCache` | network while connected, else `CacheOnly` |
/// | `CacheThenNetwork` | any cache record first, then network with cache write |
///
/// Every outcome, errors included, goes through the dispatcher.
pub struct CachePolicyOrchestrator {
    transport: Arc<dyn Transport>,
    cache: Arc<CacheStore>,
    connectivity: Arc<dyn ConnectivityProvider>,
    max_cache_age: Duration,
}

impl CachePolicyOrchestrator {
    /// Creates an orchestrator. Records count as fresh up to
    /// `max_cache_age`; zero means never.
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<CacheStore>,
        connectivity: Arc<dyn ConnectivityProvider>,
        max_cache_age: Duration,
    ) -> Self {
        Self {
            transport,
            cache,
            connectivity,
            max_cache_age,
        }
    }

    /// Returns the cache store.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Returns the transport.
    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// Returns the connectivity provider.
    pub fn connectivity(&self) -> &Arc<dyn ConnectivityProvider> {
        &self.connectivity
    }

    /// Runs `request` under `policy`, delivering through `dispatcher`.
    pub async fn run<R: ContentRequest>(
        &self,
        config: &StackConfig,
        request: &R,
        policy: CachePolicy,
        dispatcher: &mut ResultDispatcher<R::Output>,
    ) {
        let prepared = match PreparedRequest::build(config, request) {
            Ok(prepared) => prepared,
            Err(e) => {
                debug!(policy = %policy, error = %e, "request rejected before dispatch");
                dispatcher.deliver(Delivery::failed(Provenance::Unknown, e));
                return;
            }
        };
        debug!(key = %prepared.key, policy = %policy, tag = prepared.tag.as_str(), "dispatching request");

        match policy {
            CachePolicy::IgnoreCache | CachePolicy::NetworkOnly => {
                let delivery = self.network(request, &prepared, policy.writes_cache()).await;
                dispatcher.deliver(delivery);
            }
            CachePolicy::CacheOnly => {
                dispatcher.deliver(self.cache_only(request, &prepared).await);
            }
            CachePolicy::CacheElseNetwork => match self.cached(request, &prepared, true).await {
                Some(output) => {
                    debug!(key = %prepared.key, "serving fresh cache record");
                    dispatcher.deliver(Delivery::new(Provenance::Cache, Ok(output)));
                }
                None => {
                    let delivery = self.network(request, &prepared, true).await;
                    dispatcher.deliver(delivery);
                }
            },
            CachePolicy::NetworkElseCache => {
                if self.connectivity.is_connected() {
                    let delivery = self.network(request, &prepared, true).await;
                    dispatcher.deliver(delivery);
                } else {
                    debug!(key = %prepared.key, "offline, falling back to cache");
                    dispatcher.deliver(self.cache_only(request, &prepared).await);
                }
            }
            CachePolicy::CacheThenNetwork => {
                // The network leg starts before the cache is read; the
                // cache result is still delivered first.
                let network = tokio::spawn(fetch(
                    Arc::clone(&self.transport),
                    Arc::clone(&self.connectivity),
                    prepared.transport_request(),
                ));
                if let Some(output) = self.cached(request, &prepared, false).await {
                    debug!(key = %prepared.key, "delivering cache record ahead of network");
                    dispatcher.deliver(Delivery::new(Provenance::Cache, Ok(output)));
                }
                let outcome = network
                    .await
                    .unwrap_or_else(|e| Err(ContentError::Internal(e.to_string())));
                dispatcher.deliver(self.complete(request, &prepared, outcome, true).await);
            }
        }
    }

    async fn network<R: ContentRequest>(
        &self,
        request: &R,
        prepared: &PreparedRequest,
        write_cache: bool,
    ) -> Delivery<R::Output> {
        let outcome = fetch(
            Arc::clone(&self.transport),
            Arc::clone(&self.connectivity),
            prepared.transport_request(),
        )
        .await;
        self.complete(request, prepared, outcome, write_cache).await
    }

    /// Turns a network outcome into a delivery, writing the cache when the
    /// body parsed and `write_cache` is set.
    async fn complete<R: ContentRequest>(
        &self,
        request: &R,
        prepared: &PreparedRequest,
        outcome: ContentResult<Value>,
        write_cache: bool,
    ) -> Delivery<R::Output> {
        let body = match outcome {
            Ok(body) => body,
            Err(e) => return Delivery::failed(Provenance::Network, e),
        };
        let parsed = request.parse(&body);
        let cache_error = if write_cache && parsed.is_ok() {
            self.write_cache(prepared, body).await
        } else {
            None
        };
        Delivery::new(Provenance::Network, parsed).with_cache_error(cache_error)
    }

    async fn cache_only<R: ContentRequest>(
        &self,
        request: &R,
        prepared: &PreparedRequest,
    ) -> Delivery<R::Output> {
        match self.cached(request, prepared, true).await {
            Some(output) => {
                debug!(key = %prepared.key, "cache hit");
                Delivery::new(Provenance::Cache, Ok(output))
            }
            None => Delivery::failed(Provenance::Cache, ContentError::NotInCache),
        }
    }

    /// Reads and parses the cached response for `prepared`.
    ///
    /// Missing, unreadable and unparseable records are misses, and so are
    /// stale ones when `fresh_only` is set.
    async fn cached<R: ContentRequest>(
        &self,
        request: &R,
        prepared: &PreparedRequest,
        fresh_only: bool,
    ) -> Option<R::Output> {
        let Some(record) = self.read_cache(prepared).await else {
            debug!(key = %prepared.key, "cache miss");
            return None;
        };
        if fresh_only && !self.cache.is_fresh(&record, self.max_cache_age) {
            debug!(key = %prepared.key, "cache record stale");
            return None;
        }
        match request.parse(&record.response) {
            Ok(output) => Some(output),
            Err(e) => {
                warn!(key = %prepared.key, error = %e, "cached response does not parse, treating as a miss");
                None
            }
        }
    }

    /// Reads the cache record for `prepared` on the blocking pool.
    /// Unreadable records count as misses.
    async fn read_cache(&self, prepared: &PreparedRequest) -> Option<CacheRecord> {
        let cache = Arc::clone(&self.cache);
        let key = prepared.key.clone();
        match tokio::task::spawn_blocking(move || cache.get(&key)).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                warn!(key = %prepared.key, error = %e, "treating unreadable cache record as a miss");
                None
            }
            Err(e) => {
                warn!(key = %prepared.key, error = %e, "cache read task failed");
                None
            }
        }
    }

    /// Writes `body` for `prepared` on the blocking pool. Returns the
    /// failure, if any, for the delivery's `cache_error`.
    async fn write_cache(&self, prepared: &PreparedRequest, body: Value) -> Option<ContentError> {
        let cache = Arc::clone(&self.cache);
        let key = prepared.key.clone();
        let echo = prepared.echo();
        let error = match tokio::task::spawn_blocking(move || cache.put(&key, &echo, &body)).await {
            Ok(Ok(())) => return None,
            Ok(Err(e)) => ContentError::Persistence(e),
            Err(e) => ContentError::Internal(e.to_string()),
        };
        warn!(key = %prepared.key, error = %error, "failed to write cache record");
        Some(error)
    }
}

impl std::fmt::Debug for CachePolicyOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachePolicyOrchestrator")
            .field("cache", &self.cache)
            .field("max_cache_age", &self.max_cache_age)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::StaticConnectivity;
    use crate::transport::MockTransport;
    use contentkit_cache::InMemoryBackend;
    use contentkit_query::Query;
    use parking_lot::Mutex;
    use serde_json::json;

    struct Harness {
        transport: Arc<MockTransport>,
        connectivity: Arc<StaticConnectivity>,
        orchestrator: CachePolicyOrchestrator,
    }

    fn harness(max_age: Duration) -> Harness {
        let transport = Arc::new(MockTransport::new());
        let connectivity = Arc::new(StaticConnectivity::online());
        let orchestrator = CachePolicyOrchestrator::new(
            transport.clone(),
            Arc::new(CacheStore::new(InMemoryBackend::new())),
            connectivity.clone(),
            max_age,
        );
        Harness {
            transport,
            connectivity,
            orchestrator,
        }
    }

    type Seen = Arc<Mutex<Vec<(Provenance, ContentResult<usize>)>>>;

    fn collector() -> (ResultDispatcher<crate::request::QueryResponse>, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = ResultDispatcher::new(move |d: Delivery<crate::request::QueryResponse>| {
            sink.lock().push((d.provenance, d.result.map(|r| r.entries.len())));
        });
        (dispatcher, seen)
    }

    fn config() -> StackConfig {
        StackConfig::new("blt1", "cs2", "production")
    }

    #[tokio::test]
    async fn offline_network_attempt_reports_no_connectivity() {
        let h = harness(Duration::ZERO);
        h.connectivity.set_connected(false);
        let (mut dispatcher, seen) = collector();

        h.orchestrator
            .run(&config(), &Query::new("product"), CachePolicy::NetworkOnly, &mut dispatcher)
            .await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, Provenance::Network);
        assert!(matches!(seen[0].1, Err(ContentError::NoConnectivity)));
        assert_eq!(h.transport.request_count(), 0);
    }

    #[tokio::test]
    async fn transport_failure_relays_server_message() {
        let h = harness(Duration::ZERO);
        h.transport.push_err(
            422,
            json!({"error_message": "Bad filter", "error_code": 141, "errors": {"query": ["bad"]}}),
        );
        let seen = Arc::new(Mutex::new(None));
        let sink = Arc::clone(&seen);
        let mut dispatcher = ResultDispatcher::new(move |d: Delivery<crate::request::QueryResponse>| {
            *sink.lock() = d.result.err();
        });

        h.orchestrator
            .run(&config(), &Query::new("product"), CachePolicy::IgnoreCache, &mut dispatcher)
            .await;

        match seen.lock().take() {
            Some(ContentError::Transport { status, message, code, errors }) => {
                assert_eq!(status, 422);
                assert_eq!(message, "Bad filter");
                assert_eq!(code, Some(141));
                assert!(errors.is_some());
            }
            other => panic!("unexpected: {other:?}"),
        };
    }

    #[tokio::test]
    async fn undecodable_success_is_not_cached() {
        let h = harness(Duration::from_secs(60));
        h.transport.push_ok(json!({"unexpected": true}));
        let (mut dispatcher, seen) = collector();
        let query = Query::new("product");

        h.orchestrator
            .run(&config(), &query, CachePolicy::NetworkOnly, &mut dispatcher)
            .await;

        assert!(matches!(seen.lock()[0].1, Err(ContentError::Decode(_))));
        let key = PreparedRequest::build(&config(), &query).unwrap().key;
        assert!(h.orchestrator.cache().get(&key).unwrap().is_none());
    }

    #[tokio::test]
    async fn unparseable_cache_record_counts_as_miss() {
        let h = harness(Duration::from_secs(60));
        let query = Query::new("product");
        let prepared = PreparedRequest::build(&config(), &query).unwrap();
        h.orchestrator
            .cache()
            .put(&prepared.key, &prepared.echo(), &json!({"unexpected": true}))
            .unwrap();

        let (mut dispatcher, seen) = collector();
        h.orchestrator
            .run(&config(), &query, CachePolicy::CacheOnly, &mut dispatcher)
            .await;
        assert_eq!(seen.lock()[0].0, Provenance::Cache);
        assert!(matches!(seen.lock()[0].1, Err(ContentError::NotInCache)));

        h.transport.push_ok(json!({"entries": [{"uid": "e1"}]}));
        let (mut dispatcher, seen) = collector();
        h.orchestrator
            .run(&config(), &query, CachePolicy::CacheElseNetwork, &mut dispatcher)
            .await;
        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, Provenance::Network);
        assert!(matches!(seen[0].1, Ok(1)));
        assert_eq!(h.transport.request_count(), 1);
    }
}

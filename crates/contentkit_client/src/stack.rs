//! Stack entry point.

use crate::cancel::{CancellationRegistry, RequestTag};
use crate::config::StackConfig;
use crate::connectivity::{ConnectivityProvider, StaticConnectivity};
use crate::dispatcher::{Delivery, ResultDispatcher};
use crate::error::{ContentError, ContentResult};
use crate::orchestrator::CachePolicyOrchestrator;
use crate::policy::CachePolicy;
use crate::request::ContentRequest;
use crate::sync::{SyncHandle, SyncPage, SyncProgress, SyncProtocol, SyncRequest};
use crate::transport::Transport;
use contentkit_cache::{CacheStore, InMemoryBackend, SweepReport};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Handle to one executing request.
#[derive(Debug)]
pub struct RequestHandle {
    tag: RequestTag,
    task: JoinHandle<()>,
}

impl RequestHandle {
    /// Returns the request's cancellation class.
    pub fn tag(&self) -> RequestTag {
        self.tag
    }

    /// Returns true once every delivery has been made.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits until every delivery has been made.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Internal`] if the request task panicked.
    pub async fn finished(self) -> ContentResult<()> {
        self.task
            .await
            .map_err(|e| ContentError::Internal(e.to_string()))
    }
}

/// Builder for a [`Stack`].
pub struct StackBuilder {
    config: StackConfig,
    transport: Option<Arc<dyn Transport>>,
    connectivity: Option<Arc<dyn ConnectivityProvider>>,
    cache: Option<Arc<CacheStore>>,
    runtime: Option<Handle>,
}

impl StackBuilder {
    /// Sets the transport. Required.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the connectivity provider. Defaults to always connected.
    pub fn with_connectivity(mut self, connectivity: Arc<dyn ConnectivityProvider>) -> Self {
        self.connectivity = Some(connectivity);
        self
    }

    /// Uses an existing cache store instead of one built from the
    /// configuration.
    pub fn with_cache(mut self, cache: Arc<CacheStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Runs request tasks on `runtime`. Defaults to the current runtime.
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Builds the stack.
    ///
    /// Without an explicit cache, responses are cached under the
    /// configured cache directory, or in memory if there is none.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::InvalidConfig`] if no transport was set or
    /// no runtime is available, or a persistence error if the cache
    /// directory cannot be created.
    pub fn build(self) -> ContentResult<Stack> {
        let transport = self
            .transport
            .ok_or_else(|| ContentError::InvalidConfig("no transport configured".into()))?;
        let connectivity = self
            .connectivity
            .unwrap_or_else(|| Arc::new(StaticConnectivity::online()));
        let cache = match (self.cache, &self.config.cache_dir) {
            (Some(cache), _) => cache,
            (None, Some(dir)) => Arc::new(CacheStore::open(dir)?),
            (None, None) => Arc::new(CacheStore::new(InMemoryBackend::new())),
        };
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current()
                .map_err(|e| ContentError::InvalidConfig(format!("no async runtime: {e}")))?,
        };

        let max_cache_age_ms =
            u64::try_from(self.config.max_cache_age.as_millis()).unwrap_or(u64::MAX);
        info!(
            host = self.config.host(),
            environment = %self.config.environment,
            max_cache_age_ms,
            "content stack ready"
        );

        Ok(Stack {
            orchestrator: Arc::new(CachePolicyOrchestrator::new(
                Arc::clone(&transport),
                cache,
                Arc::clone(&connectivity),
                self.config.max_cache_age,
            )),
            sync: Arc::new(SyncProtocol::new(transport, connectivity)),
            config: Arc::new(self.config),
            cancellation: Arc::new(CancellationRegistry::new()),
            runtime,
        })
    }
}

/// A configured connection to one content stack.
///
/// Every request method returns immediately. Results, errors included,
/// arrive later through the supplied callback: once per request, twice
/// for [`CachePolicy::CacheThenNetwork`] with a cache record present, and
/// once per page for sync sessions.
///
/// ```rust,no_run
/// use contentkit_client::{CachePolicy, MockTransport, Stack, StackConfig};
/// use contentkit_query::Query;
/// use std::sync::Arc;
///
/// # async fn demo() -> contentkit_client::ContentResult<()> {
/// let stack = Stack::builder(StackConfig::new("blt123", "cs456", "production"))
///     .with_transport(Arc::new(MockTransport::new()))
///     .build()?;
///
/// let query = Query::new("product").where_eq("title", "Women");
/// stack
///     .execute(query, CachePolicy::NetworkOnly, |delivery| {
///         if let Some(result) = delivery.payload() {
///             println!("{} entries", result.entries.len());
///         }
///     })
///     .finished()
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Stack {
    config: Arc<StackConfig>,
    orchestrator: Arc<CachePolicyOrchestrator>,
    sync: Arc<SyncProtocol>,
    cancellation: Arc<CancellationRegistry>,
    runtime: Handle,
}

impl Stack {
    /// Starts building a stack for `config`.
    pub fn builder(config: StackConfig) -> StackBuilder {
        StackBuilder {
            config,
            transport: None,
            connectivity: None,
            cache: None,
            runtime: None,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    /// Returns the response cache.
    pub fn cache(&self) -> &Arc<CacheStore> {
        self.orchestrator.cache()
    }

    /// Executes `request` under `policy`.
    pub fn execute<R, F>(&self, request: R, policy: CachePolicy, callback: F) -> RequestHandle
    where
        R: ContentRequest,
        F: FnMut(Delivery<R::Output>) + Send + 'static,
    {
        let tag = request.tag();
        let mut dispatcher =
            ResultDispatcher::new(callback).with_ticket(self.cancellation.ticket(tag));
        let orchestrator = Arc::clone(&self.orchestrator);
        let config = Arc::clone(&self.config);

        let task = self.runtime.spawn(async move {
            orchestrator
                .run(&config, &request, policy, &mut dispatcher)
                .await;
        });
        RequestHandle { tag, task }
    }

    /// Starts a sync session. `callback` receives every page.
    pub fn sync<F>(&self, request: SyncRequest, callback: F) -> SyncHandle
    where
        F: FnMut(Delivery<SyncPage>) + Send + 'static,
    {
        let mut dispatcher = ResultDispatcher::new(callback)
            .with_ticket(self.cancellation.ticket(RequestTag::Sync));
        let protocol = Arc::clone(&self.sync);
        let config = Arc::clone(&self.config);
        let progress = Arc::new(SyncProgress::default());
        let shared = Arc::clone(&progress);

        let task = self.runtime.spawn(async move {
            protocol
                .run_with_progress(&config, request, &mut dispatcher, &shared)
                .await
        });
        SyncHandle::new(progress, task)
    }

    /// Cancels every outstanding request with `tag`.
    ///
    /// Their callbacks receive nothing further. A cancelled sync session
    /// finishes the page in flight and stops.
    pub fn cancel(&self, tag: RequestTag) {
        debug!(tag = tag.as_str(), "cancelling requests");
        self.cancellation.cancel(tag);
    }

    /// Cancels every outstanding request.
    pub fn cancel_all(&self) {
        debug!("cancelling all requests");
        self.cancellation.cancel_all();
    }

    /// Removes cached responses older than the configured sweep horizon.
    ///
    /// # Errors
    ///
    /// Returns a persistence error if the cache cannot be swept.
    pub fn sweep_cache(&self) -> ContentResult<SweepReport> {
        Ok(self.cache().sweep(self.config.sweep_horizon)?)
    }
}

impl std::fmt::Debug for Stack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stack")
            .field("host", &self.config.host())
            .field("environment", &self.config.environment)
            .finish_non_exhaustive()
    }
}

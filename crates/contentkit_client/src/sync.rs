//! Incremental sync protocol.
//!
//! A sync session pages through the stack's delta feed. The first request
//! carries `init=true` and any filters. While the server answers with a
//! `pagination_token` the next page is requested automatically; a
//! `sync_token` ends the session and is the point a later session resumes
//! from. Every page is delivered to the same callback. Items are not
//! accumulated across pages.

use crate::cancel::RequestTag;
use crate::config::StackConfig;
use crate::connectivity::ConnectivityProvider;
use crate::dispatcher::{Delivery, Provenance, ResultDispatcher};
use crate::error::{ContentError, ContentResult};
use crate::orchestrator::fetch;
use crate::request::{ContentRequest, PreparedRequest};
use crate::transport::Transport;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Kind of change to restrict a sync session to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishType {
    /// Entries published.
    EntryPublished,
    /// Entries unpublished.
    EntryUnpublished,
    /// Entries deleted.
    EntryDeleted,
    /// Assets published.
    AssetPublished,
    /// Assets unpublished.
    AssetUnpublished,
    /// Assets deleted.
    AssetDeleted,
    /// Content types deleted.
    ContentTypeDeleted,
}

impl PublishType {
    /// Returns the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishType::EntryPublished => "entry_published",
            PublishType::EntryUnpublished => "entry_unpublished",
            PublishType::EntryDeleted => "entry_deleted",
            PublishType::AssetPublished => "asset_published",
            PublishType::AssetUnpublished => "asset_unpublished",
            PublishType::AssetDeleted => "asset_deleted",
            PublishType::ContentTypeDeleted => "content_type_deleted",
        }
    }
}

/// Filters combined into one initial sync request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncFilter {
    /// Only changes to entries of this content type.
    pub content_type_uid: Option<String>,
    /// Only changes in this locale.
    pub locale: Option<String>,
    /// Only this kind of change.
    pub publish_type: Option<PublishType>,
    /// Only changes at or after this time.
    pub start_from: Option<DateTime<Utc>>,
}

impl SyncFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to one content type.
    pub fn with_content_type(mut self, uid: impl Into<String>) -> Self {
        self.content_type_uid = Some(uid.into());
        self
    }

    /// Restricts to one locale.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Restricts to one kind of change.
    pub fn with_publish_type(mut self, publish_type: PublishType) -> Self {
        self.publish_type = Some(publish_type);
        self
    }

    /// Restricts to changes from `start` on.
    pub fn with_start_from(mut self, start: DateTime<Utc>) -> Self {
        self.start_from = Some(start);
        self
    }

    fn apply(&self, params: &mut Map<String, Value>) {
        if let Some(uid) = &self.content_type_uid {
            params.insert("content_type_uid".into(), Value::String(uid.clone()));
        }
        if let Some(locale) = &self.locale {
            params.insert("locale".into(), Value::String(locale.clone()));
        }
        if let Some(publish_type) = self.publish_type {
            params.insert("type".into(), Value::String(publish_type.as_str().into()));
        }
        if let Some(start) = self.start_from {
            params.insert("start_from".into(), Value::String(format_start(start)));
        }
    }
}

fn format_start(start: DateTime<Utc>) -> String {
    start.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// How a sync session starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncRequest {
    /// Full resync of everything published.
    Init,
    /// Changes from a point in time on.
    FromDate(DateTime<Utc>),
    /// Continue an interrupted session from a pagination token.
    PaginationToken(String),
    /// Pull the delta since a completed session.
    SyncToken(String),
    /// Full resync of one content type.
    ContentType(String),
    /// Full resync of one locale.
    Locale(String),
    /// Full resync of one kind of change.
    PublishType(PublishType),
    /// Full resync under several filters at once.
    Composite(SyncFilter),
}

impl SyncRequest {
    /// Returns the request that continues from `cursor`.
    ///
    /// A pending pagination token takes precedence over a sync token.
    pub fn resume(cursor: &SyncCursor) -> Self {
        match (&cursor.pagination_token, &cursor.sync_token) {
            (Some(token), _) => SyncRequest::PaginationToken(token.clone()),
            (None, Some(token)) => SyncRequest::SyncToken(token.clone()),
            (None, None) => SyncRequest::Init,
        }
    }

    /// Returns the parameters of the first request of the session.
    pub fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        let filter = match self {
            SyncRequest::PaginationToken(token) => {
                params.insert("pagination_token".into(), Value::String(token.clone()));
                return params;
            }
            SyncRequest::SyncToken(token) => {
                params.insert("sync_token".into(), Value::String(token.clone()));
                return params;
            }
            SyncRequest::Init => SyncFilter::new(),
            SyncRequest::FromDate(start) => SyncFilter::new().with_start_from(*start),
            SyncRequest::ContentType(uid) => SyncFilter::new().with_content_type(uid.clone()),
            SyncRequest::Locale(locale) => SyncFilter::new().with_locale(locale.clone()),
            SyncRequest::PublishType(kind) => SyncFilter::new().with_publish_type(*kind),
            SyncRequest::Composite(filter) => filter.clone(),
        };
        params.insert("init".into(), Value::Bool(true));
        filter.apply(&mut params);
        params
    }
}

/// Position of a sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// No page received yet.
    #[default]
    Init,
    /// More pages remain.
    Paging,
    /// The feed is exhausted; the sync token is the resumption point.
    Terminal,
}

/// Resumable state of a sync session.
///
/// At most one of `pagination_token` and `sync_token` is set once a page
/// has been received.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    /// Session position.
    pub state: SyncState,
    /// Token to pull the next delta with, once terminal.
    pub sync_token: Option<String>,
    /// Token of the next page, while paging.
    pub pagination_token: Option<String>,
    /// Items skipped before the last page.
    pub skip: u64,
    /// Page size of the last page.
    pub limit: u64,
    /// Total items in the session.
    pub total_count: u64,
    /// Checkpoint id returned with the terminal page.
    pub sequential_token: Option<String>,
}

impl SyncCursor {
    /// Returns true once the feed is exhausted.
    pub fn is_terminal(&self) -> bool {
        self.state == SyncState::Terminal
    }

    /// Advances the cursor past `response`.
    ///
    /// # Errors
    ///
    /// Returns [`ContentError::Decode`] if the response carries neither
    /// token; the cursor is left unchanged.
    fn advance(&mut self, response: &SyncResponse) -> ContentResult<()> {
        match (&response.pagination_token, &response.sync_token) {
            (Some(token), _) => {
                self.state = SyncState::Paging;
                self.pagination_token = Some(token.clone());
                self.sync_token = None;
            }
            (None, Some(token)) => {
                self.state = SyncState::Terminal;
                self.sync_token = Some(token.clone());
                self.pagination_token = None;
            }
            (None, None) => {
                return Err(ContentError::Decode(
                    "sync response has neither pagination_token nor sync_token".into(),
                ))
            }
        }
        self.skip = response.skip.unwrap_or(self.skip);
        self.limit = response.limit.unwrap_or(self.limit);
        self.total_count = response.total_count.unwrap_or(self.total_count);
        if response.sequential_token.is_some() {
            self.sequential_token = response.sequential_token.clone();
        }
        Ok(())
    }
}

/// One delivered page of a sync session.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncPage {
    /// Changed items in this page.
    pub items: Vec<Value>,
    /// Cursor after this page.
    pub cursor: SyncCursor,
}

#[derive(Debug, Deserialize)]
struct SyncResponse {
    items: Vec<Value>,
    #[serde(default)]
    pagination_token: Option<String>,
    #[serde(default)]
    sync_token: Option<String>,
    #[serde(default)]
    skip: Option<u64>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    total_count: Option<u64>,
    #[serde(default)]
    sequential_token: Option<String>,
}

/// One page request of a session.
struct SyncPageRequest {
    params: Map<String, Value>,
}

impl ContentRequest for SyncPageRequest {
    type Output = SyncResponse;

    fn tag(&self) -> RequestTag {
        RequestTag::Sync
    }

    fn endpoint(&self) -> ContentResult<String> {
        Ok("stacks/sync".into())
    }

    fn params(&self) -> ContentResult<Map<String, Value>> {
        Ok(self.params.clone())
    }

    fn parse(&self, body: &Value) -> ContentResult<SyncResponse> {
        SyncResponse::deserialize(body).map_err(|e| ContentError::Decode(e.to_string()))
    }
}

/// Progress shared between a running session and its handle.
#[derive(Debug, Default)]
pub(crate) struct SyncProgress {
    cursor: RwLock<Option<SyncCursor>>,
    pages: AtomicUsize,
}

impl SyncProgress {
    fn record(&self, cursor: &SyncCursor) {
        *self.cursor.write() = Some(cursor.clone());
        self.pages.fetch_add(1, Ordering::SeqCst);
    }
}

/// Drives sync sessions against a transport.
pub struct SyncProtocol {
    transport: Arc<dyn Transport>,
    connectivity: Arc<dyn ConnectivityProvider>,
}

impl SyncProtocol {
    /// Creates a protocol driver.
    pub fn new(transport: Arc<dyn Transport>, connectivity: Arc<dyn ConnectivityProvider>) -> Self {
        Self {
            transport,
            connectivity,
        }
    }

    /// Runs a session to its end, delivering every page.
    ///
    /// Stops at the terminal page, at the first failure, or after the
    /// page in flight when the session is cancelled. Returns the last
    /// cursor observed, if any page arrived.
    pub async fn run(
        &self,
        config: &StackConfig,
        request: SyncRequest,
        dispatcher: &mut ResultDispatcher<SyncPage>,
    ) -> Option<SyncCursor> {
        self.run_with_progress(config, request, dispatcher, &SyncProgress::default())
            .await
    }

    pub(crate) async fn run_with_progress(
        &self,
        config: &StackConfig,
        request: SyncRequest,
        dispatcher: &mut ResultDispatcher<SyncPage>,
        progress: &SyncProgress,
    ) -> Option<SyncCursor> {
        let mut cursor = SyncCursor::default();
        let mut observed = None;
        let mut page_request = SyncPageRequest {
            params: request.params(),
        };
        let mut page = 0usize;

        loop {
            if dispatcher.is_cancelled() {
                debug!(page, "sync cancelled, not requesting further pages");
                break;
            }

            let prepared = match PreparedRequest::build(config, &page_request) {
                Ok(prepared) => prepared,
                Err(e) => {
                    dispatcher.deliver(Delivery::failed(Provenance::Unknown, e));
                    break;
                }
            };

            let body = fetch(
                Arc::clone(&self.transport),
                Arc::clone(&self.connectivity),
                prepared.transport_request(),
            )
            .await;
            let response = match body.and_then(|body| page_request.parse(&body)) {
                Ok(response) => response,
                Err(e) => {
                    warn!(page, error = %e, "sync page failed, aborting session");
                    dispatcher.deliver(Delivery::failed(Provenance::Network, e));
                    break;
                }
            };
            if let Err(e) = cursor.advance(&response) {
                warn!(page, error = %e, "sync page failed, aborting session");
                dispatcher.deliver(Delivery::failed(Provenance::Network, e));
                break;
            }

            page += 1;
            progress.record(&cursor);
            observed = Some(cursor.clone());
            debug!(
                page,
                items = response.items.len(),
                state = ?cursor.state,
                "sync page received"
            );
            dispatcher.deliver(Delivery::new(
                Provenance::Network,
                Ok(SyncPage {
                    items: response.items,
                    cursor: cursor.clone(),
                }),
            ));

            match &cursor.pagination_token {
                Some(token) if cursor.state == SyncState::Paging => {
                    let mut params = Map::new();
                    params.insert("pagination_token".into(), Value::String(token.clone()));
                    page_request = SyncPageRequest { params };
                }
                _ => {
                    info!(pages = page, total = cursor.total_count, "sync session complete");
                    break;
                }
            }
        }

        observed
    }
}

impl std::fmt::Debug for SyncProtocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncProtocol").finish_non_exhaustive()
    }
}

/// Handle to a running sync session.
#[derive(Debug)]
pub struct SyncHandle {
    progress: Arc<SyncProgress>,
    task: JoinHandle<Option<SyncCursor>>,
}

impl SyncHandle {
    pub(crate) fn new(progress: Arc<SyncProgress>, task: JoinHandle<Option<SyncCursor>>) -> Self {
        Self { progress, task }
    }

    /// Returns the cursor after the most recent page, if any.
    pub fn cursor(&self) -> Option<SyncCursor> {
        self.progress.cursor.read().clone()
    }

    /// Returns the number of pages received so far.
    pub fn pages_delivered(&self) -> usize {
        self.progress.pages.load(Ordering::SeqCst)
    }

    /// Returns true once the session has stopped.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the session to stop and returns its last cursor.
    pub async fn finished(self) -> Option<SyncCursor> {
        match self.task.await {
            Ok(cursor) => cursor,
            Err(e) => {
                warn!(error = %e, "sync task ended abnormally");
                self.progress.cursor.read().clone()
            }
        }
    }
}

//! Sync sessions through the public stack API.

use chrono::{TimeZone, Utc};
use contentkit_client::{
    ContentError, Delivery, MockTransport, Provenance, RequestTag, Stack, StackConfig,
    StaticConnectivity, SyncCursor, SyncPage, SyncRequest, SyncState,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

fn items(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| json!({"type": "entry_published", "content_type_uid": "product", "data": {"uid": format!("e{i}")}}))
        .collect()
}

struct Fixture {
    stack: Arc<Stack>,
    transport: Arc<MockTransport>,
    connectivity: Arc<StaticConnectivity>,
}

fn fixture() -> Fixture {
    let transport = Arc::new(MockTransport::new());
    let connectivity = Arc::new(StaticConnectivity::online());
    let stack = Stack::builder(StackConfig::new("blt123", "cs456", "production"))
        .with_transport(transport.clone())
        .with_connectivity(connectivity.clone())
        .build()
        .unwrap();
    Fixture {
        stack: Arc::new(stack),
        transport,
        connectivity,
    }
}

type Pages = Arc<Mutex<Vec<Delivery<SyncPage>>>>;

async fn sync(fx: &Fixture, request: SyncRequest) -> (Vec<Delivery<SyncPage>>, Option<SyncCursor>) {
    let pages: Pages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pages);
    let cursor = fx
        .stack
        .sync(request, move |d| sink.lock().push(d))
        .finished()
        .await;
    let mut pages = pages.lock();
    (std::mem::take(&mut *pages), cursor)
}

#[tokio::test]
async fn init_pages_until_sync_token() {
    let fx = fixture();
    fx.transport
        .push_ok(json!({"items": items(7), "pagination_token": "tok1", "skip": 0, "limit": 7, "total_count": 12}));
    fx.transport
        .push_ok(json!({"items": items(5), "sync_token": "tok2", "skip": 7, "limit": 7, "total_count": 12}));

    let (pages, cursor) = sync(&fx, SyncRequest::Init).await;

    assert_eq!(pages.len(), 2);
    let first = pages[0].payload().unwrap();
    let second = pages[1].payload().unwrap();
    assert_eq!(first.items.len(), 7);
    assert_eq!(first.cursor.state, SyncState::Paging);
    assert_eq!(first.cursor.pagination_token.as_deref(), Some("tok1"));
    assert_eq!(second.items.len(), 5);
    assert!(pages.iter().all(|p| p.provenance == Provenance::Network));

    let cursor = cursor.unwrap();
    assert_eq!(cursor.state, SyncState::Terminal);
    assert_eq!(cursor.sync_token.as_deref(), Some("tok2"));
    assert!(cursor.pagination_token.is_none());
    assert_eq!(cursor.skip, 7);
    assert_eq!(cursor.total_count, 12);

    let requests = fx.transport.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].url.ends_with("/v3/stacks/sync"));
    assert_eq!(requests[0].params["init"], json!(true));
    assert_eq!(requests[0].params["environment"], json!("production"));
    assert_eq!(requests[1].params["pagination_token"], json!("tok1"));
    assert_eq!(requests[1].params["environment"], json!("production"));
    assert!(!requests[1].params.contains_key("init"));
}

#[tokio::test]
async fn sync_token_response_ends_session() {
    let fx = fixture();
    fx.transport.push_ok(json!({"items": [], "sync_token": "tok9"}));
    fx.transport.push_ok(json!({"items": items(1), "sync_token": "unused"}));

    let (pages, cursor) = sync(&fx, SyncRequest::SyncToken("tok2".into())).await;

    assert_eq!(pages.len(), 1);
    assert_eq!(fx.transport.request_count(), 1);
    assert_eq!(fx.transport.pending_replies(), 1);
    assert_eq!(fx.transport.requests()[0].params["sync_token"], json!("tok2"));
    assert_eq!(cursor.unwrap().sync_token.as_deref(), Some("tok9"));
}

#[tokio::test]
async fn resume_from_interrupted_cursor() {
    let fx = fixture();
    fx.transport.push_ok(json!({"items": items(3), "pagination_token": "tok1"}));
    fx.transport.push_err(503, json!({"error_message": "Service unavailable"}));

    let (pages, cursor) = sync(&fx, SyncRequest::Init).await;
    assert_eq!(pages.len(), 2);
    assert!(matches!(
        pages[1].error(),
        Some(ContentError::Transport { status: 503, .. })
    ));
    let cursor = cursor.unwrap();
    assert_eq!(cursor.state, SyncState::Paging);

    fx.transport.push_ok(json!({"items": items(2), "sync_token": "tok2"}));
    let (pages, cursor) = sync(&fx, SyncRequest::resume(&cursor)).await;
    assert_eq!(pages.len(), 1);
    assert_eq!(fx.transport.requests()[2].params["pagination_token"], json!("tok1"));
    assert!(cursor.unwrap().is_terminal());
}

#[tokio::test]
async fn tokenless_page_aborts_session() {
    let fx = fixture();
    fx.transport.push_ok(json!({"items": items(2)}));

    let (pages, cursor) = sync(&fx, SyncRequest::Init).await;

    assert_eq!(pages.len(), 1);
    assert!(matches!(pages[0].error(), Some(ContentError::Decode(_))));
    assert!(cursor.is_none());
}

#[tokio::test]
async fn filtered_initial_requests() {
    let fx = fixture();
    let start = Utc.with_ymd_and_hms(2024, 1, 15, 8, 30, 0).unwrap();
    fx.transport.push_ok(json!({"items": [], "sync_token": "a"}));
    fx.transport.push_ok(json!({"items": [], "sync_token": "b"}));

    sync(&fx, SyncRequest::FromDate(start)).await;
    sync(&fx, SyncRequest::ContentType("product".into())).await;

    let requests = fx.transport.requests();
    assert_eq!(requests[0].params["start_from"], json!("2024-01-15T08:30:00Z"));
    assert_eq!(requests[1].params["content_type_uid"], json!("product"));
    assert_eq!(requests[1].params["init"], json!(true));
}

#[tokio::test]
async fn offline_sync_reports_no_connectivity() {
    let fx = fixture();
    fx.connectivity.set_connected(false);

    let (pages, cursor) = sync(&fx, SyncRequest::Init).await;

    assert_eq!(pages.len(), 1);
    assert!(matches!(pages[0].error(), Some(ContentError::NoConnectivity)));
    assert!(cursor.is_none());
    assert_eq!(fx.transport.request_count(), 0);
}

#[tokio::test]
async fn missing_credentials_fail_with_unknown_provenance() {
    let transport = Arc::new(MockTransport::new());
    let stack = Stack::builder(StackConfig::new("", "cs456", "production"))
        .with_transport(transport.clone())
        .build()
        .unwrap();
    let pages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pages);

    stack
        .sync(SyncRequest::Init, move |d: Delivery<SyncPage>| {
            sink.lock().push((d.provenance, d.error().map(ContentError::code)))
        })
        .finished()
        .await;

    assert_eq!(*pages.lock(), vec![(Provenance::Unknown, Some(1))]);
    assert_eq!(transport.request_count(), 0);
}

#[tokio::test]
async fn cancelled_session_stops_after_page_in_flight() {
    let fx = fixture();
    fx.transport.push_ok(json!({"items": items(7), "pagination_token": "tok1"}));
    fx.transport.push_ok(json!({"items": items(5), "sync_token": "tok2"}));

    let pages: Pages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&pages);
    let stack = Arc::clone(&fx.stack);
    let handle = fx.stack.sync(SyncRequest::Init, move |d| {
        sink.lock().push(d);
        stack.cancel(RequestTag::Sync);
    });
    let cursor = handle.finished().await.unwrap();

    assert_eq!(pages.lock().len(), 1);
    assert_eq!(fx.transport.request_count(), 1);
    assert_eq!(cursor.state, SyncState::Paging);
    assert_eq!(cursor.pagination_token.as_deref(), Some("tok1"));
}

#[tokio::test]
async fn handle_reports_progress() {
    let fx = fixture();
    fx.transport.push_ok_delayed(
        json!({"items": items(1), "pagination_token": "p1"}),
        Duration::from_millis(5),
    );
    fx.transport.push_ok_delayed(
        json!({"items": items(1), "pagination_token": "p2"}),
        Duration::from_millis(5),
    );
    fx.transport.push_ok(json!({"items": items(1), "sync_token": "s"}));

    let handle = fx.stack.sync(SyncRequest::Init, |_| {});
    assert!(handle.cursor().is_none());
    while !handle.is_finished() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    assert_eq!(handle.pages_delivered(), 3);
    assert_eq!(handle.cursor().unwrap().sync_token.as_deref(), Some("s"));
    assert!(handle.finished().await.unwrap().is_terminal());
}

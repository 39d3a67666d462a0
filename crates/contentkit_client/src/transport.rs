//! Transport layer abstraction for content requests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

/// HTTP method of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// `GET`
    Get,
}

impl Method {
    /// Returns the method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
        }
    }
}

/// One round-trip handed to a [`Transport`].
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    /// HTTP method.
    pub method: Method,
    /// Fully resolved URL, without query string.
    pub url: String,
    /// Parameter document; the transport decides how to encode it.
    pub params: Map<String, Value>,
    /// Merged request headers.
    pub headers: BTreeMap<String, String>,
}

/// A failed round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportFailure {
    /// HTTP status, or 0 when no response was received.
    pub status: u16,
    /// Error body, conventionally `{error_message, error_code, errors}`.
    pub body: Value,
}

impl TransportFailure {
    /// Creates a failure with a status and body.
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    /// Creates a failure for a request that never got a response.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            status: 0,
            body: json!({ "error_message": message.into() }),
        }
    }
}

/// Executes requests against the content delivery API.
///
/// Connection handling, TLS and socket-level retries belong to the
/// implementation. The client only needs a parsed response document on
/// success or a status plus error body on failure.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one round-trip.
    async fn send(&self, request: &TransportRequest) -> Result<Value, TransportFailure>;
}

#[derive(Debug, Clone)]
struct MockReply {
    result: Result<Value, TransportFailure>,
    delay: Option<Duration>,
}

/// A scripted transport for testing.
///
/// Replies are handed out in the order they were queued. Every request is
/// recorded. Once the queue is empty, requests fail with status 0.
#[derive(Debug, Default)]
pub struct MockTransport {
    replies: Mutex<VecDeque<MockReply>>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl MockTransport {
    /// Creates a transport with no queued replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply.
    pub fn push_ok(&self, body: Value) {
        self.push(Ok(body), None);
    }

    /// Queues a successful reply that arrives after `delay`.
    pub fn push_ok_delayed(&self, body: Value, delay: Duration) {
        self.push(Ok(body), Some(delay));
    }

    /// Queues a failed reply.
    pub fn push_err(&self, status: u16, body: Value) {
        self.push(Err(TransportFailure::new(status, body)), None);
    }

    fn push(&self, result: Result<Value, TransportFailure>, delay: Option<Duration>) {
        self.replies.lock().push_back(MockReply { result, delay });
    }

    /// Returns every request received so far.
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the number of replies not yet consumed.
    pub fn pending_replies(&self) -> usize {
        self.replies.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: &TransportRequest) -> Result<Value, TransportFailure> {
        self.requests.lock().push(request.clone());
        let reply = self.replies.lock().pop_front();
        let Some(reply) = reply else {
            return Err(TransportFailure::unreachable("no mock reply queued"));
        };
        if let Some(delay) = reply.delay {
            tokio::time::sleep(delay).await;
        }
        reply.result
    }
}

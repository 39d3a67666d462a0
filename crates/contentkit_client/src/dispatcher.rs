//! Delivery of results to caller callbacks.

use crate::cancel::Ticket;
use crate::error::{ContentError, ContentResult};
use tracing::debug;

/// Where a delivered result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// The network.
    Network,
    /// The local cache.
    Cache,
    /// Neither; the request failed before reaching either.
    Unknown,
}

/// One invocation of a caller callback.
#[derive(Debug)]
pub struct Delivery<T> {
    /// Source of the result.
    pub provenance: Provenance,
    /// The payload, or the error that replaced it.
    pub result: ContentResult<T>,
    /// A cache write failure that shadowed a successful network result.
    pub cache_error: Option<ContentError>,
}

impl<T> Delivery<T> {
    /// Creates a delivery with no secondary cache error.
    pub fn new(provenance: Provenance, result: ContentResult<T>) -> Self {
        Self {
            provenance,
            result,
            cache_error: None,
        }
    }

    /// Creates a failed delivery.
    pub fn failed(provenance: Provenance, error: ContentError) -> Self {
        Self::new(provenance, Err(error))
    }

    /// Attaches a cache write failure.
    pub fn with_cache_error(mut self, error: Option<ContentError>) -> Self {
        self.cache_error = error;
        self
    }

    /// Returns the payload if the delivery succeeded.
    pub fn payload(&self) -> Option<&T> {
        self.result.as_ref().ok()
    }

    /// Returns the error if the delivery failed.
    pub fn error(&self) -> Option<&ContentError> {
        self.result.as_ref().err()
    }

    /// Returns true if the delivery carries a payload.
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

type Callback<T> = Box<dyn FnMut(Delivery<T>) + Send>;

/// Routes results of one request to its callback.
///
/// Deliveries made after the request's tag was cancelled are dropped. A
/// cache-sourced delivery never follows a network-sourced one.
pub struct ResultDispatcher<T> {
    callback: Callback<T>,
    ticket: Option<Ticket>,
    delivered: usize,
    suppressed: usize,
    saw_network: bool,
}

impl<T> ResultDispatcher<T> {
    /// Creates a dispatcher around `callback`.
    pub fn new(callback: impl FnMut(Delivery<T>) + Send + 'static) -> Self {
        Self {
            callback: Box::new(callback),
            ticket: None,
            delivered: 0,
            suppressed: 0,
            saw_network: false,
        }
    }

    /// Suppresses deliveries once `ticket` is cancelled.
    pub fn with_ticket(mut self, ticket: Ticket) -> Self {
        self.ticket = Some(ticket);
        self
    }

    /// Returns true if the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.ticket.as_ref().is_some_and(Ticket::is_cancelled)
    }

    /// Hands `delivery` to the callback. Returns false if it was dropped
    /// because the request was cancelled.
    pub fn deliver(&mut self, delivery: Delivery<T>) -> bool {
        debug_assert!(
            !(self.saw_network && delivery.provenance == Provenance::Cache),
            "cache delivery after network delivery"
        );
        if delivery.provenance == Provenance::Network {
            self.saw_network = true;
        }

        if let Some(ticket) = self.ticket.as_ref().filter(|t| t.is_cancelled()) {
            self.suppressed += 1;
            debug!(
                tag = ticket.tag().as_str(),
                provenance = ?delivery.provenance,
                "delivery suppressed after cancellation"
            );
            return false;
        }

        self.delivered += 1;
        (self.callback)(delivery);
        true
    }

    /// Returns the number of deliveries made to the callback.
    pub fn delivered(&self) -> usize {
        self.delivered
    }

    /// Returns the number of deliveries dropped after cancellation.
    pub fn suppressed(&self) -> usize {
        self.suppressed
    }
}

impl<T> std::fmt::Debug for ResultDispatcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultDispatcher")
            .field("delivered", &self.delivered)
            .field("suppressed", &self.suppressed)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

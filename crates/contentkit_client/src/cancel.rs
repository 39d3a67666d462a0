//! Tag-based cancellation of outstanding requests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Class of request, used to cancel groups of outstanding requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestTag {
    /// Entry queries.
    Query,
    /// Single entry fetches.
    Entry,
    /// Single asset fetches.
    Asset,
    /// Asset listings.
    AssetLibrary,
    /// Content type listings.
    ContentType,
    /// Incremental sync chains.
    Sync,
}

impl RequestTag {
    /// Every tag.
    pub const ALL: [RequestTag; 6] = [
        RequestTag::Query,
        RequestTag::Entry,
        RequestTag::Asset,
        RequestTag::AssetLibrary,
        RequestTag::ContentType,
        RequestTag::Sync,
    ];

    fn index(self) -> usize {
        match self {
            RequestTag::Query => 0,
            RequestTag::Entry => 1,
            RequestTag::Asset => 2,
            RequestTag::AssetLibrary => 3,
            RequestTag::ContentType => 4,
            RequestTag::Sync => 5,
        }
    }

    /// Returns a short name for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestTag::Query => "query",
            RequestTag::Entry => "entry",
            RequestTag::Asset => "asset",
            RequestTag::AssetLibrary => "asset_library",
            RequestTag::ContentType => "content_type",
            RequestTag::Sync => "sync",
        }
    }
}

/// Per-tag cancellation generations.
///
/// Each request takes a [`Ticket`] when it starts. Cancelling a tag bumps
/// its generation, which invalidates every ticket issued before.
#[derive(Debug, Default)]
pub struct CancellationRegistry {
    generations: [AtomicU64; 6],
}

impl CancellationRegistry {
    /// Creates a registry with nothing cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket for a request starting now.
    pub fn ticket(self: &Arc<Self>, tag: RequestTag) -> Ticket {
        Ticket {
            tag,
            generation: self.generations[tag.index()].load(Ordering::SeqCst),
            registry: Arc::clone(self),
        }
    }

    /// Cancels every outstanding request with `tag`.
    pub fn cancel(&self, tag: RequestTag) {
        self.generations[tag.index()].fetch_add(1, Ordering::SeqCst);
    }

    /// Cancels every outstanding request.
    pub fn cancel_all(&self) {
        for tag in RequestTag::ALL {
            self.cancel(tag);
        }
    }
}

/// Proof that a request started before or after a cancellation.
#[derive(Debug, Clone)]
pub struct Ticket {
    tag: RequestTag,
    generation: u64,
    registry: Arc<CancellationRegistry>,
}

impl Ticket {
    /// Returns the tag the ticket was issued for.
    pub fn tag(&self) -> RequestTag {
        self.tag
    }

    /// Returns true if the ticket's tag was cancelled after issue.
    pub fn is_cancelled(&self) -> bool {
        self.registry.generations[self.tag.index()].load(Ordering::SeqCst) != self.generation
    }
}

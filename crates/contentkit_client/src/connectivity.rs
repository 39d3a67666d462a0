//! Network availability signal.

use std::sync::atomic::{AtomicBool, Ordering};

/// Reports whether a network path is currently available.
///
/// Refreshed by whatever observes the platform's network state; the
/// client only reads it.
pub trait ConnectivityProvider: Send + Sync {
    /// Returns true if requests can reach the network.
    fn is_connected(&self) -> bool;
}

/// A connectivity flag set explicitly by its owner.
#[derive(Debug)]
pub struct StaticConnectivity {
    connected: AtomicBool,
}

impl StaticConnectivity {
    /// Creates a flag with the given initial state.
    pub fn new(connected: bool) -> Self {
        Self {
            connected: AtomicBool::new(connected),
        }
    }

    /// Creates a flag that reports connected.
    pub fn online() -> Self {
        Self::new(true)
    }

    /// Creates a flag that reports disconnected.
    pub fn offline() -> Self {
        Self::new(false)
    }

    /// Updates the flag.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for StaticConnectivity {
    fn default() -> Self {
        Self::online()
    }
}

impl ConnectivityProvider for StaticConnectivity {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

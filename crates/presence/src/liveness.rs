//! Session liveness detection.
//!
//! The registry never trusts a presence entry on its own: every read
//! re-checks the backing session through its [`Liveness`] handle, so
//! entries whose connection died without an explicit leave are dropped
//! anyway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;

/// Probe for whether a session's backing connection is still running.
///
/// Implementations must be cheap and non-blocking; the registry calls
/// this on every read.
pub trait Liveness: Send + Sync {
    fn is_alive(&self) -> bool;
}

/// Shared handle to a session's liveness probe.
pub type LivenessHandle = Arc<dyn Liveness>;

// ---------------------------------------------------------------------------
// ChannelLiveness
// ---------------------------------------------------------------------------

/// Liveness derived from a connection's outbound message channel.
///
/// The transport layer hands each connection an unbounded sender for
/// outbound messages; once the receive half is dropped (the connection
/// task exited, cleanly or not), the channel closes and the session
/// counts as dead.
pub struct ChannelLiveness<T> {
    sender: mpsc::UnboundedSender<T>,
}

impl<T> ChannelLiveness<T> {
    pub fn new(sender: mpsc::UnboundedSender<T>) -> Self {
        Self { sender }
    }
}

impl<T: Send> Liveness for ChannelLiveness<T> {
    fn is_alive(&self) -> bool {
        !self.sender.is_closed()
    }
}

// ---------------------------------------------------------------------------
// ManualLiveness
// ---------------------------------------------------------------------------

/// Liveness driven by an external flag.
///
/// Used where aliveness is decided outside the connection itself (e.g.
/// heartbeat monitors), and by tests to simulate silent session death.
pub struct ManualLiveness {
    alive: AtomicBool,
}

impl ManualLiveness {
    /// Create a handle that starts alive.
    pub fn alive() -> Arc<Self> {
        Arc::new(Self {
            alive: AtomicBool::new(true),
        })
    }

    /// Mark the session dead. There is no way back: a dead session must
    /// re-join with a fresh handle.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl Liveness for ManualLiveness {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

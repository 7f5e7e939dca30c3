//! Event bus for session notifications using tokio::broadcast
//!
//! The watch channel on [`SessionStore`](crate::session::SessionStore) carries
//! the latest state; this bus carries discrete one-shot events (for notices
//! such as "your session expired").

use tokio::sync::broadcast;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// Explicit logout
    UserRequested,
    /// An authenticated request was rejected with an authorization error
    Expired,
    /// The stored token failed validation at boot
    Rejected,
}

/// Events emitted by the session store
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Login or registration completed
    SignedIn { email: String },
    /// Session cleared
    SignedOut(SignOutReason),
    /// Boot finished resolving the stored token
    Resolved { authenticated: bool },
}

/// Event bus for broadcasting session events
///
/// Uses tokio::broadcast for multi-consumer support.
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a new event bus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Create with default capacity (64 events)
    pub fn default_capacity() -> Self {
        Self::new(64)
    }

    /// Publish an event to all subscribers
    pub fn publish(&self, event: SessionEvent) {
        // Ignore send errors (no subscribers)
        let _ = self.sender.send(event);
    }

    /// Subscribe to receive events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::default_capacity()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

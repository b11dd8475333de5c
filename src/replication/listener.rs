//! Responsibility observers
//!
//! Observers are told when the local peer becomes responsible for a key, or
//! when another peer takes a key over from it. Moving the content itself is
//! the observer's job; [`ChannelListener`] hands events to an async task that
//! can do the transfer.

use crate::common::Number160;
use crate::peers::PeerAddress;
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Callback capability notified on responsibility transitions
pub trait ResponsibilityListener: Send + Sync {
    /// The local peer is now responsible for `key`
    fn me_responsible(&self, key: &Number160);

    /// `other` is now responsible for `key`
    fn other_responsible(&self, key: &Number160, other: &PeerAddress);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponsibilityEvent {
    MeResponsible { key: Number160 },
    OtherResponsible { key: Number160, peer: PeerAddress },
}

impl ResponsibilityEvent {
    pub fn key(&self) -> &Number160 {
        match self {
            ResponsibilityEvent::MeResponsible { key } => key,
            ResponsibilityEvent::OtherResponsible { key, .. } => key,
        }
    }

    /// Id of the peer that became responsible (`self_id` for `MeResponsible`)
    pub fn responsible_id(&self, self_id: &Number160) -> Number160 {
        match self {
            ResponsibilityEvent::MeResponsible { .. } => *self_id,
            ResponsibilityEvent::OtherResponsible { peer, .. } => peer.id,
        }
    }
}

/// Forwards events into an unbounded tokio channel
pub struct ChannelListener {
    tx: mpsc::UnboundedSender<ResponsibilityEvent>,
}

impl ChannelListener {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ResponsibilityEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn forward(&self, event: ResponsibilityEvent) {
        if let Err(e) = self.tx.send(event) {
            tracing::warn!(key = %e.0.key(), "responsibility event dropped, receiver closed");
        }
    }
}

impl ResponsibilityListener for ChannelListener {
    fn me_responsible(&self, key: &Number160) {
        self.forward(ResponsibilityEvent::MeResponsible { key: *key });
    }

    fn other_responsible(&self, key: &Number160, other: &PeerAddress) {
        self.forward(ResponsibilityEvent::OtherResponsible {
            key: *key,
            peer: other.clone(),
        });
    }
}

/// Keeps every event in memory, in arrival order
#[derive(Default)]
pub struct EventRecorder {
    events: Mutex<Vec<ResponsibilityEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ResponsibilityEvent> {
        self.events.lock().clone()
    }

    /// Take all recorded events, leaving the recorder empty
    pub fn drain(&self) -> Vec<ResponsibilityEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl ResponsibilityListener for EventRecorder {
    fn me_responsible(&self, key: &Number160) {
        self.events
            .lock()
            .push(ResponsibilityEvent::MeResponsible { key: *key });
    }

    fn other_responsible(&self, key: &Number160, other: &PeerAddress) {
        self.events.lock().push(ResponsibilityEvent::OtherResponsible {
            key: *key,
            peer: other.clone(),
        });
    }
}

/// Logs every transition at debug level
pub struct LoggingListener {
    node: Number160,
}

impl LoggingListener {
    pub fn new(node: Number160) -> Self {
        Self { node }
    }
}

impl ResponsibilityListener for LoggingListener {
    fn me_responsible(&self, key: &Number160) {
        tracing::debug!(node = %self.node, key = %key, "now responsible");
    }

    fn other_responsible(&self, key: &Number160, other: &PeerAddress) {
        tracing::debug!(node = %self.node, key = %key, peer = %other, "handed over");
    }
}

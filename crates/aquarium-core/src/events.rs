//! Status delivery and link lifecycle events.
//!
//! Decoded status patches go to exactly one subscriber callback
//! ([`StatusSubscriber`]). Connection lifecycle changes are broadcast
//! separately to any number of receivers through [`EventDispatcher`].

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use aquarium_types::{ControlPoint, ProtocolRevision, StatusPatch};

/// Callback invoked with every status patch.
pub type StatusCallback = Arc<dyn Fn(StatusPatch) + Send + Sync>;

/// Single-slot holder for the status callback.
///
/// Registering a callback replaces the previous one. Clones share the slot.
#[derive(Clone, Default)]
pub struct StatusSubscriber {
    slot: Arc<Mutex<Option<StatusCallback>>>,
}

impl std::fmt::Debug for StatusSubscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusSubscriber")
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl StatusSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `callback`, dropping any previous one.
    pub fn register<F>(&self, callback: F)
    where
        F: Fn(StatusPatch) + Send + Sync + 'static,
    {
        *self.lock() = Some(Arc::new(callback));
    }

    pub fn clear(&self) {
        self.lock().take();
    }

    pub fn is_registered(&self) -> bool {
        self.lock().is_some()
    }

    /// Deliver `patch` to the current callback, if any.
    ///
    /// The slot is not locked while the callback runs, so the callback may
    /// register a replacement.
    pub fn emit(&self, patch: StatusPatch) {
        let callback = self.lock().clone();
        if let Some(callback) = callback {
            callback(patch);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<StatusCallback>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Summary of an established link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkInfo {
    /// Advertised name of the controller.
    pub name: String,
    /// Peripheral identifier (MAC address or platform UUID).
    pub identifier: String,
    pub revision: ProtocolRevision,
    /// Control points resolved during discovery.
    pub control_points: Vec<ControlPoint>,
}

impl LinkInfo {
    /// Whether the optional control point `point` was found.
    pub fn has(&self, point: ControlPoint) -> bool {
        self.control_points.contains(&point)
    }
}

/// Connection lifecycle events.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new event types
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum LinkEvent {
    /// A link was established.
    Connected { info: LinkInfo },
    /// The link was torn down.
    Disconnected { reason: DisconnectReason },
}

/// Why a link ended.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DisconnectReason {
    /// `disconnect()` was called.
    UserRequested,
    /// A new `connect()` replaced the link.
    Replaced,
    /// The transport reported the peripheral gone.
    LinkLost,
}

/// Sender for link events.
pub type EventSender = broadcast::Sender<LinkEvent>;

/// Receiver for link events.
pub type EventReceiver = broadcast::Receiver<LinkEvent>;

/// Event dispatcher for sending events to multiple receivers.
#[derive(Debug, Clone)]
pub struct EventDispatcher {
    sender: EventSender,
}

impl EventDispatcher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> EventReceiver {
        self.sender.subscribe()
    }

    /// Send an event.
    pub fn send(&self, event: LinkEvent) {
        // Ignore error if no receivers
        let _ = self.sender.send(event);
    }

    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new(16)
    }
}

//! Transport abstractions for the device link.
//!
//! The client never touches a Bluetooth stack directly. It asks a
//! [`TransportProvider`] for a peripheral and drives it through
//! [`PeripheralLink`], so the same client runs against btleplug
//! ([`crate::ble`]) or an in-memory fake ([`crate::mock`]).

use std::pin::Pin;

use async_trait::async_trait;
use btleplug::api::{Characteristic, Service, ValueNotification};
use futures::Stream;
use uuid::Uuid;

use aquarium_types::uuid::DEVICE_NAME;

use crate::error::Result;

/// Criteria a provider uses to pick a peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeripheralFilter {
    /// Exact advertised local name.
    pub name: String,
    /// Service the peripheral must expose once connected.
    pub service: Uuid,
}

impl PeripheralFilter {
    pub fn new(name: impl Into<String>, service: Uuid) -> Self {
        Self {
            name: name.into(),
            service,
        }
    }

    /// Whether an advertised name satisfies the filter.
    pub fn matches_name(&self, name: &str) -> bool {
        name == self.name
    }
}

impl Default for PeripheralFilter {
    fn default() -> Self {
        Self::new(DEVICE_NAME, aquarium_types::uuid::AQUARIUM_SERVICE)
    }
}

/// Something that happened on an open link.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A subscribed characteristic changed value.
    Notification(ValueNotification),
    /// The peripheral dropped the link.
    Disconnected,
}

/// Stream of link events, ending when the transport closes it.
pub type TransportEventStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Selects peripherals.
#[async_trait]
pub trait TransportProvider: Send + Sync + 'static {
    /// Link type handed out by this provider.
    type Link: PeripheralLink;

    /// Pick a peripheral matching `filter`.
    ///
    /// Fails with [`crate::Error::DeviceNotFound`] when nothing matches or the
    /// selection was cancelled.
    async fn request_peripheral(&self, filter: &PeripheralFilter) -> Result<Self::Link>;
}

/// One selected peripheral.
#[async_trait]
pub trait PeripheralLink: Send + Sync + 'static {
    /// Advertised local name.
    fn name(&self) -> &str;

    /// Stable identifier (MAC address or platform UUID).
    fn identifier(&self) -> &str;

    async fn connect(&self) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    /// Transport-level liveness. Never errors; an unknown state is `false`.
    async fn is_connected(&self) -> bool;

    /// Discover and return all services with their characteristics.
    async fn discover_services(&self) -> Result<Vec<Service>>;

    async fn read(&self, characteristic: &Characteristic) -> Result<Vec<u8>>;

    async fn write(&self, characteristic: &Characteristic, data: &[u8]) -> Result<()>;

    /// Enable notifications for `characteristic`.
    async fn subscribe(&self, characteristic: &Characteristic) -> Result<()>;

    /// Open a stream of notifications and disconnect signals.
    ///
    /// Call before [`subscribe`](Self::subscribe) so no early notification
    /// is missed.
    async fn events(&self) -> Result<TransportEventStream>;
}

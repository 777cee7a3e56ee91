//! BLE device link client for the aquarium controller.
//!
//! This crate connects to an ESP32-based aquarium controller advertising as
//! `AquariumController`, turns what the controller reports into
//! [`StatusPatch`] values and sends light, pump, heater, feeder, servo,
//! quiet-mode, clock and schedule commands.
//!
//! # Protocol Revisions
//!
//! Two firmware generations exist and a client speaks exactly one of them:
//!
//! | Revision | Commands | Status |
//! |----------|----------|--------|
//! | A (single characteristic) | ASCII frames such as `LIGHT:1` | `STATUS:` and `TEMP:` notifications |
//! | B (multi characteristic) | One characteristic per setting | Per-characteristic reads and notifications |
//!
//! # Features
//!
//! - **Single link**: a new [`AquariumClient::connect`] replaces the old link
//! - **Status callback**: one replaceable callback receives every patch
//! - **Optimistic echo**: successful writes are reported before the device confirms
//! - **Lifecycle events**: [`LinkEvent`]s on a broadcast channel
//! - **Pluggable transport**: btleplug ([`BleProvider`]) or in-memory ([`MockProvider`])
//!
//! # Quick Start
//!
//! ```no_run
//! use aquarium_core::{AquariumClient, BleOptions, ClientOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AquariumClient::with_ble(ClientOptions::default(), BleOptions::default());
//!     client.on_status_update(|patch| println!("{:?}", patch));
//!
//!     client.connect().await?;
//!     client.sync_time().await?;
//!     client.set_light(true).await?;
//!     client.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod ble;
pub mod client;
pub mod error;
pub mod events;
pub mod mock;
pub mod transport;

pub use aquarium_types::types;
pub use aquarium_types::uuid;

// Core exports
pub use ble::{BleOptions, BlePeripheral, BleProvider, get_adapter};
pub use client::{AquariumClient, BleClient, ClientOptions, DEFAULT_QUIET_MINUTES};
pub use error::{ConnectionFailureReason, DeviceNotFoundReason, Error, ErrorKind, Result};
pub use events::{
    DisconnectReason, EventDispatcher, EventReceiver, EventSender, LinkEvent, LinkInfo,
    StatusCallback, StatusSubscriber,
};
pub use mock::{MockPeripheral, MockProvider};
pub use transport::{
    PeripheralFilter, PeripheralLink, TransportEvent, TransportEventStream, TransportProvider,
};

// Re-export from aquarium-types
pub use aquarium_types::uuid as uuids;
pub use aquarium_types::{
    ControlPoint, DeviceStatus, OnOffSchedule, ProtocolRevision, ScheduleEntry, ScheduleMirror,
    ServoPosition, StatusPatch, TimeOfDay,
};

/// Type alias for a shared client reference.
pub type SharedClient<P> = std::sync::Arc<AquariumClient<P>>;

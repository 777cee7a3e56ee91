//! btleplug transport.
//!
//! [`BleProvider`] finds the controller by its advertised name, first among
//! peripherals the adapter already knows about and then with a timed scan.
//! [`BlePeripheral`] wraps the selected peripheral and merges its
//! notification stream with the adapter's disconnect events.

use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Manager as _, Peripheral as _,
    ScanFilter, Service, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use futures::StreamExt;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::{ConnectionFailureReason, DeviceNotFoundReason, Error, Result};
use crate::transport::{
    PeripheralFilter, PeripheralLink, TransportEvent, TransportEventStream, TransportProvider,
};

/// Default time spent scanning when the controller is not already known.
pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(5);

/// Options for the btleplug transport.
#[derive(Debug, Clone)]
pub struct BleOptions {
    /// How long to scan for the controller.
    pub scan_duration: Duration,
    /// Upper bound on opening the link. `None` leaves it to the OS stack.
    pub connect_timeout: Option<Duration>,
}

impl Default for BleOptions {
    fn default() -> Self {
        Self {
            scan_duration: DEFAULT_SCAN_DURATION,
            connect_timeout: None,
        }
    }
}

impl BleOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan duration.
    #[must_use]
    pub fn scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or(Error::DeviceNotFound(DeviceNotFoundReason::NoAdapter))
}

/// Format a peripheral ID as a string.
fn format_peripheral_id(id: &PeripheralId) -> String {
    format!("{:?}", id)
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

/// Provider backed by the host's first Bluetooth adapter.
#[derive(Debug, Clone, Default)]
pub struct BleProvider {
    options: BleOptions,
}

impl BleProvider {
    pub fn new(options: BleOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BleOptions {
        &self.options
    }
}

#[async_trait]
impl TransportProvider for BleProvider {
    type Link = BlePeripheral;

    #[tracing::instrument(level = "info", skip_all, fields(name = %filter.name))]
    async fn request_peripheral(&self, filter: &PeripheralFilter) -> Result<BlePeripheral> {
        let adapter = get_adapter().await?;

        if let Some(link) = find_by_name(&adapter, filter).await? {
            info!("Found controller in cache (no scan needed)");
            return Ok(link.with_connect_timeout(self.options.connect_timeout));
        }

        info!(
            "Scanning for {} for {} seconds...",
            filter.name,
            self.options.scan_duration.as_secs()
        );
        adapter.start_scan(ScanFilter::default()).await?;
        sleep(self.options.scan_duration).await;
        adapter.stop_scan().await?;

        match find_by_name(&adapter, filter).await? {
            Some(link) => Ok(link.with_connect_timeout(self.options.connect_timeout)),
            None => {
                warn!("Controller not found: {}", filter.name);
                Err(Error::device_not_found(filter.name.clone()))
            }
        }
    }
}

/// Search the adapter's known peripherals for an exact name match.
async fn find_by_name(adapter: &Adapter, filter: &PeripheralFilter) -> Result<Option<BlePeripheral>> {
    for peripheral in adapter.peripherals().await? {
        let Ok(Some(props)) = peripheral.properties().await else {
            continue;
        };
        let Some(name) = props.local_name.as_deref() else {
            continue;
        };
        if !filter.matches_name(name) {
            continue;
        }

        let address = props.address.to_string();
        let identifier = if address == "00:00:00:00:00:00" {
            format_peripheral_id(&peripheral.id())
        } else {
            address
        };
        debug!("Matched {} at {}", name, identifier);

        return Ok(Some(BlePeripheral {
            adapter: adapter.clone(),
            name: name.to_string(),
            identifier,
            peripheral,
            connect_timeout: None,
        }));
    }
    Ok(None)
}

/// A controller reached through btleplug.
pub struct BlePeripheral {
    /// Kept so adapter disconnect events can be watched.
    adapter: Adapter,
    peripheral: Peripheral,
    name: String,
    identifier: String,
    connect_timeout: Option<Duration>,
}

impl std::fmt::Debug for BlePeripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlePeripheral")
            .field("name", &self.name)
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

impl BlePeripheral {
    fn with_connect_timeout(mut self, connect_timeout: Option<Duration>) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    fn connection_error(&self, reason: ConnectionFailureReason) -> Error {
        Error::connection_failed(Some(self.identifier.clone()), reason)
    }
}

#[async_trait]
impl PeripheralLink for BlePeripheral {
    fn name(&self) -> &str {
        &self.name
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn connect(&self) -> Result<()> {
        let result = match self.connect_timeout {
            Some(limit) => timeout(limit, self.peripheral.connect())
                .await
                .map_err(|_| self.connection_error(ConnectionFailureReason::Timeout))?,
            None => self.peripheral.connect().await,
        };
        result.map_err(|e| self.connection_error(ConnectionFailureReason::BleError(e.to_string())))
    }

    async fn disconnect(&self) -> Result<()> {
        self.peripheral.disconnect().await?;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn discover_services(&self) -> Result<Vec<Service>> {
        self.peripheral.discover_services().await?;
        Ok(self.peripheral.services().into_iter().collect())
    }

    async fn read(&self, characteristic: &Characteristic) -> Result<Vec<u8>> {
        self.peripheral
            .read(characteristic)
            .await
            .map_err(|e| Error::read_failed(characteristic.uuid, e))
    }

    async fn write(&self, characteristic: &Characteristic, data: &[u8]) -> Result<()> {
        let write_type = if characteristic.properties.contains(CharPropFlags::WRITE) {
            WriteType::WithResponse
        } else {
            WriteType::WithoutResponse
        };
        self.peripheral
            .write(characteristic, data, write_type)
            .await
            .map_err(|e| Error::write_failed(characteristic.uuid, e))
    }

    async fn subscribe(&self, characteristic: &Characteristic) -> Result<()> {
        self.peripheral
            .subscribe(characteristic)
            .await
            .map_err(|e| Error::subscribe_failed(characteristic.uuid, e))
    }

    async fn events(&self) -> Result<TransportEventStream> {
        let notifications = self
            .peripheral
            .notifications()
            .await?
            .map(TransportEvent::Notification);

        let id = self.peripheral.id();
        let disconnects = self.adapter.events().await?.filter_map(move |event| {
            let lost = matches!(&event, CentralEvent::DeviceDisconnected(peer) if *peer == id);
            futures::future::ready(lost.then_some(TransportEvent::Disconnected))
        });

        Ok(Box::pin(futures::stream::select(notifications, disconnects)))
    }
}

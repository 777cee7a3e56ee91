//! In-memory transport for testing.
//!
//! [`MockProvider`] and [`MockPeripheral`] stand in for the btleplug
//! transport so the client can be exercised without hardware.
//!
//! # Features
//!
//! - **Write log**: every write is recorded with its characteristic UUID
//! - **Readable values**: preset what bulk reads return
//! - **Notification injection**: push values as if the controller sent them
//! - **Failure injection**: cancelled selection, refused connect, failing
//!   reads and writes, missing characteristics, dropped links

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use btleplug::api::{CharPropFlags, Characteristic, Service, ValueNotification};
use tokio::sync::{RwLock, broadcast};
use tracing::debug;
use uuid::Uuid;

use aquarium_types::uuid::{AQUARIUM_SERVICE, DEVICE_NAME};
use aquarium_types::{ControlPoint, ProtocolRevision, payload};

use crate::error::{ConnectionFailureReason, DeviceNotFoundReason, Error, Result};
use crate::transport::{
    PeripheralFilter, PeripheralLink, TransportEvent, TransportEventStream, TransportProvider,
};

/// GATT properties the controller firmware exposes for each control point.
pub fn default_properties(point: ControlPoint) -> CharPropFlags {
    match point {
        ControlPoint::Temperature => CharPropFlags::READ | CharPropFlags::NOTIFY,
        ControlPoint::Command
        | ControlPoint::Light
        | ControlPoint::Filter
        | ControlPoint::Heater
        | ControlPoint::Feeder
        | ControlPoint::Servo
        | ControlPoint::QuietMode
        | ControlPoint::TargetTemperature => {
            CharPropFlags::READ | CharPropFlags::WRITE | CharPropFlags::NOTIFY
        }
        ControlPoint::TimeSync
        | ControlPoint::LightSchedule
        | ControlPoint::FilterSchedule
        | ControlPoint::FeederSchedule
        | ControlPoint::FeedNow => CharPropFlags::WRITE,
    }
}

/// Values a freshly powered controller reports.
fn default_values(revision: ProtocolRevision) -> HashMap<Uuid, Vec<u8>> {
    match revision {
        ProtocolRevision::SingleCharacteristic => HashMap::from([(
            ControlPoint::Command.uuid(),
            b"STATUS:L1P1H0F0S50Q0".to_vec(),
        )]),
        ProtocolRevision::MultiCharacteristic => HashMap::from([
            (ControlPoint::Temperature.uuid(), payload::encode_float(25.0)),
            (ControlPoint::Light.uuid(), payload::encode_bool(true)),
            (ControlPoint::Filter.uuid(), payload::encode_bool(true)),
            (ControlPoint::Heater.uuid(), payload::encode_bool(false)),
            (ControlPoint::Feeder.uuid(), payload::encode_bool(false)),
            (ControlPoint::Servo.uuid(), vec![50]),
            (ControlPoint::QuietMode.uuid(), payload::encode_quiet_minutes(0)),
            (
                ControlPoint::TargetTemperature.uuid(),
                payload::encode_float(26.0),
            ),
        ]),
    }
}

fn characteristic(point: ControlPoint) -> Characteristic {
    Characteristic {
        uuid: point.uuid(),
        service_uuid: AQUARIUM_SERVICE,
        properties: default_properties(point),
        descriptors: BTreeSet::new(),
    }
}

/// A mock provider that always offers the same peripheral.
#[derive(Debug)]
pub struct MockProvider {
    peripheral: MockPeripheral,
    cancel_selection: AtomicBool,
    request_count: AtomicU32,
}

impl MockProvider {
    pub fn new(peripheral: MockPeripheral) -> Self {
        Self {
            peripheral,
            cancel_selection: AtomicBool::new(false),
            request_count: AtomicU32::new(0),
        }
    }

    /// Provider for a freshly built controller speaking `revision`.
    pub fn for_revision(revision: ProtocolRevision) -> Self {
        Self::new(MockPeripheral::for_revision(revision))
    }

    /// Handle on the offered peripheral. Clones share state.
    pub fn peripheral(&self) -> &MockPeripheral {
        &self.peripheral
    }

    /// Make the next selections fail as if the user dismissed the chooser.
    pub fn set_cancel_selection(&self, cancel: bool) {
        self.cancel_selection.store(cancel, Ordering::Relaxed);
    }

    /// Number of times a peripheral was requested.
    pub fn request_count(&self) -> u32 {
        self.request_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TransportProvider for MockProvider {
    type Link = MockPeripheral;

    async fn request_peripheral(&self, filter: &PeripheralFilter) -> Result<MockPeripheral> {
        self.request_count.fetch_add(1, Ordering::Relaxed);
        if self.cancel_selection.load(Ordering::Relaxed) {
            return Err(Error::DeviceNotFound(
                DeviceNotFoundReason::SelectionCancelled,
            ));
        }
        if !filter.matches_name(self.peripheral.name()) {
            return Err(Error::device_not_found(filter.name.clone()));
        }
        Ok(self.peripheral.clone())
    }
}

struct MockState {
    name: String,
    address: String,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    connect_count: AtomicU32,
    services: RwLock<Vec<Service>>,
    values: RwLock<HashMap<Uuid, Vec<u8>>>,
    writes: RwLock<Vec<(Uuid, Vec<u8>)>>,
    subscriptions: RwLock<BTreeSet<Uuid>>,
    change_on_read: RwLock<Option<(Uuid, Vec<u8>)>>,
    events: broadcast::Sender<TransportEvent>,
}

/// A mock aquarium controller.
///
/// Cheap to clone; clones observe and control the same device.
///
/// # Example
///
/// ```
/// use aquarium_core::MockPeripheral;
/// use aquarium_types::ProtocolRevision;
///
/// let controller = MockPeripheral::for_revision(ProtocolRevision::MultiCharacteristic);
/// assert!(!controller.is_connected_sync());
/// ```
#[derive(Clone)]
pub struct MockPeripheral {
    state: Arc<MockState>,
}

impl std::fmt::Debug for MockPeripheral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockPeripheral")
            .field("name", &self.state.name)
            .field("address", &self.state.address)
            .field("connected", &self.is_connected_sync())
            .finish()
    }
}

impl MockPeripheral {
    /// Create a controller exposing `points` in the aquarium service, with
    /// no stored values.
    pub fn new(name: &str, points: &[ControlPoint]) -> Self {
        Self::with_values(name, points, HashMap::new())
    }

    fn with_values(name: &str, points: &[ControlPoint], values: HashMap<Uuid, Vec<u8>>) -> Self {
        let service = Service {
            uuid: AQUARIUM_SERVICE,
            primary: true,
            characteristics: points.iter().copied().map(characteristic).collect(),
        };
        let (events, _) = broadcast::channel(64);
        Self {
            state: Arc::new(MockState {
                name: name.to_string(),
                address: format!("MOCK-{:06X}", rand::random::<u32>() % 0xFFFFFF),
                connected: AtomicBool::new(false),
                fail_connect: AtomicBool::new(false),
                fail_reads: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
                connect_count: AtomicU32::new(0),
                services: RwLock::new(vec![service]),
                values: RwLock::new(values),
                writes: RwLock::new(Vec::new()),
                subscriptions: RwLock::new(BTreeSet::new()),
                change_on_read: RwLock::new(None),
                events,
            }),
        }
    }

    /// A controller with every control point of `revision`, holding
    /// typical readable values.
    pub fn for_revision(revision: ProtocolRevision) -> Self {
        Self::with_values(DEVICE_NAME, revision.control_points(), default_values(revision))
    }

    pub fn address(&self) -> &str {
        &self.state.address
    }

    pub fn is_connected_sync(&self) -> bool {
        self.state.connected.load(Ordering::Relaxed)
    }

    /// Number of successful connects.
    pub fn connect_count(&self) -> u32 {
        self.state.connect_count.load(Ordering::Relaxed)
    }

    fn check_connected(&self) -> Result<()> {
        if self.is_connected_sync() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    // --- Test control methods ---

    /// Refuse the next connects.
    pub fn set_fail_connect(&self, fail: bool) {
        self.state.fail_connect.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.fail_reads.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.state.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Remove a characteristic, as older firmware would.
    pub async fn remove_characteristic(&self, uuid: Uuid) {
        for service in self.state.services.write().await.iter_mut() {
            service.characteristics.retain(|c| c.uuid != uuid);
        }
    }

    /// Replace the advertised services entirely.
    pub async fn set_services(&self, services: Vec<Service>) {
        *self.state.services.write().await = services;
    }

    /// Set the value returned by reads of `uuid`.
    pub async fn set_value(&self, uuid: Uuid, value: Vec<u8>) {
        self.state.values.write().await.insert(uuid, value);
    }

    /// All writes so far, oldest first.
    pub async fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.state.writes.read().await.clone()
    }

    /// Payloads written to `uuid`, oldest first.
    pub async fn writes_to(&self, uuid: Uuid) -> Vec<Vec<u8>> {
        self.state
            .writes
            .read()
            .await
            .iter()
            .filter(|(target, _)| *target == uuid)
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Writes to `uuid` decoded as UTF-8 text, for Revision A frames.
    pub async fn frames_to(&self, uuid: Uuid) -> Vec<String> {
        self.writes_to(uuid)
            .await
            .into_iter()
            .map(|data| String::from_utf8_lossy(&data).into_owned())
            .collect()
    }

    pub async fn clear_writes(&self) {
        self.state.writes.write().await.clear();
    }

    /// Characteristics with notifications enabled.
    pub async fn subscriptions(&self) -> Vec<Uuid> {
        self.state.subscriptions.read().await.iter().copied().collect()
    }

    /// Push a notification for `uuid`.
    ///
    /// Returns `false` when the characteristic is not subscribed and nothing
    /// was delivered.
    pub async fn notify(&self, uuid: Uuid, value: impl Into<Vec<u8>>) -> bool {
        if !self.state.subscriptions.read().await.contains(&uuid) {
            debug!("Dropping notification for unsubscribed {}", uuid);
            return false;
        }
        let notification = ValueNotification {
            uuid,
            value: value.into(),
        };
        let _ = self
            .state
            .events
            .send(TransportEvent::Notification(notification));
        true
    }

    /// Change `uuid` to `value` right after its next read is served, and
    /// notify the new value, as a controller whose state moves mid-read would.
    pub async fn change_on_read(&self, uuid: Uuid, value: impl Into<Vec<u8>>) {
        *self.state.change_on_read.write().await = Some((uuid, value.into()));
    }

    /// Simulate the controller going out of range.
    pub async fn drop_link(&self) {
        self.state.connected.store(false, Ordering::Relaxed);
        self.state.subscriptions.write().await.clear();
        let _ = self.state.events.send(TransportEvent::Disconnected);
    }
}

#[async_trait]
impl PeripheralLink for MockPeripheral {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn identifier(&self) -> &str {
        &self.state.address
    }

    async fn connect(&self) -> Result<()> {
        if self.state.fail_connect.load(Ordering::Relaxed) {
            return Err(Error::connection_failed(
                Some(self.state.address.clone()),
                ConnectionFailureReason::Rejected,
            ));
        }
        self.state.connected.store(true, Ordering::Relaxed);
        self.state.connect_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.state.connected.store(false, Ordering::Relaxed);
        self.state.subscriptions.write().await.clear();
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.is_connected_sync()
    }

    async fn discover_services(&self) -> Result<Vec<Service>> {
        self.check_connected()?;
        Ok(self.state.services.read().await.clone())
    }

    async fn read(&self, characteristic: &Characteristic) -> Result<Vec<u8>> {
        self.check_connected()?;
        if self.state.fail_reads.load(Ordering::Relaxed) {
            return Err(Error::read_failed(characteristic.uuid, "mock read failure"));
        }
        let value = self
            .state
            .values
            .read()
            .await
            .get(&characteristic.uuid)
            .cloned()
            .ok_or_else(|| Error::read_failed(characteristic.uuid, "no value"))?;

        let mut pending = self.state.change_on_read.write().await;
        if pending
            .as_ref()
            .is_some_and(|(uuid, _)| *uuid == characteristic.uuid)
            && let Some((uuid, changed)) = pending.take()
        {
            drop(pending);
            self.set_value(uuid, changed.clone()).await;
            self.notify(uuid, changed).await;
            tokio::task::yield_now().await;
        }
        Ok(value)
    }

    async fn write(&self, characteristic: &Characteristic, data: &[u8]) -> Result<()> {
        self.check_connected()?;
        if self.state.fail_writes.load(Ordering::Relaxed) {
            return Err(Error::write_failed(characteristic.uuid, "mock write failure"));
        }
        self.state
            .writes
            .write()
            .await
            .push((characteristic.uuid, data.to_vec()));
        Ok(())
    }

    async fn subscribe(&self, characteristic: &Characteristic) -> Result<()> {
        self.check_connected()?;
        if !characteristic.properties.contains(CharPropFlags::NOTIFY) {
            return Err(Error::subscribe_failed(
                characteristic.uuid,
                "characteristic does not support notifications",
            ));
        }
        self.state
            .subscriptions
            .write()
            .await
            .insert(characteristic.uuid);
        Ok(())
    }

    async fn events(&self) -> Result<TransportEventStream> {
        let receiver = self.state.events.subscribe();
        Ok(Box::pin(futures::stream::unfold(
            receiver,
            |mut receiver| async move {
                loop {
                    match receiver.recv().await {
                        Ok(event) => return Some((event, receiver)),
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    }
                }
            },
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_provider_filters_by_name() {
        let provider = MockProvider::for_revision(ProtocolRevision::MultiCharacteristic);
        let wrong = PeripheralFilter::new("OtherDevice", AQUARIUM_SERVICE);
        assert!(matches!(
            provider.request_peripheral(&wrong).await,
            Err(Error::DeviceNotFound(DeviceNotFoundReason::NotFound { .. }))
        ));
        assert!(
            provider
                .request_peripheral(&PeripheralFilter::default())
                .await
                .is_ok()
        );
        assert_eq!(provider.request_count(), 2);
    }

    #[tokio::test]
    async fn test_provider_cancel_selection() {
        let provider = MockProvider::for_revision(ProtocolRevision::SingleCharacteristic);
        provider.set_cancel_selection(true);
        assert!(matches!(
            provider.request_peripheral(&PeripheralFilter::default()).await,
            Err(Error::DeviceNotFound(
                DeviceNotFoundReason::SelectionCancelled
            ))
        ));
    }

    #[tokio::test]
    async fn test_operations_require_connection() {
        let mock = MockPeripheral::for_revision(ProtocolRevision::SingleCharacteristic);
        let command = characteristic(ControlPoint::Command);
        assert!(matches!(
            mock.write(&command, b"FEED").await,
            Err(Error::NotConnected)
        ));
        assert!(mock.discover_services().await.is_err());

        mock.connect().await.unwrap();
        mock.write(&command, b"FEED").await.unwrap();
        assert_eq!(mock.frames_to(command.uuid).await, vec!["FEED"]);
    }

    #[tokio::test]
    async fn test_fail_connect() {
        let mock = MockPeripheral::for_revision(ProtocolRevision::MultiCharacteristic);
        mock.set_fail_connect(true);
        let err = mock.connect().await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed { .. }));
        assert!(!mock.is_connected_sync());
        assert_eq!(mock.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_remove_characteristic() {
        let mock = MockPeripheral::for_revision(ProtocolRevision::MultiCharacteristic);
        mock.remove_characteristic(ControlPoint::Servo.uuid()).await;
        mock.connect().await.unwrap();
        let services = mock.discover_services().await.unwrap();
        assert!(
            services[0]
                .characteristics
                .iter()
                .all(|c| c.uuid != ControlPoint::Servo.uuid())
        );
    }

    #[tokio::test]
    async fn test_subscribe_rejects_write_only() {
        let mock = MockPeripheral::for_revision(ProtocolRevision::MultiCharacteristic);
        mock.connect().await.unwrap();
        let err = mock
            .subscribe(&characteristic(ControlPoint::FeedNow))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SubscribeFailed { .. }));
    }

    #[tokio::test]
    async fn test_notify_and_drop_reach_event_stream() {
        let mock = MockPeripheral::for_revision(ProtocolRevision::MultiCharacteristic);
        mock.connect().await.unwrap();
        let mut events = mock.events().await.unwrap();

        let light = characteristic(ControlPoint::Light);
        assert!(!mock.notify(light.uuid, vec![1]).await);
        mock.subscribe(&light).await.unwrap();
        assert!(mock.notify(light.uuid, vec![1]).await);
        mock.drop_link().await;

        match events.next().await {
            Some(TransportEvent::Notification(n)) => {
                assert_eq!(n.uuid, light.uuid);
                assert_eq!(n.value, vec![1]);
            }
            other => panic!("expected notification, got {:?}", other),
        }
        assert!(matches!(
            events.next().await,
            Some(TransportEvent::Disconnected)
        ));
        assert!(!mock.is_connected_sync());
    }

    #[tokio::test]
    async fn test_default_values_are_readable() {
        let mock = MockPeripheral::for_revision(ProtocolRevision::MultiCharacteristic);
        mock.connect().await.unwrap();
        let value = mock
            .read(&characteristic(ControlPoint::Temperature))
            .await
            .unwrap();
        assert_eq!(payload::decode_float(&value).unwrap(), 25.0);
        assert!(
            mock.read(&characteristic(ControlPoint::FeedNow))
                .await
                .is_err()
        );
    }
}

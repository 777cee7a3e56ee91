//! The aquarium device link client.
//!
//! [`AquariumClient`] owns one link to the controller at a time. It resolves
//! the control points of the configured [`ProtocolRevision`], subscribes to
//! their notifications and turns every inbound value into a
//! [`StatusPatch`] delivered to the registered status callback. Commands
//! are encoded for the active revision and, once the write succeeds, echoed
//! to the callback as an optimistic patch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use btleplug::api::{CharPropFlags, Characteristic};
use futures::StreamExt;
use time::{OffsetDateTime, PrimitiveDateTime};
use tokio::sync::{RwLock, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use aquarium_types::uuid::DEVICE_NAME;
use aquarium_types::{
    Command, ControlPoint, OnOffSchedule, ProtocolRevision, ScheduleEntry, ServoPosition,
    StatusPatch, TimeOfDay, payload,
};

use crate::ble::{BleOptions, BleProvider};
use crate::error::{ConnectionFailureReason, Error, Result};
use crate::events::{
    DisconnectReason, EventDispatcher, EventReceiver, LinkEvent, LinkInfo, StatusSubscriber,
};
use crate::transport::{
    PeripheralFilter, PeripheralLink, TransportEvent, TransportEventStream, TransportProvider,
};

/// Default quiet-mode duration used by [`AquariumClient::set_quiet_mode`].
pub const DEFAULT_QUIET_MINUTES: u16 = 30;

/// Client configuration.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Protocol revision spoken for the client's lifetime.
    pub revision: ProtocolRevision,
    /// Advertised name the peripheral must have.
    pub device_name: String,
    /// Minutes sent when quiet mode is switched on (Revision B).
    pub quiet_minutes: u16,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            revision: ProtocolRevision::default(),
            device_name: DEVICE_NAME.to_string(),
            quiet_minutes: DEFAULT_QUIET_MINUTES,
        }
    }
}

impl ClientOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn revision(mut self, revision: ProtocolRevision) -> Self {
        self.revision = revision;
        self
    }

    #[must_use]
    pub fn device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    #[must_use]
    pub fn quiet_minutes(mut self, minutes: u16) -> Self {
        self.quiet_minutes = minutes;
        self
    }
}

/// One live session. Dropped as a whole on disconnect.
struct DeviceLink<L> {
    peripheral: Arc<L>,
    control_points: HashMap<ControlPoint, Characteristic>,
    pump: JoinHandle<()>,
    session: u64,
}

type SharedLink<L> = Arc<RwLock<Option<DeviceLink<L>>>>;

/// Client for one aquarium controller.
///
/// Methods take `&self`; share the client with `Arc` to drive it from
/// several tasks.
///
/// # Example
///
/// ```
/// use aquarium_core::{AquariumClient, ClientOptions, MockProvider};
/// use aquarium_types::{DeviceStatus, ProtocolRevision};
/// use std::sync::{Arc, Mutex};
///
/// #[tokio::main]
/// async fn main() -> aquarium_core::Result<()> {
///     let provider = MockProvider::for_revision(ProtocolRevision::MultiCharacteristic);
///     let client = AquariumClient::new(provider, ClientOptions::default());
///
///     let status = Arc::new(Mutex::new(DeviceStatus::default()));
///     let sink = Arc::clone(&status);
///     client.on_status_update(move |patch| sink.lock().unwrap().apply(&patch));
///
///     client.connect().await?;
///     client.set_light(true).await?;
///     assert!(status.lock().unwrap().light_on);
///
///     client.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct AquariumClient<P: TransportProvider> {
    provider: P,
    options: ClientOptions,
    link: SharedLink<P::Link>,
    subscriber: StatusSubscriber,
    events: EventDispatcher,
    next_session: AtomicU64,
}

/// Client over the btleplug transport.
pub type BleClient = AquariumClient<BleProvider>;

impl AquariumClient<BleProvider> {
    /// Build a client that talks to real hardware.
    pub fn with_ble(options: ClientOptions, ble: BleOptions) -> Self {
        Self::new(BleProvider::new(ble), options)
    }
}

impl<P: TransportProvider> std::fmt::Debug for AquariumClient<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AquariumClient")
            .field("options", &self.options)
            .field("subscriber", &self.subscriber)
            .finish_non_exhaustive()
    }
}

impl<P: TransportProvider> AquariumClient<P> {
    /// Create a disconnected client.
    pub fn new(provider: P, options: ClientOptions) -> Self {
        Self {
            provider,
            options,
            link: Arc::new(RwLock::new(None)),
            subscriber: StatusSubscriber::new(),
            events: EventDispatcher::default(),
            next_session: AtomicU64::new(1),
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn revision(&self) -> ProtocolRevision {
        self.options.revision
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Register the status callback, replacing any previous one.
    pub fn on_status_update<F>(&self, callback: F)
    where
        F: Fn(StatusPatch) + Send + Sync + 'static,
    {
        self.subscriber.register(callback);
    }

    /// Remove the status callback.
    pub fn clear_status_update(&self) {
        self.subscriber.clear();
    }

    /// Subscribe to link lifecycle events.
    pub fn events(&self) -> EventReceiver {
        self.events.subscribe()
    }

    // --- Connection Management ---

    /// Select, connect and set up the controller.
    ///
    /// Any previously held link is torn down first. On failure after the
    /// transport link opened, the peripheral is disconnected and no link is
    /// kept.
    #[tracing::instrument(level = "info", skip_all, fields(device = %self.options.device_name, revision = %self.options.revision))]
    pub async fn connect(&self) -> Result<LinkInfo> {
        let previous = self.link.write().await.take();
        if let Some(old) = previous {
            info!("Replacing existing link");
            self.teardown(old, DisconnectReason::Replaced).await;
        }

        let filter =
            PeripheralFilter::new(&self.options.device_name, self.options.revision.service_uuid());
        let peripheral = Arc::new(self.provider.request_peripheral(&filter).await?);

        info!("Connecting to {} ({})...", peripheral.name(), peripheral.identifier());
        peripheral.connect().await.map_err(|e| match e {
            Error::ConnectionFailed { .. } => e,
            other => Error::connection_failed(
                Some(peripheral.identifier().to_string()),
                ConnectionFailureReason::Other(other.to_string()),
            ),
        })?;
        info!("Connected!");

        match self.establish(&peripheral).await {
            Ok(info) => Ok(info),
            Err(e) => {
                warn!("Setup failed, closing link: {}", e);
                if let Err(cleanup) = peripheral.disconnect().await {
                    debug!(error = %cleanup, "Best-effort disconnect failed");
                }
                Err(e)
            }
        }
    }

    async fn establish(&self, peripheral: &Arc<P::Link>) -> Result<LinkInfo> {
        let revision = self.options.revision;
        let control_points = resolve_control_points(peripheral.as_ref(), revision).await?;

        // Open the stream before subscribing so early notifications are kept.
        let stream = peripheral.events().await?;
        for (point, characteristic) in &control_points {
            if characteristic.properties.contains(CharPropFlags::NOTIFY) {
                debug!("Subscribing to {}", point);
                peripheral.subscribe(characteristic).await?;
            }
        }

        let initial = read_status(peripheral.as_ref(), &control_points).await?;

        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        let routes: HashMap<Uuid, ControlPoint> = control_points
            .iter()
            .map(|(point, c)| (c.uuid, *point))
            .collect();
        // The pump holds back until the link is stored and the initial read
        // has been delivered, so later notifications always win.
        let (ready_tx, ready_rx) = oneshot::channel();
        let pump = tokio::spawn(pump_notifications(
            stream,
            ready_rx,
            routes,
            self.subscriber.clone(),
            Arc::clone(&self.link),
            self.events.clone(),
            session,
        ));

        let mut points: Vec<ControlPoint> = control_points.keys().copied().collect();
        points.sort();
        let info = LinkInfo {
            name: peripheral.name().to_string(),
            identifier: peripheral.identifier().to_string(),
            revision,
            control_points: points,
        };

        *self.link.write().await = Some(DeviceLink {
            peripheral: Arc::clone(peripheral),
            control_points,
            pump,
            session,
        });

        if !initial.is_empty() {
            self.subscriber.emit(initial);
        }
        // Only fails if the pump was already aborted by a racing disconnect.
        let _ = ready_tx.send(());
        self.events.send(LinkEvent::Connected { info: info.clone() });
        info!("Link ready ({} control points)", info.control_points.len());
        Ok(info)
    }

    /// Close the link if one is held. Safe to call repeatedly.
    #[tracing::instrument(level = "info", skip_all)]
    pub async fn disconnect(&self) -> Result<()> {
        let Some(link) = self.link.write().await.take() else {
            debug!("Already disconnected");
            return Ok(());
        };
        info!("Disconnecting...");
        link.pump.abort();
        let result = if link.peripheral.is_connected().await {
            link.peripheral.disconnect().await
        } else {
            Ok(())
        };
        self.events.send(LinkEvent::Disconnected {
            reason: DisconnectReason::UserRequested,
        });
        result
    }

    async fn teardown(&self, link: DeviceLink<P::Link>, reason: DisconnectReason) {
        link.pump.abort();
        if link.peripheral.is_connected().await
            && let Err(e) = link.peripheral.disconnect().await
        {
            warn!("Failed to close previous link: {}", e);
        }
        self.events.send(LinkEvent::Disconnected { reason });
    }

    /// Whether a link is held and the transport reports it alive.
    pub async fn is_connected(&self) -> bool {
        let peripheral = match self.link.read().await.as_ref() {
            Some(link) => Arc::clone(&link.peripheral),
            None => return false,
        };
        peripheral.is_connected().await
    }

    // --- Internal helpers ---

    fn unsupported(&self, operation: &'static str) -> Error {
        Error::Unsupported {
            operation,
            revision: self.options.revision,
        }
    }

    async fn ensure_connected(&self) -> Result<()> {
        if self.link.read().await.is_some() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    /// Write `data` to `point` of the current link.
    async fn write_point(&self, point: ControlPoint, data: &[u8]) -> Result<()> {
        let (peripheral, characteristic) = {
            let guard = self.link.read().await;
            let link = guard.as_ref().ok_or(Error::NotConnected)?;
            let characteristic = link
                .control_points
                .get(&point)
                .cloned()
                .ok_or_else(|| Error::characteristic_not_found(point.uuid().to_string(), 1))?;
            (Arc::clone(&link.peripheral), characteristic)
        };
        debug!("Writing {} bytes to {}", data.len(), point);
        peripheral.write(&characteristic, data).await
    }

    async fn send_command(&self, command: Command) -> Result<()> {
        debug!("Sending frame {}", command);
        self.write_point(ControlPoint::Command, &command.encode())
            .await
    }

    fn echo(&self, patch: StatusPatch) {
        self.subscriber.emit(patch);
    }

    async fn set_switch(
        &self,
        on: bool,
        frame: fn(bool) -> Command,
        point: ControlPoint,
        patch: StatusPatch,
    ) -> Result<()> {
        match self.options.revision {
            ProtocolRevision::SingleCharacteristic => self.send_command(frame(on)).await?,
            ProtocolRevision::MultiCharacteristic => {
                self.write_point(point, &payload::encode_bool(on)).await?
            }
        }
        self.echo(patch);
        Ok(())
    }

    // --- Commands ---

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn set_light(&self, on: bool) -> Result<()> {
        self.set_switch(
            on,
            Command::Light,
            ControlPoint::Light,
            StatusPatch::new().with_light(on),
        )
        .await
    }

    /// Switch the filter pump.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn set_pump(&self, on: bool) -> Result<()> {
        self.set_switch(
            on,
            Command::Pump,
            ControlPoint::Filter,
            StatusPatch::new().with_pump(on),
        )
        .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn set_heater(&self, on: bool) -> Result<()> {
        self.set_switch(
            on,
            Command::Heater,
            ControlPoint::Heater,
            StatusPatch::new().with_heater(on),
        )
        .await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn set_feeder(&self, on: bool) -> Result<()> {
        self.set_switch(
            on,
            Command::Feeder,
            ControlPoint::Feeder,
            StatusPatch::new().with_feeder(on),
        )
        .await
    }

    /// Move the air pump servo.
    ///
    /// Revision A only carries whole degrees, so the echo there is the
    /// position snapped to the nearest degree.
    #[tracing::instrument(level = "debug", skip_all, fields(position = %position))]
    pub async fn set_servo(&self, position: ServoPosition) -> Result<()> {
        let sent = match self.options.revision {
            ProtocolRevision::SingleCharacteristic => {
                self.send_command(Command::Servo(position)).await?;
                position.snapped_to_degrees()
            }
            ProtocolRevision::MultiCharacteristic => {
                self.write_point(ControlPoint::Servo, &payload::encode_servo(position))
                    .await?;
                position
            }
        };
        self.echo(StatusPatch::new().with_servo(sent));
        Ok(())
    }

    /// Switch quiet mode. Revision B sends the configured duration.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn set_quiet_mode(&self, on: bool) -> Result<()> {
        let minutes = if on { self.options.quiet_minutes.max(1) } else { 0 };
        self.set_quiet_minutes(minutes).await
    }

    /// Enter quiet mode for `minutes`; zero leaves it.
    ///
    /// Revision A has no duration and only switches the mode.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn set_quiet_minutes(&self, minutes: u16) -> Result<()> {
        let on = minutes != 0;
        match self.options.revision {
            ProtocolRevision::SingleCharacteristic => {
                self.send_command(Command::Quiet(on)).await?
            }
            ProtocolRevision::MultiCharacteristic => {
                self.write_point(
                    ControlPoint::QuietMode,
                    &payload::encode_quiet_minutes(minutes),
                )
                .await?
            }
        }
        self.echo(StatusPatch::new().with_quiet_mode(on));
        Ok(())
    }

    /// Set the heater target in degrees Celsius (Revision B only).
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn set_target_temperature(&self, celsius: f32) -> Result<()> {
        self.ensure_connected().await?;
        if self.options.revision == ProtocolRevision::SingleCharacteristic {
            return Err(self.unsupported("set_target_temperature"));
        }
        if !celsius.is_finite() {
            return Err(Error::invalid_input(format!(
                "target temperature {celsius} is not a number"
            )));
        }
        self.write_point(
            ControlPoint::TargetTemperature,
            &payload::encode_float(celsius),
        )
        .await?;
        self.echo(StatusPatch::new().with_target_temperature(celsius));
        Ok(())
    }

    /// Trigger one feeding now.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn feed_now(&self) -> Result<()> {
        match self.options.revision {
            ProtocolRevision::SingleCharacteristic => self.send_command(Command::Feed).await,
            ProtocolRevision::MultiCharacteristic => {
                self.write_point(ControlPoint::FeedNow, &payload::FEED_TRIGGER)
                    .await
            }
        }
    }

    /// Set the controller clock to the local time of this host.
    pub async fn sync_time(&self) -> Result<()> {
        let now = OffsetDateTime::now_local().unwrap_or_else(|_| {
            debug!("Local offset unavailable, using UTC");
            OffsetDateTime::now_utc()
        });
        self.sync_time_at(PrimitiveDateTime::new(now.date(), now.time()))
            .await
    }

    /// Set the controller clock to `at`.
    #[tracing::instrument(level = "debug", skip_all, fields(at = %at))]
    pub async fn sync_time_at(&self, at: PrimitiveDateTime) -> Result<()> {
        match self.options.revision {
            ProtocolRevision::SingleCharacteristic => self.send_command(Command::Time(at)).await,
            ProtocolRevision::MultiCharacteristic => {
                self.write_point(ControlPoint::TimeSync, &payload::encode_time(at))
                    .await
            }
        }
    }

    /// Program the daily light window (Revision B only).
    #[tracing::instrument(level = "debug", skip_all, fields(on = %on, off = %off))]
    pub async fn set_light_schedule(&self, on: TimeOfDay, off: TimeOfDay) -> Result<()> {
        self.write_on_off_schedule("set_light_schedule", ControlPoint::LightSchedule, on, off)
            .await
    }

    /// Program the daily filter window (Revision B only).
    #[tracing::instrument(level = "debug", skip_all, fields(on = %on, off = %off))]
    pub async fn set_filter_schedule(&self, on: TimeOfDay, off: TimeOfDay) -> Result<()> {
        self.write_on_off_schedule("set_filter_schedule", ControlPoint::FilterSchedule, on, off)
            .await
    }

    async fn write_on_off_schedule(
        &self,
        operation: &'static str,
        point: ControlPoint,
        on: TimeOfDay,
        off: TimeOfDay,
    ) -> Result<()> {
        self.ensure_connected().await?;
        if self.options.revision != ProtocolRevision::MultiCharacteristic {
            return Err(self.unsupported(operation));
        }
        let schedule = OnOffSchedule::new(on, off);
        self.write_point(point, &payload::encode_on_off_schedule(&schedule))
            .await
    }

    /// Program the daily feeding time (Revision B only).
    #[tracing::instrument(level = "debug", skip_all, fields(at = %at))]
    pub async fn set_feeder_schedule(&self, at: TimeOfDay) -> Result<()> {
        self.ensure_connected().await?;
        if self.options.revision != ProtocolRevision::MultiCharacteristic {
            return Err(self.unsupported("set_feeder_schedule"));
        }
        self.write_point(
            ControlPoint::FeederSchedule,
            &payload::encode_feeder_schedule(at),
        )
        .await
    }

    /// Store a numbered schedule entry (Revision A only).
    #[tracing::instrument(level = "debug", skip_all, fields(id = entry.id))]
    pub async fn set_schedule(&self, entry: &ScheduleEntry) -> Result<()> {
        self.ensure_connected().await?;
        if self.options.revision != ProtocolRevision::SingleCharacteristic {
            return Err(self.unsupported("set_schedule"));
        }
        self.send_command(Command::Schedule(*entry)).await
    }

    /// Delete a numbered schedule entry (Revision A only).
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn delete_schedule(&self, id: u32) -> Result<()> {
        self.ensure_connected().await?;
        if self.options.revision != ProtocolRevision::SingleCharacteristic {
            return Err(self.unsupported("delete_schedule"));
        }
        self.send_command(Command::DeleteSchedule(id)).await
    }

    /// Ask for fresh status.
    ///
    /// Revision A sends `GET_STATUS` and the answer arrives as a
    /// notification. Revision B re-reads every readable status
    /// characteristic and emits the result directly.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn request_status(&self) -> Result<()> {
        match self.options.revision {
            ProtocolRevision::SingleCharacteristic => {
                self.send_command(Command::GetStatus).await
            }
            ProtocolRevision::MultiCharacteristic => {
                let (peripheral, control_points) = {
                    let guard = self.link.read().await;
                    let link = guard.as_ref().ok_or(Error::NotConnected)?;
                    (Arc::clone(&link.peripheral), link.control_points.clone())
                };
                let patch = read_status(peripheral.as_ref(), &control_points).await?;
                if !patch.is_empty() {
                    self.subscriber.emit(patch);
                }
                Ok(())
            }
        }
    }
}

impl<P: TransportProvider> Drop for AquariumClient<P> {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.link.try_write()
            && let Some(link) = guard.take()
        {
            warn!(
                session = link.session,
                "Client dropped without calling disconnect() - aborting notification task"
            );
            link.pump.abort();
            let peripheral = link.peripheral;
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = peripheral.disconnect().await {
                        debug!(error = %e, "Best-effort disconnect failed");
                    }
                });
            }
        }
    }
}

/// Discover services and map every control point of `revision` to its
/// characteristic.
async fn resolve_control_points<L: PeripheralLink>(
    peripheral: &L,
    revision: ProtocolRevision,
) -> Result<HashMap<ControlPoint, Characteristic>> {
    info!("Discovering services...");
    let services = peripheral.discover_services().await?;
    debug!("Found {} services", services.len());

    let service_uuid = revision.service_uuid();
    let service = services
        .iter()
        .find(|s| s.uuid == service_uuid)
        .ok_or_else(|| Error::ServiceNotFound {
            uuid: service_uuid.to_string(),
        })?;

    let mut control_points = HashMap::new();
    for point in revision.control_points() {
        let uuid = point.uuid();
        match service.characteristics.iter().find(|c| c.uuid == uuid) {
            Some(characteristic) => {
                debug!("  {}: {}", point, uuid);
                control_points.insert(*point, characteristic.clone());
            }
            None if point.is_required() => {
                return Err(Error::characteristic_not_found(
                    uuid.to_string(),
                    services.len(),
                ));
            }
            None => debug!("  {}: not present (optional)", point),
        }
    }
    Ok(control_points)
}

/// Read every readable status control point into one patch.
///
/// Transport failures abort the read; values that fail to decode are
/// skipped with a warning.
async fn read_status<L: PeripheralLink>(
    peripheral: &L,
    control_points: &HashMap<ControlPoint, Characteristic>,
) -> Result<StatusPatch> {
    let mut readable: Vec<_> = control_points
        .iter()
        .filter(|(point, c)| {
            point.carries_status() && c.properties.contains(CharPropFlags::READ)
        })
        .collect();
    readable.sort_by_key(|(point, _)| **point);

    let mut patch = StatusPatch::new();
    for (point, characteristic) in readable {
        let data = peripheral.read(characteristic).await?;
        match payload::decode(*point, &data) {
            Ok(value) => patch.merge(value),
            Err(e) => warn!("Ignoring unreadable {} value: {}", point, e),
        }
    }
    Ok(patch)
}

/// Route notifications to the subscriber until the link ends.
async fn pump_notifications<L: PeripheralLink>(
    mut stream: TransportEventStream,
    ready: oneshot::Receiver<()>,
    routes: HashMap<Uuid, ControlPoint>,
    subscriber: StatusSubscriber,
    link: SharedLink<L>,
    events: EventDispatcher,
    session: u64,
) {
    if ready.await.is_err() {
        debug!("Setup abandoned before the pump started");
        return;
    }
    while let Some(event) = stream.next().await {
        match event {
            TransportEvent::Notification(notification) => {
                let Some(&point) = routes.get(&notification.uuid) else {
                    debug!("Ignoring notification from {}", notification.uuid);
                    continue;
                };
                match payload::decode(point, &notification.value) {
                    Ok(patch) if !patch.is_empty() => subscriber.emit(patch),
                    Ok(_) => {}
                    Err(e) => warn!("Dropping undecodable {} notification: {}", point, e),
                }
            }
            TransportEvent::Disconnected => break,
        }
    }

    let mut guard = link.write().await;
    if guard.as_ref().is_some_and(|held| held.session == session) {
        guard.take();
        drop(guard);
        info!("Link lost");
        events.send(LinkEvent::Disconnected {
            reason: DisconnectReason::LinkLost,
        });
    }
}

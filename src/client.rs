//! Main [`EmberMug`] session implementation.
//!
//! This module provides the high-level [`EmberMug`] session that combines
//! transport, push event handling, and commands into a unified interface.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::commands::{CommandHandler, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use crate::event::{
    CallbackHandle, CallbackRegistry, Event, EventDispatcher, EventFilter, MugCallback,
    Subscription,
};
use crate::protocol::parser::{
    encode_byte_string, encode_colour, encode_name, encode_temperature, encode_temperature_unit,
    encode_volume_level,
};
use crate::protocol::{MugCharacteristic, PushEvent};
use crate::scanner::DiscoveredMug;
use crate::transport::{BleTransport, ConnectConfig, Transport, TransportEvent};
use crate::types::{
    Attribute, AttributeValue, BatteryInfo, Change, Colour, LiquidState, Model, MugData,
    MugFirmwareInfo, MugMeta, TemperatureUnit, VolumeLevel,
};

/// Default window in which a repeated push event is ignored.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(5);

/// Capacity of the event channels.
const EVENT_CAPACITY: usize = 256;

/// Configuration for a mug session.
#[derive(Debug, Clone, Copy)]
pub struct MugConfig {
    /// Report temperatures in Celsius.
    pub use_metric: bool,
    /// Read diagnostic attributes too.
    pub include_extra: bool,
    /// Log GATT services on connect.
    pub debug: bool,
    /// Timeout of a single GATT operation.
    pub command_timeout: Duration,
    /// Push event debounce window.
    pub debounce: Duration,
}

impl MugConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            use_metric: true,
            include_extra: false,
            debug: false,
            command_timeout: DEFAULT_TIMEOUT,
            debounce: DEFAULT_DEBOUNCE,
        }
    }

    /// Sets the temperature unit used for reporting.
    #[must_use]
    pub const fn use_metric(mut self, use_metric: bool) -> Self {
        self.use_metric = use_metric;
        self
    }

    /// Enables reading diagnostic attributes.
    #[must_use]
    pub const fn include_extra(mut self, include_extra: bool) -> Self {
        self.include_extra = include_extra;
        self
    }

    /// Enables service logging on connect.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the GATT operation timeout.
    #[must_use]
    pub const fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets the push event debounce window.
    #[must_use]
    pub const fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }
}

impl Default for MugConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared with the notification task.
struct Shared {
    data: parking_lot::RwLock<MugData>,
    queued: parking_lot::Mutex<BTreeSet<Attribute>>,
    latest_events: parking_lot::Mutex<HashMap<u8, Instant>>,
    callbacks: CallbackRegistry,
    dispatcher: EventDispatcher,
    expected_disconnect: AtomicBool,
    debounce: Duration,
    label: parking_lot::RwLock<String>,
}

impl Shared {
    fn fire_callbacks(&self) {
        let snapshot = self.data.read().clone();
        tracing::debug!("Firing {} callbacks", self.callbacks.len());
        self.callbacks.fire(&snapshot);
    }

    fn apply(&self, values: Vec<AttributeValue>) -> Vec<Change> {
        let changes = self.data.write().update(values);
        if !changes.is_empty() {
            self.fire_callbacks();
            self.dispatcher.dispatch(Event::Changed(changes.clone()));
        }
        changes
    }

    fn handle_notification(&self, data: &[u8]) {
        let Some(&id) = data.first() else {
            return;
        };

        let now = Instant::now();
        {
            let mut latest = self.latest_events.lock();
            if latest
                .get(&id)
                .is_some_and(|last| now.duration_since(*last) < self.debounce)
            {
                return;
            }
            latest.insert(id, now);
        }

        let Some(event) = PushEvent::from_byte(id) else {
            tracing::debug!("Unknown push event: {id}");
            return;
        };
        tracing::debug!("Push event received: {event:?}");

        match event {
            PushEvent::ChargerConnected | PushEvent::ChargerDisconnected => {
                {
                    let mut data = self.data.write();
                    let percent = data.battery.map_or(0.0, |b| b.percent);
                    data.battery = Some(BatteryInfo {
                        percent,
                        on_charging_base: event == PushEvent::ChargerConnected,
                    });
                }
                self.fire_callbacks();
            }
            PushEvent::AuthInfoNotFound => tracing::warn!("Auth info missing"),
            _ => {}
        }

        if let Some(attribute) = event.invalidates() {
            self.queued.lock().insert(attribute);
        }
        self.dispatcher.dispatch(Event::Push(event));
    }

    fn handle_disconnect(&self) {
        let expected = self.expected_disconnect.load(Ordering::SeqCst);
        if expected {
            tracing::debug!("Disconnect callback called");
        } else {
            tracing::warn!("Unexpectedly disconnected");
        }
        self.dispatcher.dispatch(Event::Disconnected { expected });
    }
}

/// Session with one Ember mug.
///
/// Every operation takes `&self`; the session can be shared between tasks.
pub struct EmberMug<T> {
    transport: Arc<Mutex<T>>,
    commands: CommandHandler<T>,
    shared: Arc<Shared>,
    connect_lock: Mutex<()>,
    process_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl EmberMug<BleTransport> {
    /// Creates a session for a discovered mug.
    #[must_use]
    pub fn from_device(device: DiscoveredMug, config: MugConfig) -> Self {
        let connect = ConnectConfig::new().log_services(config.debug);
        let model = Model::new(device.model_name(), config.include_extra);
        Self::with_model(BleTransport::new(device, connect), model, config)
    }
}

impl<T: Transport + 'static> EmberMug<T> {
    /// Creates a session with the given transport and the default model.
    #[must_use]
    pub fn new(transport: T, config: MugConfig) -> Self {
        let model = Model::new(crate::types::model::DEFAULT_NAME, config.include_extra);
        Self::with_model(transport, model, config)
    }

    /// Creates a session with the given transport and model.
    #[must_use]
    pub fn with_model(transport: T, model: Model, config: MugConfig) -> Self {
        let label = transport.describe();
        let transport = Arc::new(Mutex::new(transport));
        let mut commands = CommandHandler::new(Arc::clone(&transport));
        commands.set_timeout(config.command_timeout);

        let shared = Arc::new(Shared {
            data: parking_lot::RwLock::new(MugData::new(model, config.use_metric)),
            queued: parking_lot::Mutex::new(BTreeSet::new()),
            latest_events: parking_lot::Mutex::new(HashMap::new()),
            callbacks: CallbackRegistry::new(),
            dispatcher: EventDispatcher::new(EVENT_CAPACITY),
            expected_disconnect: AtomicBool::new(false),
            debounce: config.debounce,
            label: parking_lot::RwLock::new(label),
        });

        Self {
            transport,
            commands,
            shared,
            connect_lock: Mutex::new(()),
            process_task: parking_lot::Mutex::new(None),
        }
    }

    /// Returns a snapshot of the last known state.
    #[must_use]
    pub fn data(&self) -> MugData {
        self.shared.data.read().clone()
    }

    /// Returns the device model.
    #[must_use]
    pub fn model(&self) -> Model {
        self.shared.data.read().model.clone()
    }

    /// Attributes queued by push events and not yet read.
    #[must_use]
    pub fn queued_attributes(&self) -> BTreeSet<Attribute> {
        self.shared.queued.lock().clone()
    }

    /// Returns the command handler for direct characteristic access.
    #[must_use]
    pub const fn commands(&self) -> &CommandHandler<T> {
        &self.commands
    }

    fn label(&self) -> String {
        self.shared.label.read().clone()
    }

    fn use_metric(&self) -> bool {
        self.shared.data.read().use_metric
    }

    // ==================== Connection ====================

    /// Returns true if connected.
    pub async fn is_connected(&self) -> bool {
        self.transport.lock().await.is_connected()
    }

    /// Connects unless already connected and subscribes to push events.
    ///
    /// Concurrent callers wait for a connection in progress instead of
    /// starting another one.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to connect.
    pub async fn ensure_connection(&self) -> Result<()> {
        if self.is_connected().await {
            return Ok(());
        }

        let _guard = self.connect_lock.lock().await;
        if self.is_connected().await {
            return Ok(());
        }

        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        {
            let mut transport = self.transport.lock().await;
            tracing::debug!("Establishing a new connection to {}", self.label());
            transport.set_event_sender(event_tx);
            let connected = transport.connect().await;
            *self.shared.label.write() = transport.describe();
            if let Err(e) = connected {
                tracing::error!("{}: Failed to connect to the mug: {e}", self.label());
                return Err(e);
            }
        }

        self.shared.expected_disconnect.store(false, Ordering::SeqCst);
        self.start_processing(event_rx);
        self.shared.dispatcher.dispatch(Event::Connected);

        if let Err(e) = self.commands.start_notify(MugCharacteristic::PushEvent).await {
            tracing::warn!("Failed to subscribe to push events: {e}");
        }
        Ok(())
    }

    fn start_processing(&self, mut event_rx: mpsc::Receiver<TransportEvent>) {
        let shared = Arc::clone(&self.shared);
        let push_uuid = MugCharacteristic::PushEvent.uuid();
        let task = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                match event {
                    TransportEvent::Notification {
                        characteristic,
                        value,
                    } if characteristic == push_uuid => shared.handle_notification(&value),
                    TransportEvent::Notification { characteristic, .. } => {
                        tracing::debug!("Ignoring notification from {characteristic}");
                    }
                    TransportEvent::Disconnected => shared.handle_disconnect(),
                }
            }
        });
        if let Some(previous) = self.process_task.lock().replace(task) {
            previous.abort();
        }
    }

    fn stop_processing(&self) {
        if let Some(task) = self.process_task.lock().take() {
            task.abort();
        }
    }

    /// Unsubscribes and disconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails to disconnect.
    pub async fn disconnect(&self) -> Result<()> {
        self.shared.expected_disconnect.store(true, Ordering::SeqCst);
        let result = {
            let _guard = self.connect_lock.lock().await;
            if self.is_connected().await {
                if let Err(e) = self.commands.stop_notify(MugCharacteristic::PushEvent).await {
                    tracing::debug!("Failed to unsubscribe from push events: {e}");
                }
                let result = self.transport.lock().await.disconnect().await;
                self.shared.handle_disconnect();
                result
            } else {
                Ok(())
            }
        };
        self.stop_processing();
        self.shared.expected_disconnect.store(false, Ordering::SeqCst);
        result
    }

    /// Replaces the peripheral used for future connections.
    ///
    /// An established connection keeps using the current peripheral until
    /// it is disconnected.
    pub async fn set_device(&self, device: T::Device) {
        self.transport.lock().await.set_device(device);
    }

    /// Connects, runs `f` with the session, then disconnects.
    ///
    /// # Errors
    ///
    /// Returns the connection error, or else the result of `f`.
    pub async fn connection<'a, F, Fut, R>(&'a self, f: F) -> Result<R>
    where
        F: FnOnce(&'a Self) -> Fut,
        Fut: Future<Output = Result<R>> + 'a,
    {
        self.ensure_connection().await?;
        let result = f(self).await;
        if let Err(e) = self.disconnect().await {
            tracing::debug!("Failed to disconnect cleanly: {e}");
        }
        result
    }

    // ==================== Callbacks & Events ====================

    /// Registers a state callback.
    ///
    /// Registering the same callback again returns its existing handle.
    pub fn register_callback(&self, callback: MugCallback) -> CallbackHandle {
        let handle = self.shared.callbacks.register(callback);
        tracing::debug!("Registered callback {}", handle.value());
        handle
    }

    /// Removes a state callback.
    pub fn unregister_callback(&self, handle: CallbackHandle) {
        if self.shared.callbacks.unregister(handle) {
            tracing::debug!("Unregistered callback {}", handle.value());
        }
    }

    /// Subscribes to session events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.shared.dispatcher.subscribe(None)
    }

    /// Subscribes to session events matching `filter`.
    #[must_use]
    pub fn subscribe_filtered(&self, filter: EventFilter) -> Subscription {
        self.shared.dispatcher.subscribe(Some(filter))
    }

    /// Waits for the next event matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns `Timeout` if no matching event arrives in time.
    pub async fn wait_for(&self, filter: EventFilter, timeout: Duration) -> Result<Event> {
        self.shared
            .dispatcher
            .wait_for(filter, timeout)
            .await
            .ok_or(Error::Timeout {
                timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            })
    }

    // ==================== Identity ====================

    /// Reads the mug id and serial number.
    pub async fn get_meta(&self) -> Result<MugMeta> {
        self.ensure_connection().await?;
        self.commands.get_meta().await
    }

    /// Reads firmware information.
    pub async fn get_firmware(&self) -> Result<MugFirmwareInfo> {
        self.ensure_connection().await?;
        self.commands.get_firmware().await
    }

    /// Reads the mug name.
    pub async fn get_name(&self) -> Result<String> {
        self.ensure_connection().await?;
        self.commands.get_name().await
    }

    /// Renames the mug.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` without connecting if the mug would refuse
    /// the name.
    pub async fn set_name(&self, name: &str) -> Result<()> {
        let payload = encode_name(name)?;
        self.write(MugCharacteristic::MugName, payload).await?;
        self.shared.data.write().name = Some(name.to_owned());
        Ok(())
    }

    /// Reads the user device secret key. Read failures yield an empty string.
    pub async fn get_udsk(&self) -> Result<String> {
        self.ensure_connection().await?;
        Ok(self.read_udsk().await)
    }

    async fn read_udsk(&self) -> String {
        self.commands.get_udsk().await.unwrap_or_else(|e| {
            tracing::debug!("Unable to read UDSK: {e}");
            String::new()
        })
    }

    /// Writes the user device secret key.
    pub async fn set_udsk(&self, udsk: &str) -> Result<()> {
        self.write(MugCharacteristic::Udsk, encode_byte_string(udsk))
            .await?;
        self.shared.data.write().udsk = Some(udsk.to_owned());
        Ok(())
    }

    /// Reads the device secret key. Read failures yield an empty string.
    pub async fn get_dsk(&self) -> Result<String> {
        self.ensure_connection().await?;
        Ok(self.read_dsk().await)
    }

    async fn read_dsk(&self) -> String {
        self.commands.get_dsk().await.unwrap_or_else(|e| {
            tracing::debug!("Unable to read DSK: {e}");
            String::new()
        })
    }

    // ==================== Temperature ====================

    /// Reads the drink temperature in the session unit.
    pub async fn get_current_temp(&self) -> Result<f32> {
        self.ensure_connection().await?;
        self.commands.get_current_temp(self.use_metric()).await
    }

    /// Reads the target temperature in the session unit.
    pub async fn get_target_temp(&self) -> Result<f32> {
        self.ensure_connection().await?;
        self.commands.get_target_temp(self.use_metric()).await
    }

    /// Sets the target temperature, given in the session unit.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` without connecting if the temperature cannot
    /// be encoded.
    pub async fn set_target_temp(&self, temp: f32) -> Result<()> {
        let payload = encode_temperature(temp, self.use_metric())?;
        self.write(MugCharacteristic::TargetTemperature, payload)
            .await?;
        self.shared.data.write().target_temp = Some(temp);
        Ok(())
    }

    /// Reads the unit shown by the mug app.
    pub async fn get_temperature_unit(&self) -> Result<TemperatureUnit> {
        self.ensure_connection().await?;
        self.commands.get_temperature_unit().await
    }

    /// Sets the unit shown by the mug app.
    pub async fn set_temperature_unit(&self, unit: TemperatureUnit) -> Result<()> {
        self.write(
            MugCharacteristic::TemperatureUnit,
            encode_temperature_unit(unit),
        )
        .await?;
        self.shared.data.write().temperature_unit = Some(unit);
        Ok(())
    }

    /// Writes the unit matching the session unit if the mug shows another.
    pub async fn ensure_correct_unit(&self) -> Result<()> {
        let (current, desired) = {
            let data = self.shared.data.read();
            (data.temperature_unit, data.unit())
        };
        if current != Some(desired) {
            self.set_temperature_unit(desired).await?;
        }
        Ok(())
    }

    // ==================== Liquid ====================

    /// Reads the raw liquid level (0-30).
    pub async fn get_liquid_level(&self) -> Result<u8> {
        self.ensure_connection().await?;
        self.commands.get_liquid_level().await
    }

    /// Reads the liquid state.
    pub async fn get_liquid_state(&self) -> Result<LiquidState> {
        self.ensure_connection().await?;
        self.commands.get_liquid_state().await
    }

    /// Reads the travel mug volume level.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` if the read fails on a mug without a speaker.
    /// On a travel mug a failed read is logged and yields `None`.
    pub async fn get_volume_level(&self) -> Result<Option<VolumeLevel>> {
        self.ensure_connection().await?;
        self.read_volume_level().await
    }

    async fn read_volume_level(&self) -> Result<Option<VolumeLevel>> {
        match self.commands.get_volume_level().await {
            Ok(level) => Ok(Some(level)),
            Err(e) => {
                let model = self.model();
                if !model.is_travel_mug() {
                    return Err(Error::Unsupported {
                        attribute: Attribute::VolumeLevel,
                        model: model.name,
                    });
                }
                tracing::error!("Failed to fetch volume attribute: {e}");
                Ok(None)
            }
        }
    }

    /// Sets the travel mug volume level.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` without connecting on other models.
    pub async fn set_volume_level(&self, level: VolumeLevel) -> Result<()> {
        let model = self.model();
        if !model.supports(Attribute::VolumeLevel) {
            return Err(Error::Unsupported {
                attribute: Attribute::VolumeLevel,
                model: model.name,
            });
        }
        self.write(MugCharacteristic::Volume, encode_volume_level(level))
            .await?;
        self.shared.data.write().volume_level = Some(Some(level));
        Ok(())
    }

    // ==================== Battery & Misc ====================

    /// Reads battery status.
    pub async fn get_battery(&self) -> Result<BatteryInfo> {
        self.ensure_connection().await?;
        self.commands.get_battery().await
    }

    /// Reads battery voltage.
    pub async fn get_battery_voltage(&self) -> Result<u8> {
        self.ensure_connection().await?;
        self.commands.get_battery_voltage().await
    }

    /// Reads the LED colour.
    pub async fn get_led_colour(&self) -> Result<Colour> {
        self.ensure_connection().await?;
        self.commands.get_led_colour().await
    }

    /// Sets the LED colour. Alpha is always sent as 255.
    pub async fn set_led_colour(&self, colour: Colour) -> Result<()> {
        let colour = colour.opaque();
        self.write(MugCharacteristic::Led, encode_colour(colour))
            .await?;
        self.shared.data.write().led_colour = Some(colour);
        Ok(())
    }

    /// Reads the mug clock.
    pub async fn get_date_time_zone(&self) -> Result<Option<DateTime<Utc>>> {
        self.ensure_connection().await?;
        self.commands.get_date_time_zone().await
    }

    async fn write(&self, characteristic: MugCharacteristic, payload: Bytes) -> Result<()> {
        self.ensure_connection().await?;
        self.commands.write(characteristic, payload).await
    }

    // ==================== Bulk Updates ====================

    /// Reads any attribute.
    pub async fn get(&self, attribute: Attribute) -> Result<AttributeValue> {
        self.ensure_connection().await?;
        self.read_attribute(attribute).await
    }

    async fn read_attribute(&self, attribute: Attribute) -> Result<AttributeValue> {
        let use_metric = self.use_metric();
        Ok(match attribute {
            Attribute::Name => AttributeValue::Name(self.commands.get_name().await?),
            Attribute::Meta => AttributeValue::Meta(self.commands.get_meta().await?),
            Attribute::Battery => AttributeValue::Battery(self.commands.get_battery().await?),
            Attribute::Firmware => AttributeValue::Firmware(self.commands.get_firmware().await?),
            Attribute::LedColour => {
                AttributeValue::LedColour(self.commands.get_led_colour().await?)
            }
            Attribute::LiquidLevel => {
                AttributeValue::LiquidLevel(self.commands.get_liquid_level().await?)
            }
            Attribute::LiquidState => {
                AttributeValue::LiquidState(self.commands.get_liquid_state().await?)
            }
            Attribute::TemperatureUnit => {
                AttributeValue::TemperatureUnit(self.commands.get_temperature_unit().await?)
            }
            Attribute::CurrentTemp => {
                AttributeValue::CurrentTemp(self.commands.get_current_temp(use_metric).await?)
            }
            Attribute::TargetTemp => {
                AttributeValue::TargetTemp(self.commands.get_target_temp(use_metric).await?)
            }
            Attribute::Dsk => AttributeValue::Dsk(self.read_dsk().await),
            Attribute::Udsk => AttributeValue::Udsk(self.read_udsk().await),
            Attribute::DateTimeZone => {
                AttributeValue::DateTimeZone(self.commands.get_date_time_zone().await?)
            }
            Attribute::BatteryVoltage => {
                AttributeValue::BatteryVoltage(self.commands.get_battery_voltage().await?)
            }
            Attribute::VolumeLevel => AttributeValue::VolumeLevel(self.read_volume_level().await?),
        })
    }

    async fn update_multiple(&self, attributes: BTreeSet<Attribute>) -> Result<Vec<Change>> {
        self.ensure_connection().await?;
        let mut values = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            values.push(self.read_attribute(attribute).await?);
        }
        Ok(self.shared.apply(values))
    }

    /// Reads the attributes that rarely change.
    pub async fn update_initial(&self) -> Result<Vec<Change>> {
        let attributes = self.model().initial_attributes();
        self.update_multiple(attributes).await
    }

    /// Reads every attribute the model exposes.
    pub async fn update_all(&self) -> Result<Vec<Change>> {
        let attributes = self.model().update_attributes();
        self.update_multiple(attributes).await
    }

    /// Reads the attributes queued by push events.
    ///
    /// Returns no changes, without touching the connection, if nothing is
    /// queued.
    pub async fn update_queued_attributes(&self) -> Result<Vec<Change>> {
        let queued = std::mem::take(&mut *self.shared.queued.lock());
        if queued.is_empty() {
            return Ok(Vec::new());
        }
        self.update_multiple(queued).await
    }
}

impl<T> Drop for EmberMug<T> {
    fn drop(&mut self) {
        if let Some(task) = self.process_task.lock().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use crate::transport::mock::{MOCK_LABEL, MockTransport};
    use crate::types::model::{EMBER_MUG, EMBER_TRAVEL_MUG};

    fn session(mock: &MockTransport, model: &str) -> EmberMug<MockTransport> {
        EmberMug::with_model(mock.clone(), Model::new(model, false), MugConfig::new())
    }

    fn push(event: PushEvent) -> TransportEvent {
        TransportEvent::Notification {
            characteristic: MugCharacteristic::PushEvent.uuid(),
            value: Bytes::copy_from_slice(&[u8::from(event)]),
        }
    }

    fn counting_callback() -> (MugCallback, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let callback: MugCallback = Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        (callback, calls)
    }

    #[test]
    fn test_config_builder() {
        let config = MugConfig::new()
            .use_metric(false)
            .include_extra(true)
            .debug(true)
            .command_timeout(Duration::from_secs(3))
            .debounce(Duration::from_secs(1));
        assert!(!config.use_metric);
        assert!(config.include_extra);
        assert!(config.debug);
        assert_eq!(config.command_timeout, Duration::from_secs(3));
        assert_eq!(config.debounce, Duration::from_secs(1));
        assert!(MugConfig::default().use_metric);
    }

    #[test]
    fn test_config_reused_across_sessions() {
        let config = MugConfig::new().use_metric(false);
        let first = EmberMug::with_model(MockTransport::new(), Model::new(EMBER_MUG, false), config);
        let second = EmberMug::new(MockTransport::new(), config);
        assert!(!first.data().use_metric);
        assert!(!second.data().use_metric);
    }

    #[tokio::test]
    async fn test_ensure_connection_when_connected() {
        let mock = MockTransport::connected();
        let mug = session(&mock, EMBER_MUG);

        mug.ensure_connection().await.unwrap();

        assert_eq!(mock.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_ensure_connection_connects_and_subscribes() {
        let mock = MockTransport::new();
        let mug = session(&mock, EMBER_MUG);

        mug.ensure_connection().await.unwrap();
        mug.ensure_connection().await.unwrap();

        assert_eq!(mock.connect_calls(), 1);
        assert!(mug.is_connected().await);
        assert!(
            mock.state
                .lock()
                .notifying
                .contains(&MugCharacteristic::PushEvent.uuid())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_ensure_connection_connects_once() {
        let mock = MockTransport::new();
        mock.state.lock().connect_delay = Some(Duration::from_millis(100));
        let mug = session(&mock, EMBER_MUG);

        let (first, second) = tokio::join!(mug.ensure_connection(), mug.ensure_connection());

        first.unwrap();
        second.unwrap();
        assert_eq!(mock.connect_calls(), 1);
        assert!(mug.is_connected().await);
    }

    #[tokio::test]
    async fn test_set_device_keeps_active_session() {
        let mock = MockTransport::new();
        mock.respond(MugCharacteristic::LiquidLevel, b"\x05");
        let mug = session(&mock, EMBER_MUG);
        mug.ensure_connection().await.unwrap();

        mug.set_device("Ember Cup (C8:4B:8A:00:00:02)".into()).await;

        // The live connection still talks to the old device
        assert_eq!(mug.get_liquid_level().await.unwrap(), 5);
        assert_eq!(mock.connect_calls(), 1);
        assert_eq!(mock.state.lock().device.current(), MOCK_LABEL);

        mug.disconnect().await.unwrap();
        assert_eq!(mock.disconnect_calls(), 1);

        mug.ensure_connection().await.unwrap();
        assert_eq!(mock.connect_calls(), 2);
        assert_eq!(mug.label(), "Ember Cup (C8:4B:8A:00:00:02)");
    }

    #[tokio::test]
    async fn test_set_device_while_disconnected() {
        let mock = MockTransport::new();
        let mug = session(&mock, EMBER_MUG);

        mug.set_device("Ember Cup (C8:4B:8A:00:00:02)".into()).await;

        assert_eq!(
            mock.state.lock().device.current(),
            "Ember Cup (C8:4B:8A:00:00:02)"
        );
        assert_eq!(mock.connect_calls(), 0);
    }

    #[tokio::test]
    async fn test_ensure_connection_failure() {
        let mock = MockTransport::new();
        mock.state.lock().fail_connect = true;
        let mug = session(&mock, EMBER_MUG);

        assert!(mug.ensure_connection().await.is_err());
        assert!(!mug.is_connected().await);
    }

    #[tokio::test]
    async fn test_disconnect_reports_expected() {
        let mock = MockTransport::new();
        let mug = session(&mock, EMBER_MUG);
        mug.ensure_connection().await.unwrap();
        let mut events = mug.subscribe();

        mug.disconnect().await.unwrap();

        assert!(!mug.is_connected().await);
        assert_eq!(mock.disconnect_calls(), 1);
        assert!(mock.state.lock().notifying.is_empty());
        assert!(matches!(
            events.recv().await,
            Some(Event::Disconnected { expected: true })
        ));
    }

    #[tokio::test]
    async fn test_transport_disconnect_reports_unexpected() {
        let mock = MockTransport::new();
        let mug = session(&mock, EMBER_MUG);
        mug.ensure_connection().await.unwrap();
        let mut events = mug.subscribe();

        mock.inject(TransportEvent::Disconnected).await;

        assert!(matches!(
            events.recv().await,
            Some(Event::Disconnected { expected: false })
        ));
    }

    #[tokio::test]
    async fn test_connection_runs_closure_and_disconnects() {
        let mock = MockTransport::new();
        mock.respond(MugCharacteristic::LiquidLevel, b"\n");
        let mug = session(&mock, EMBER_MUG);

        let level = mug
            .connection(|mug| async move { mug.commands().get_liquid_level().await })
            .await
            .unwrap();

        assert_eq!(level, 10);
        assert!(!mug.is_connected().await);
    }

    #[tokio::test]
    async fn test_getters() {
        let mock = MockTransport::connected();
        mock.respond(MugCharacteristic::MugId, b"Yw====-ABCDEFGHIJ");
        mock.respond(MugCharacteristic::Led, b"\xf4\x00\xa1\xff");
        mock.respond(MugCharacteristic::MugName, b"Mug Name");
        mock.respond(MugCharacteristic::LiquidState, b"\x06");
        mock.respond(MugCharacteristic::TemperatureUnit, b"\x01");
        mock.respond(MugCharacteristic::ControlRegisterData, b"\x01");
        mock.respond(MugCharacteristic::DateTimeAndZone, b"c\x0f\xf6\x00");
        mock.respond(MugCharacteristic::Firmware, b"c\x01\x80\x00\x12\x00");
        let mug = session(&mock, EMBER_MUG);

        assert_eq!(mug.get_meta().await.unwrap().serial_number, "ABCDEFGHIJ");
        assert_eq!(mug.get_led_colour().await.unwrap().as_hex(), "#f400a1");
        assert_eq!(mug.get_name().await.unwrap(), "Mug Name");
        assert_eq!(mug.get_liquid_state().await.unwrap(), LiquidState::TargetTemperature);
        assert_eq!(
            mug.get_temperature_unit().await.unwrap(),
            TemperatureUnit::Fahrenheit
        );
        assert_eq!(mug.get_battery_voltage().await.unwrap(), 1);
        assert_eq!(
            mug.get_date_time_zone().await.unwrap().unwrap().timestamp(),
            1_661_990_400
        );
        assert_eq!(mug.get_firmware().await.unwrap().version, 355);
    }

    #[tokio::test]
    async fn test_key_read_failure_is_empty() {
        let mock = MockTransport::connected();
        let mug = session(&mock, EMBER_MUG);

        assert_eq!(mug.get_udsk().await.unwrap(), "");
        assert_eq!(mug.get_dsk().await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_setters_write_payloads() {
        let mock = MockTransport::connected();
        let mug = session(&mock, EMBER_MUG);

        mug.set_target_temp(55.81).await.unwrap();
        mug.set_led_colour(Colour::rgba(244, 0, 161, 3)).await.unwrap();
        mug.set_udsk("abcd12345").await.unwrap();
        mug.set_name("Mug name").await.unwrap();

        let writes = mock.writes();
        assert_eq!(writes[0].0, MugCharacteristic::TargetTemperature);
        assert_eq!(&writes[0].1[..], b"\xcd\x15");
        assert_eq!(writes[1].0, MugCharacteristic::Led);
        assert_eq!(&writes[1].1[..], b"\xf4\x00\xa1\xff");
        assert_eq!(writes[2].0, MugCharacteristic::Udsk);
        assert_eq!(&writes[2].1[..], b"YWJjZDEyMzQ1");
        assert_eq!(&writes[3].1[..], b"Mug name");

        let data = mug.data();
        assert_eq!(data.target_temp, Some(55.81));
        assert_eq!(data.led_colour, Some(Colour::rgb(244, 0, 161)));
        assert_eq!(data.udsk.as_deref(), Some("abcd12345"));
        assert_eq!(data.name.as_deref(), Some("Mug name"));
    }

    #[tokio::test]
    async fn test_write_failure_propagates() {
        let mock = MockTransport::connected();
        mock.state.lock().fail_write = true;
        let mug = session(&mock, EMBER_MUG);

        let err = mug.set_led_colour(Colour::rgb(1, 2, 3)).await.unwrap_err();

        assert!(matches!(err, Error::NotConnected));
        assert!(mock.writes().is_empty());
        assert_eq!(mug.data().led_colour, None);
    }

    #[tokio::test]
    async fn test_invalid_name_skips_io() {
        let mock = MockTransport::new();
        let mug = session(&mock, EMBER_MUG);

        let err = mug.set_name("Hé!").await.unwrap_err();

        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert_eq!(mock.connect_calls(), 0);
        assert!(mock.writes().is_empty());
    }

    #[tokio::test]
    async fn test_volume_level_travel_mug() {
        let mock = MockTransport::connected();
        let mug = session(&mock, EMBER_TRAVEL_MUG);

        mug.set_volume_level(VolumeLevel::High).await.unwrap();
        assert_eq!(mock.writes()[0].0, MugCharacteristic::Volume);
        assert_eq!(&mock.writes()[0].1[..], b"\x02");

        // Read failures are tolerated on a travel mug
        assert_eq!(mug.get_volume_level().await.unwrap(), None);
        mock.respond(MugCharacteristic::Volume, b"\x01");
        assert_eq!(
            mug.get_volume_level().await.unwrap(),
            Some(VolumeLevel::Medium)
        );
    }

    #[tokio::test]
    async fn test_volume_level_ceramic_mug() {
        let mock = MockTransport::new();
        let mug = session(&mock, EMBER_MUG);

        let err = mug.set_volume_level(VolumeLevel::High).await.unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
        assert_eq!(mock.connect_calls(), 0);

        let err = mug.get_volume_level().await.unwrap_err();
        assert!(matches!(err, Error::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_ensure_correct_unit() {
        let mock = MockTransport::connected();
        let mug = session(&mock, EMBER_MUG);

        mug.ensure_correct_unit().await.unwrap();
        mug.ensure_correct_unit().await.unwrap();

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].0, MugCharacteristic::TemperatureUnit);
        assert_eq!(&writes[0].1[..], b"\x00");
    }

    #[tokio::test]
    async fn test_update_all_reports_changes() {
        let mock = MockTransport::connected();
        mock.respond(MugCharacteristic::Led, b"\xf4\x00\xa1\xff");
        mock.respond(MugCharacteristic::CurrentTemperature, b"\xcd\x15");
        mock.respond(MugCharacteristic::TargetTemperature, b"\xcd\x15");
        mock.respond(MugCharacteristic::TemperatureUnit, b"\x00");
        mock.respond(MugCharacteristic::LiquidLevel, b"\n");
        mock.respond(MugCharacteristic::Battery, b"5\x01");
        mock.respond(MugCharacteristic::LiquidState, b"\x06");
        mock.respond(MugCharacteristic::MugName, b"Mug Name");
        let mug = session(&mock, EMBER_MUG);
        let (callback, calls) = counting_callback();
        mug.register_callback(callback);

        let changes = mug.update_all().await.unwrap();
        assert_eq!(changes.len(), 8);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(mug.data().liquid_level, Some(10));

        let changes = mug.update_all().await.unwrap();
        assert!(changes.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_update_initial() {
        let mock = MockTransport::connected();
        mock.respond(MugCharacteristic::MugName, b"Mug Name");
        mock.respond(MugCharacteristic::MugId, b"Yw====-ABCDEFGHIJ");
        mock.respond(MugCharacteristic::Firmware, b"c\x01\x80\x00\x12\x00");
        mock.respond(MugCharacteristic::Led, b"\xf4\x00\xa1\xff");
        mock.respond(MugCharacteristic::TemperatureUnit, b"\x00");
        let mug = session(&mock, EMBER_MUG);

        let changes = mug.update_initial().await.unwrap();

        assert_eq!(changes.len(), 5);
        assert_eq!(
            mock.reads(),
            vec![
                MugCharacteristic::MugName,
                MugCharacteristic::MugId,
                MugCharacteristic::Firmware,
                MugCharacteristic::Led,
                MugCharacteristic::TemperatureUnit,
            ]
        );
        assert_eq!(mug.data().name.as_deref(), Some("Mug Name"));
    }

    #[tokio::test]
    async fn test_get_by_attribute() {
        let mock = MockTransport::connected();
        mock.respond(MugCharacteristic::CurrentTemperature, b"\xcd\x15");
        mock.respond(MugCharacteristic::Battery, b"5\x01");
        let mug = session(&mock, EMBER_MUG);

        let value = mug.get(Attribute::CurrentTemp).await.unwrap();
        assert!(matches!(value, AttributeValue::CurrentTemp(t) if (t - 55.81).abs() < 0.001));

        let value = mug.get(Attribute::Battery).await.unwrap();
        assert_eq!(
            value,
            AttributeValue::Battery(BatteryInfo {
                percent: 53.0,
                on_charging_base: true,
            })
        );

        assert_eq!(
            mug.get(Attribute::Dsk).await.unwrap(),
            AttributeValue::Dsk(String::new())
        );
        assert!(matches!(
            mug.get(Attribute::VolumeLevel).await.unwrap_err(),
            Error::Unsupported { .. }
        ));
        // Reads are not stored
        assert!(mug.data().current_temp.is_none());
    }

    #[tokio::test]
    async fn test_update_queued_attributes_empty() {
        let mock = MockTransport::connected();
        let mug = session(&mock, EMBER_MUG);

        assert!(mug.update_queued_attributes().await.unwrap().is_empty());
        assert!(mock.reads().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_events_queue_attributes() {
        let mock = MockTransport::connected();
        let mug = session(&mock, EMBER_MUG);
        let (callback, calls) = counting_callback();
        mug.register_callback(callback);

        for id in 1..=9 {
            mug.shared.handle_notification(&[id]);
        }

        let expected: BTreeSet<Attribute> = [
            Attribute::Battery,
            Attribute::TargetTemp,
            Attribute::CurrentTemp,
            Attribute::LiquidLevel,
            Attribute::LiquidState,
            Attribute::BatteryVoltage,
        ]
        .into_iter()
        .collect();
        assert_eq!(mug.queued_attributes(), expected);
        // Connected then disconnected
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(mug.data().battery.map(|b| b.on_charging_base), Some(false));

        mug.shared.latest_events.lock().clear();
        mug.shared.handle_notification(&[2]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(mug.data().battery.map(|b| b.on_charging_base), Some(true));

        // Repeat inside the debounce window
        mug.shared.handle_notification(&[2]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        tokio::time::advance(DEFAULT_DEBOUNCE).await;
        mug.shared.handle_notification(&[3]);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_push_notification_through_transport() {
        let mock = MockTransport::new();
        mock.respond(MugCharacteristic::LiquidLevel, b"\x05");
        let mug = session(&mock, EMBER_MUG);
        mug.ensure_connection().await.unwrap();
        let mut events = mug.subscribe();

        mock.inject(push(PushEvent::LiquidLevelChanged)).await;

        assert!(matches!(
            events.recv().await,
            Some(Event::Push(PushEvent::LiquidLevelChanged))
        ));
        let changes = mug.update_queued_attributes().await.unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].attribute, Attribute::LiquidLevel);
        assert!(mug.queued_attributes().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_push_event() {
        let mock = MockTransport::new();
        let mug = session(&mock, EMBER_MUG);
        mug.ensure_connection().await.unwrap();
        let filter = EventFilter::push_events(vec![PushEvent::ChargerConnected]);

        let (event, ()) = tokio::join!(mug.wait_for(filter, Duration::from_secs(5)), async {
            mock.inject(push(PushEvent::LiquidLevelChanged)).await;
            mock.inject(push(PushEvent::ChargerConnected)).await;
        });

        assert!(matches!(
            event.unwrap(),
            Event::Push(PushEvent::ChargerConnected)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_times_out() {
        let mock = MockTransport::new();
        let mug = session(&mock, EMBER_MUG);

        let err = mug
            .wait_for(EventFilter::connection(), Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout { timeout_ms: 1000 }));
    }

    #[tokio::test]
    async fn test_subscribe_filtered_by_attribute() {
        let mock = MockTransport::new();
        let mug = session(&mock, EMBER_MUG);
        let mut events = mug.subscribe_filtered(EventFilter::attribute(Attribute::LiquidLevel));

        mug.shared.apply(vec![AttributeValue::BatteryVoltage(1)]);
        mug.shared.apply(vec![AttributeValue::LiquidLevel(5)]);

        match events.recv().await {
            Some(Event::Changed(changes)) => {
                assert_eq!(changes.len(), 1);
                assert_eq!(changes[0].attribute, Attribute::LiquidLevel);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_empty_and_unknown_notifications_are_ignored() {
        let mock = MockTransport::new();
        let mug = session(&mock, EMBER_MUG);

        mug.shared.handle_notification(&[]);
        mug.shared.handle_notification(&[0x42]);

        assert!(mug.queued_attributes().is_empty());
    }

    #[test]
    fn test_duplicate_callback_registration() {
        let mock = MockTransport::new();
        let mug = session(&mock, EMBER_MUG);
        let (callback, calls) = counting_callback();

        let first = mug.register_callback(Arc::clone(&callback));
        let second = mug.register_callback(callback);
        assert_eq!(first, second);

        mug.shared.fire_callbacks();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        mug.unregister_callback(first);
        mug.shared.fire_callbacks();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}

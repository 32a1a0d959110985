//! Bluetooth LE transport implementation.
//!
//! This module drives a single peripheral through btleplug. Notifications and
//! adapter disconnect events are forwarded by background tasks.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::{Adapter, Peripheral};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::scanner::DiscoveredMug;
use crate::transport::{DeviceSlot, Transport, TransportEvent};

/// Default number of connection attempts.
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default delay between attempts, multiplied by the attempt number.
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// Default time allowed for a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Configuration for establishing a BLE connection.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Number of connection attempts.
    pub attempts: u32,
    /// Base delay between attempts.
    pub backoff: Duration,
    /// Timeout of a single attempt.
    pub timeout: Duration,
    /// Log all services and characteristics after connecting.
    pub log_services: bool,
}

impl ConnectConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
            timeout: DEFAULT_CONNECT_TIMEOUT,
            log_services: false,
        }
    }

    /// Sets the number of attempts. Zero is treated as one.
    #[must_use]
    pub const fn attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the base backoff.
    #[must_use]
    pub const fn backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the timeout of a single attempt.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Enables logging of the GATT services on connect.
    #[must_use]
    pub const fn log_services(mut self, enabled: bool) -> Self {
        self.log_services = enabled;
        self
    }

    /// Delay before the given retry (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.backoff * attempt
    }
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `attempt` until it succeeds or `config.attempts` are used up.
///
/// Each attempt is bounded by `config.timeout`. Failed attempts are followed
/// by a linear backoff.
pub(crate) async fn retry_connect<F, Fut>(
    config: &ConnectConfig,
    label: &str,
    mut attempt: F,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let attempts = config.attempts.max(1);
    let mut made = 0;
    loop {
        made += 1;
        let result = match tokio::time::timeout(config.timeout, attempt()).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout {
                timeout_ms: u64::try_from(config.timeout.as_millis()).unwrap_or(u64::MAX),
            }),
        };
        match result {
            Ok(()) => return Ok(()),
            Err(e) if made < attempts => {
                let delay = config.delay_for(made);
                tracing::warn!(
                    "{label}: connection attempt {made}/{attempts} failed: {e}, retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Returns `result`, running `disconnect` first if it is an error.
///
/// A failing disconnect is only logged so the original error is kept.
pub(crate) async fn disconnect_on_error<T, F, Fut>(result: Result<T>, disconnect: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    if result.is_err() {
        if let Err(e) = disconnect().await {
            tracing::debug!("disconnect after failed setup also failed: {e}");
        }
    }
    result
}

/// BLE transport for one Ember peripheral.
pub struct BleTransport {
    device: DeviceSlot<DiscoveredMug>,
    config: ConnectConfig,
    connected: Arc<AtomicBool>,
    characteristics: HashMap<Uuid, Characteristic>,
    event_tx: Option<mpsc::Sender<TransportEvent>>,
    tasks: Vec<JoinHandle<()>>,
}

impl BleTransport {
    /// Creates a transport for a discovered mug.
    #[must_use]
    pub fn new(device: DiscoveredMug, config: ConnectConfig) -> Self {
        Self {
            device: DeviceSlot::new(device),
            config,
            connected: Arc::new(AtomicBool::new(false)),
            characteristics: HashMap::new(),
            event_tx: None,
            tasks: Vec::new(),
        }
    }

    fn peripheral(&self) -> &Peripheral {
        &self.device.current().peripheral
    }

    fn adapter(&self) -> &Adapter {
        &self.device.current().adapter
    }

    fn characteristic(&self, uuid: Uuid) -> Result<&Characteristic> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        self.characteristics
            .get(&uuid)
            .ok_or(Error::CharacteristicNotFound { uuid })
    }

    async fn discover_characteristics(&mut self) -> Result<()> {
        self.peripheral().discover_services().await?;
        self.characteristics = self
            .peripheral()
            .characteristics()
            .into_iter()
            .map(|c| (c.uuid, c))
            .collect();

        if self.config.log_services {
            self.log_services();
        }
        Ok(())
    }

    fn log_services(&self) {
        for service in self.peripheral().services() {
            tracing::debug!("[Service] {} (primary: {})", service.uuid, service.primary);
            for characteristic in &service.characteristics {
                tracing::debug!(
                    "\t[Characteristic] {} ({:?})",
                    characteristic.uuid,
                    characteristic.properties
                );
            }
        }
    }

    async fn spawn_tasks(&mut self) -> Result<()> {
        let Some(tx) = self.event_tx.clone() else {
            return Ok(());
        };

        let mut notifications = self.peripheral().notifications().await?;
        let notify_tx = tx.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                let event = TransportEvent::Notification {
                    characteristic: notification.uuid,
                    value: Bytes::from(notification.value),
                };
                if notify_tx.send(event).await.is_err() {
                    tracing::debug!("notification receiver dropped");
                    break;
                }
            }
        }));

        let mut events = self.adapter().events().await?;
        let id = self.peripheral().id();
        let connected = Arc::clone(&self.connected);
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = events.next().await {
                if matches!(event, CentralEvent::DeviceDisconnected(ref disconnected) if *disconnected == id)
                {
                    connected.store(false, Ordering::SeqCst);
                    let _ = tx.send(TransportEvent::Disconnected).await;
                    break;
                }
            }
        }));

        Ok(())
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Transport for BleTransport {
    type Device = DiscoveredMug;

    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            if self.is_connected() {
                return Ok(());
            }

            if self.device.activate_pending() {
                self.characteristics.clear();
                tracing::debug!("switched device to {}", self.describe());
            }

            let label = self.describe();
            tracing::info!("connecting to {label}");
            let peripheral = self.peripheral();
            retry_connect(&self.config, &label, move || async move {
                peripheral.connect().await.map_err(Error::from)
            })
            .await?;

            let discovered = self.discover_characteristics().await;
            let peripheral = self.peripheral();
            disconnect_on_error(discovered, move || async move {
                peripheral.disconnect().await.map_err(Error::from)
            })
            .await?;

            self.connected.store(true, Ordering::SeqCst);
            self.abort_tasks();
            let spawned = self.spawn_tasks().await;
            if spawned.is_err() {
                self.connected.store(false, Ordering::SeqCst);
            }
            let peripheral = self.peripheral();
            disconnect_on_error(spawned, move || async move {
                peripheral.disconnect().await.map_err(Error::from)
            })
            .await?;

            tracing::info!("connected to {label}");
            Ok(())
        })
    }

    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.abort_tasks();
            if self.connected.swap(false, Ordering::SeqCst) {
                tracing::info!("disconnecting from {}", self.describe());
                self.peripheral().disconnect().await?;
            }
            Ok(())
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn read(
        &mut self,
        characteristic: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes>> + Send + '_>> {
        Box::pin(async move {
            let characteristic = self.characteristic(characteristic)?;
            let value = self.peripheral().read(characteristic).await?;
            Ok(Bytes::from(value))
        })
    }

    fn write(
        &mut self,
        characteristic: Uuid,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let characteristic = self.characteristic(characteristic)?;
            self.peripheral()
                .write(characteristic, &data, WriteType::WithResponse)
                .await?;
            Ok(())
        })
    }

    fn start_notify(
        &mut self,
        characteristic: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let characteristic = self.characteristic(characteristic)?;
            self.peripheral().subscribe(characteristic).await?;
            Ok(())
        })
    }

    fn stop_notify(
        &mut self,
        characteristic: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let characteristic = self.characteristic(characteristic)?;
            self.peripheral().unsubscribe(characteristic).await?;
            Ok(())
        })
    }

    fn set_event_sender(&mut self, tx: mpsc::Sender<TransportEvent>) {
        self.event_tx = Some(tx);
    }

    fn describe(&self) -> String {
        self.device.current().to_string()
    }

    fn set_device(&mut self, device: DiscoveredMug) {
        let connected = self.is_connected();
        if connected {
            tracing::debug!("{device} will be used after reconnecting");
        } else {
            self.characteristics.clear();
        }
        self.device.replace(device, connected);
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}

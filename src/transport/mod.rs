//! Transport layer for Ember mug communication.
//!
//! This module provides the abstraction over a GATT connection. The BLE
//! implementation uses btleplug; tests use an in-memory mock.

pub mod ble;
#[cfg(test)]
pub(crate) mod mock;

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

/// Events pushed by a transport outside of request/response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// A subscribed characteristic notified a new value.
    Notification {
        /// Characteristic UUID.
        characteristic: Uuid,
        /// Raw value.
        value: Bytes,
    },
    /// The peripheral dropped the connection.
    Disconnected,
}

/// The device a transport talks to, and a replacement waiting for the next
/// connection.
#[derive(Debug, Clone)]
pub struct DeviceSlot<D> {
    current: D,
    pending: Option<D>,
}

impl<D> DeviceSlot<D> {
    /// Creates a slot holding `device`.
    #[must_use]
    pub const fn new(device: D) -> Self {
        Self {
            current: device,
            pending: None,
        }
    }

    /// The device used by the current or next connection.
    #[must_use]
    pub const fn current(&self) -> &D {
        &self.current
    }

    /// Returns true if a replacement is waiting.
    #[must_use]
    pub const fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Replaces the device. While connected the replacement is parked until
    /// [`activate_pending`](Self::activate_pending).
    pub fn replace(&mut self, device: D, connected: bool) {
        if connected {
            self.pending = Some(device);
        } else {
            self.current = device;
            self.pending = None;
        }
    }

    /// Switches to the parked replacement. Returns true if the device changed.
    pub fn activate_pending(&mut self) -> bool {
        match self.pending.take() {
            Some(device) => {
                self.current = device;
                true
            }
            None => false,
        }
    }
}

/// Trait for transport implementations.
pub trait Transport: Send + Sync {
    /// Handle identifying the peripheral to connect to.
    type Device: Send;

    /// Connects to the device.
    fn connect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Disconnects from the device.
    fn disconnect(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Returns true if connected.
    fn is_connected(&self) -> bool;

    /// Reads a characteristic value.
    fn read(
        &mut self,
        characteristic: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes>> + Send + '_>>;

    /// Writes a characteristic value and waits for the acknowledgement.
    fn write(
        &mut self,
        characteristic: Uuid,
        data: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Subscribes to notifications of a characteristic.
    fn start_notify(
        &mut self,
        characteristic: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Unsubscribes from notifications of a characteristic.
    fn stop_notify(
        &mut self,
        characteristic: Uuid,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Sets the channel receiving notifications and disconnects.
    fn set_event_sender(&mut self, tx: mpsc::Sender<TransportEvent>);

    /// Human readable device label used in logs.
    fn describe(&self) -> String;

    /// Replaces the peripheral used for future connections. An established
    /// connection is not touched.
    fn set_device(&mut self, device: Self::Device);
}

pub use ble::{BleTransport, ConnectConfig};

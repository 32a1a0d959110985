//! # ember-mug
//!
//! A Rust client library for Ember smart mugs.
//!
//! This library provides async communication with Ember mugs, cups, travel
//! mugs and tumblers over Bluetooth Low Energy.
//!
//! ## Features
//!
//! - Async/await based API using Tokio
//! - Push event handling with debounced attribute refreshes
//! - Change tracking and state callbacks
//! - Type-safe attribute encoding and decoding
//!
//! ## Quick Start
//!
//! ```no_run
//! use ember_mug::{EmberMug, MugConfig, ScanConfig, Scanner};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ember_mug::Error> {
//!     // Find a paired mug
//!     let scanner = Scanner::new(ScanConfig::new()).await?;
//!     let Some(device) = scanner.find().await? else {
//!         return Ok(());
//!     };
//!
//!     let mug = EmberMug::from_device(device, MugConfig::new());
//!     mug.update_all().await?;
//!
//!     for (label, value) in mug.data().formatted_rows() {
//!         println!("{label}: {value}");
//!     }
//!
//!     mug.set_target_temp(55.0).await?;
//!     mug.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Characteristic UUIDs, push events and payload codecs
//! - [`types`] - Attribute values, models and the aggregated mug state
//! - [`transport`] - Transport abstraction and the btleplug implementation
//! - [`scanner`] - Finding mugs by advertisement
//! - [`event`] - Async event system and state callbacks
//! - [`commands`] - Command handler for GATT operations
//! - [`client`] - High-level [`EmberMug`] session

pub mod client;
pub mod commands;
pub mod error;
pub mod event;
pub mod protocol;
pub mod scanner;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{EmberMug, MugConfig};
pub use error::{DecodeError, Error, Result};
pub use event::{CallbackHandle, Event, EventDispatcher, EventFilter, MugCallback, Subscription};
pub use protocol::{MugCharacteristic, PushEvent};
pub use scanner::{AdvertisementInfo, DiscoveredMug, ScanConfig, Scanner};
pub use transport::{BleTransport, ConnectConfig, Transport, TransportEvent};
pub use types::{
    Attribute, AttributeValue, BatteryInfo, Change, Colour, DeviceKind, LiquidState, Model,
    MugData, MugFirmwareInfo, MugMeta, TemperatureUnit, VolumeLevel,
};

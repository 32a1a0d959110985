//! Data types for mug state.
//!
//! This module contains the core data structures used throughout the library:
//! - Attribute values (battery, colour, firmware, identity)
//! - Units and states
//! - Device models and their attribute sets
//! - The aggregated [`MugData`] state and [`Change`] tracking

pub mod data;
pub mod model;
pub mod mug;
pub mod units;

pub use data::{Attribute, AttributeValue, Change, MAX_LIQUID_LEVEL, MugData};
pub use model::{DeviceKind, Model};
pub use mug::{BatteryInfo, Colour, MugFirmwareInfo, MugMeta};
pub use units::{LiquidState, TemperatureUnit, VolumeLevel};

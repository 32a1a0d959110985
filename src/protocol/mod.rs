//! Protocol definitions for Ember mug communication.
//!
//! This module contains the low-level protocol types including:
//! - GATT characteristic UUIDs
//! - Push event ids
//! - Attribute payload decoding and encoding

pub mod characteristic;
pub mod parser;
pub mod push_event;

pub use characteristic::MugCharacteristic;
pub use push_event::PushEvent;

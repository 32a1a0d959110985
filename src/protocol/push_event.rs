//! Push event definitions.
//!
//! The mug notifies on the `PUSH_EVENT` characteristic with a single byte
//! naming what changed. The payload never carries the new value, so each
//! event only tells us which attribute to read again.

use crate::types::Attribute;

/// Push events sent by the mug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PushEvent {
    /// Battery level should be refreshed.
    RefreshBatteryLevel = 0x01,
    /// Mug placed on the charging coaster.
    ChargerConnected = 0x02,
    /// Mug lifted from the charging coaster.
    ChargerDisconnected = 0x03,
    /// Target temperature changed.
    TargetTemperatureChanged = 0x04,
    /// Drink temperature changed.
    DrinkTemperatureChanged = 0x05,
    /// Mug has no auth info for this client.
    AuthInfoNotFound = 0x06,
    /// Liquid level changed.
    LiquidLevelChanged = 0x07,
    /// Liquid state changed.
    LiquidStateChanged = 0x08,
    /// Battery voltage state changed.
    BatteryVoltageStateChanged = 0x09,
}

impl PushEvent {
    /// Attempts to parse a push event from its id byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(Self::RefreshBatteryLevel),
            0x02 => Some(Self::ChargerConnected),
            0x03 => Some(Self::ChargerDisconnected),
            0x04 => Some(Self::TargetTemperatureChanged),
            0x05 => Some(Self::DrinkTemperatureChanged),
            0x06 => Some(Self::AuthInfoNotFound),
            0x07 => Some(Self::LiquidLevelChanged),
            0x08 => Some(Self::LiquidStateChanged),
            0x09 => Some(Self::BatteryVoltageStateChanged),
            _ => None,
        }
    }

    /// Returns the attribute that has to be read again after this event.
    #[must_use]
    pub const fn invalidates(&self) -> Option<Attribute> {
        match self {
            Self::RefreshBatteryLevel | Self::ChargerConnected | Self::ChargerDisconnected => {
                Some(Attribute::Battery)
            }
            Self::TargetTemperatureChanged => Some(Attribute::TargetTemp),
            Self::DrinkTemperatureChanged => Some(Attribute::CurrentTemp),
            Self::LiquidLevelChanged => Some(Attribute::LiquidLevel),
            Self::LiquidStateChanged => Some(Attribute::LiquidState),
            Self::BatteryVoltageStateChanged => Some(Attribute::BatteryVoltage),
            Self::AuthInfoNotFound => None,
        }
    }
}

impl From<PushEvent> for u8 {
    fn from(event: PushEvent) -> Self {
        event as Self
    }
}

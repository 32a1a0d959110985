//! GATT characteristic table for Ember mugs.
//!
//! Every Ember characteristic and service shares one 128-bit base UUID;
//! only the 16-bit id in the first group differs.

use std::fmt;

use uuid::Uuid;

/// Base UUID with the 16-bit id masked out (`fc54XXXX-236c-4c94-8fa9-944a3e5353fa`).
const BASE_UUID: u128 = 0xfc54_0000_236c_4c94_8fa9_944a_3e53_53fa;

/// Mug characteristics and services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum MugCharacteristic {
    /// Mug name as a UTF-8 string (read/write).
    MugName = 0x01,
    /// Current drink temperature (read).
    CurrentTemperature = 0x02,
    /// Target temperature (read/write).
    TargetTemperature = 0x03,
    /// Display unit, 0 for Celsius and 1 for Fahrenheit (read/write).
    TemperatureUnit = 0x04,
    /// Liquid level, 0-30 (read).
    LiquidLevel = 0x05,
    /// Clock and timezone offset (read/write).
    DateTimeAndZone = 0x06,
    /// Battery percent and charging flag (read).
    Battery = 0x07,
    /// Liquid state (read).
    LiquidState = 0x08,
    /// Volume level, travel mug only (read/write).
    Volume = 0x09,
    /// Firmware, hardware and bootloader versions (read).
    Firmware = 0x0C,
    /// Mug id and serial number (read).
    MugId = 0x0D,
    /// Device secret key (read).
    Dsk = 0x0E,
    /// User device secret key (read/write).
    Udsk = 0x0F,
    /// Control register address (write).
    ControlRegisterAddress = 0x10,
    /// Control register data, first byte is battery voltage (read).
    ControlRegisterData = 0x11,
    /// Push events (notify).
    PushEvent = 0x12,
    /// Statistics (notify).
    Statistics = 0x13,
    /// LED colour, RGBA (read/write).
    Led = 0x14,

    /// Primary service of the ceramic mug and cup.
    StandardService = 0x3621,
    /// Primary service of the travel mug.
    TravelMugService = 0x3622,
}

impl MugCharacteristic {
    /// Returns the 16-bit id of this characteristic.
    #[must_use]
    pub const fn id(self) -> u16 {
        self as u16
    }

    /// Returns the full 128-bit UUID.
    #[must_use]
    pub const fn uuid(self) -> Uuid {
        Uuid::from_u128(BASE_UUID | ((self as u128) << 96))
    }

    /// Looks up a characteristic by its UUID.
    #[must_use]
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        ALL.iter().copied().find(|c| c.uuid() == uuid)
    }

    /// Returns the characteristic name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MugName => "MUG_NAME",
            Self::CurrentTemperature => "CURRENT_TEMPERATURE",
            Self::TargetTemperature => "TARGET_TEMPERATURE",
            Self::TemperatureUnit => "TEMPERATURE_UNIT",
            Self::LiquidLevel => "LIQUID_LEVEL",
            Self::DateTimeAndZone => "DATE_TIME_AND_ZONE",
            Self::Battery => "BATTERY",
            Self::LiquidState => "LIQUID_STATE",
            Self::Volume => "VOLUME",
            Self::Firmware => "FIRMWARE",
            Self::MugId => "MUG_ID",
            Self::Dsk => "DSK",
            Self::Udsk => "UDSK",
            Self::ControlRegisterAddress => "CONTROL_REGISTER_ADDRESS",
            Self::ControlRegisterData => "CONTROL_REGISTER_DATA",
            Self::PushEvent => "PUSH_EVENT",
            Self::Statistics => "STATISTICS",
            Self::Led => "LED",
            Self::StandardService => "STANDARD_SERVICE",
            Self::TravelMugService => "TRAVEL_MUG_SERVICE",
        }
    }
}

impl fmt::Display for MugCharacteristic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<MugCharacteristic> for Uuid {
    fn from(characteristic: MugCharacteristic) -> Self {
        characteristic.uuid()
    }
}

const ALL: [MugCharacteristic; 20] = [
    MugCharacteristic::MugName,
    MugCharacteristic::CurrentTemperature,
    MugCharacteristic::TargetTemperature,
    MugCharacteristic::TemperatureUnit,
    MugCharacteristic::LiquidLevel,
    MugCharacteristic::DateTimeAndZone,
    MugCharacteristic::Battery,
    MugCharacteristic::LiquidState,
    MugCharacteristic::Volume,
    MugCharacteristic::Firmware,
    MugCharacteristic::MugId,
    MugCharacteristic::Dsk,
    MugCharacteristic::Udsk,
    MugCharacteristic::ControlRegisterAddress,
    MugCharacteristic::ControlRegisterData,
    MugCharacteristic::PushEvent,
    MugCharacteristic::Statistics,
    MugCharacteristic::Led,
    MugCharacteristic::StandardService,
    MugCharacteristic::TravelMugService,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_characteristic_uuid() {
        assert_eq!(
            MugCharacteristic::MugName.uuid().to_string(),
            "fc540001-236c-4c94-8fa9-944a3e5353fa"
        );
        assert_eq!(
            MugCharacteristic::PushEvent.uuid().to_string(),
            "fc540012-236c-4c94-8fa9-944a3e5353fa"
        );
        assert_eq!(
            MugCharacteristic::StandardService.uuid().to_string(),
            "fc543621-236c-4c94-8fa9-944a3e5353fa"
        );
    }

    #[test]
    fn test_from_uuid() {
        let uuid = MugCharacteristic::Led.uuid();
        assert_eq!(MugCharacteristic::from_uuid(uuid), Some(MugCharacteristic::Led));
        assert_eq!(MugCharacteristic::from_uuid(Uuid::nil()), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            MugCharacteristic::TargetTemperature.to_string(),
            "TARGET_TEMPERATURE"
        );
    }
}

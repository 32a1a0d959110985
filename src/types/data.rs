//! Mug state and change tracking.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::Error;
use crate::types::model::Model;
use crate::types::mug::{BatteryInfo, Colour, MugFirmwareInfo, MugMeta};
use crate::types::units::{LiquidState, TemperatureUnit, VolumeLevel};

/// Highest raw liquid level reported by the mug.
pub const MAX_LIQUID_LEVEL: u8 = 30;

/// A readable mug attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    /// Mug name.
    Name,
    /// Mug id and serial number.
    Meta,
    /// Battery status.
    Battery,
    /// Firmware versions.
    Firmware,
    /// LED colour.
    LedColour,
    /// Raw liquid level.
    LiquidLevel,
    /// Liquid state.
    LiquidState,
    /// Display unit.
    TemperatureUnit,
    /// Drink temperature.
    CurrentTemp,
    /// Target temperature.
    TargetTemp,
    /// Device secret key.
    Dsk,
    /// User device secret key.
    Udsk,
    /// Mug clock.
    DateTimeZone,
    /// Battery voltage.
    BatteryVoltage,
    /// Travel mug volume.
    VolumeLevel,
}

impl Attribute {
    /// All attributes, in display order.
    pub const ALL: [Self; 15] = [
        Self::Name,
        Self::Meta,
        Self::Battery,
        Self::Firmware,
        Self::LedColour,
        Self::LiquidLevel,
        Self::LiquidState,
        Self::TemperatureUnit,
        Self::CurrentTemp,
        Self::TargetTemp,
        Self::Dsk,
        Self::Udsk,
        Self::DateTimeZone,
        Self::BatteryVoltage,
        Self::VolumeLevel,
    ];

    /// Snake-case key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Meta => "meta",
            Self::Battery => "battery",
            Self::Firmware => "firmware",
            Self::LedColour => "led_colour",
            Self::LiquidLevel => "liquid_level",
            Self::LiquidState => "liquid_state",
            Self::TemperatureUnit => "temperature_unit",
            Self::CurrentTemp => "current_temp",
            Self::TargetTemp => "target_temp",
            Self::Dsk => "dsk",
            Self::Udsk => "udsk",
            Self::DateTimeZone => "date_time_zone",
            Self::BatteryVoltage => "battery_voltage",
            Self::VolumeLevel => "volume_level",
        }
    }

    /// Kebab-case key used on the command line.
    #[must_use]
    pub fn cli_key(self) -> String {
        self.key().replace('_', "-")
    }

    /// Human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Name => "Mug Name",
            Self::Meta => "Meta",
            Self::Battery => "Battery",
            Self::Firmware => "Firmware",
            Self::LedColour => "LED Colour",
            Self::LiquidLevel => "Liquid Level",
            Self::LiquidState => "Liquid State",
            Self::TemperatureUnit => "Temperature Unit",
            Self::CurrentTemp => "Current Temp",
            Self::TargetTemp => "Target Temp",
            Self::Dsk => "DSK",
            Self::Udsk => "UDSK",
            Self::DateTimeZone => "Date Time + Time Zone",
            Self::BatteryVoltage => "Voltage",
            Self::VolumeLevel => "Volume Level",
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Attribute {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|a| a.key() == key)
            .ok_or_else(|| Error::InvalidArgument {
                reason: format!("unknown attribute '{s}'"),
            })
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Mug name.
    Name(String),
    /// Mug id and serial number.
    Meta(MugMeta),
    /// Battery status.
    Battery(BatteryInfo),
    /// Firmware versions.
    Firmware(MugFirmwareInfo),
    /// LED colour.
    LedColour(Colour),
    /// Raw liquid level (0-30).
    LiquidLevel(u8),
    /// Liquid state.
    LiquidState(LiquidState),
    /// Display unit.
    TemperatureUnit(TemperatureUnit),
    /// Drink temperature in the session's unit.
    CurrentTemp(f32),
    /// Target temperature in the session's unit.
    TargetTemp(f32),
    /// Device secret key, base64.
    Dsk(String),
    /// User device secret key, base64.
    Udsk(String),
    /// Mug clock, `None` when unset.
    DateTimeZone(Option<DateTime<Utc>>),
    /// Battery voltage.
    BatteryVoltage(u8),
    /// Travel mug volume, `None` when it could not be read.
    VolumeLevel(Option<VolumeLevel>),
}

impl AttributeValue {
    /// Returns the attribute this value belongs to.
    #[must_use]
    pub const fn attribute(&self) -> Attribute {
        match self {
            Self::Name(_) => Attribute::Name,
            Self::Meta(_) => Attribute::Meta,
            Self::Battery(_) => Attribute::Battery,
            Self::Firmware(_) => Attribute::Firmware,
            Self::LedColour(_) => Attribute::LedColour,
            Self::LiquidLevel(_) => Attribute::LiquidLevel,
            Self::LiquidState(_) => Attribute::LiquidState,
            Self::TemperatureUnit(_) => Attribute::TemperatureUnit,
            Self::CurrentTemp(_) => Attribute::CurrentTemp,
            Self::TargetTemp(_) => Attribute::TargetTemp,
            Self::Dsk(_) => Attribute::Dsk,
            Self::Udsk(_) => Attribute::Udsk,
            Self::DateTimeZone(_) => Attribute::DateTimeZone,
            Self::BatteryVoltage(_) => Attribute::BatteryVoltage,
            Self::VolumeLevel(_) => Attribute::VolumeLevel,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(v) | Self::Dsk(v) | Self::Udsk(v) => f.write_str(v),
            Self::Meta(v) => write!(f, "{v}"),
            Self::Battery(v) => write!(f, "{v}"),
            Self::Firmware(v) => write!(f, "{v}"),
            Self::LedColour(v) => write!(f, "{v}"),
            Self::LiquidLevel(v) | Self::BatteryVoltage(v) => write!(f, "{v}"),
            Self::LiquidState(v) => write!(f, "{v}"),
            Self::TemperatureUnit(v) => write!(f, "{v}"),
            Self::CurrentTemp(v) | Self::TargetTemp(v) => write!(f, "{v:.2}"),
            Self::DateTimeZone(Some(v)) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S %Z")),
            Self::VolumeLevel(Some(v)) => write!(f, "{v}"),
            Self::DateTimeZone(None) | Self::VolumeLevel(None) => Ok(()),
        }
    }
}

/// A detected change in one attribute.
#[derive(Debug, Clone, PartialEq)]
pub struct Change {
    /// Attribute that changed.
    pub attribute: Attribute,
    /// Previous value, `None` if it was never read.
    pub old: Option<AttributeValue>,
    /// New value.
    pub new: AttributeValue,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let old = self.old.as_ref().map(ToString::to_string).unwrap_or_default();
        write!(
            f,
            "{} changed from \"{old}\" to \"{}\"",
            self.attribute.label(),
            self.new
        )
    }
}

/// Last known state of a mug.
#[derive(Debug, Clone, Default)]
pub struct MugData {
    /// Device model.
    pub model: Model,
    /// Temperatures are in Celsius when true, Fahrenheit otherwise.
    pub use_metric: bool,
    /// Mug name.
    pub name: Option<String>,
    /// Mug id and serial number.
    pub meta: Option<MugMeta>,
    /// Battery status.
    pub battery: Option<BatteryInfo>,
    /// Firmware versions.
    pub firmware: Option<MugFirmwareInfo>,
    /// LED colour.
    pub led_colour: Option<Colour>,
    /// Raw liquid level.
    pub liquid_level: Option<u8>,
    /// Liquid state.
    pub liquid_state: Option<LiquidState>,
    /// Display unit configured on the mug.
    pub temperature_unit: Option<TemperatureUnit>,
    /// Drink temperature.
    pub current_temp: Option<f32>,
    /// Target temperature.
    pub target_temp: Option<f32>,
    /// Device secret key.
    pub dsk: Option<String>,
    /// User device secret key.
    pub udsk: Option<String>,
    /// Mug clock. Outer `None` means never read.
    pub date_time_zone: Option<Option<DateTime<Utc>>>,
    /// Battery voltage.
    pub battery_voltage: Option<u8>,
    /// Travel mug volume. Outer `None` means never read.
    pub volume_level: Option<Option<VolumeLevel>>,
}

impl MugData {
    /// Creates empty state for a model.
    #[must_use]
    pub fn new(model: Model, use_metric: bool) -> Self {
        Self {
            model,
            use_metric,
            ..Self::default()
        }
    }

    /// Unit of the stored temperatures.
    #[must_use]
    pub const fn unit(&self) -> TemperatureUnit {
        TemperatureUnit::for_metric(self.use_metric)
    }

    /// Returns the stored value of an attribute.
    #[must_use]
    pub fn get(&self, attribute: Attribute) -> Option<AttributeValue> {
        match attribute {
            Attribute::Name => self.name.clone().map(AttributeValue::Name),
            Attribute::Meta => self.meta.clone().map(AttributeValue::Meta),
            Attribute::Battery => self.battery.map(AttributeValue::Battery),
            Attribute::Firmware => self.firmware.map(AttributeValue::Firmware),
            Attribute::LedColour => self.led_colour.map(AttributeValue::LedColour),
            Attribute::LiquidLevel => self.liquid_level.map(AttributeValue::LiquidLevel),
            Attribute::LiquidState => self.liquid_state.map(AttributeValue::LiquidState),
            Attribute::TemperatureUnit => {
                self.temperature_unit.map(AttributeValue::TemperatureUnit)
            }
            Attribute::CurrentTemp => self.current_temp.map(AttributeValue::CurrentTemp),
            Attribute::TargetTemp => self.target_temp.map(AttributeValue::TargetTemp),
            Attribute::Dsk => self.dsk.clone().map(AttributeValue::Dsk),
            Attribute::Udsk => self.udsk.clone().map(AttributeValue::Udsk),
            Attribute::DateTimeZone => self.date_time_zone.map(AttributeValue::DateTimeZone),
            Attribute::BatteryVoltage => self.battery_voltage.map(AttributeValue::BatteryVoltage),
            Attribute::VolumeLevel => self.volume_level.map(AttributeValue::VolumeLevel),
        }
    }

    /// Stores a value and returns the change if it differs from the old one.
    pub fn set(&mut self, value: AttributeValue) -> Option<Change> {
        let attribute = value.attribute();
        let old = self.get(attribute);
        if old.as_ref() == Some(&value) {
            return None;
        }
        match value.clone() {
            AttributeValue::Name(v) => self.name = Some(v),
            AttributeValue::Meta(v) => self.meta = Some(v),
            AttributeValue::Battery(v) => self.battery = Some(v),
            AttributeValue::Firmware(v) => self.firmware = Some(v),
            AttributeValue::LedColour(v) => self.led_colour = Some(v),
            AttributeValue::LiquidLevel(v) => self.liquid_level = Some(v),
            AttributeValue::LiquidState(v) => self.liquid_state = Some(v),
            AttributeValue::TemperatureUnit(v) => self.temperature_unit = Some(v),
            AttributeValue::CurrentTemp(v) => self.current_temp = Some(v),
            AttributeValue::TargetTemp(v) => self.target_temp = Some(v),
            AttributeValue::Dsk(v) => self.dsk = Some(v),
            AttributeValue::Udsk(v) => self.udsk = Some(v),
            AttributeValue::DateTimeZone(v) => self.date_time_zone = Some(v),
            AttributeValue::BatteryVoltage(v) => self.battery_voltage = Some(v),
            AttributeValue::VolumeLevel(v) => self.volume_level = Some(v),
        }
        Some(Change {
            attribute,
            old,
            new: value,
        })
    }

    /// Stores several values and returns the ones that changed.
    pub fn update(&mut self, values: impl IntoIterator<Item = AttributeValue>) -> Vec<Change> {
        values.into_iter().filter_map(|v| self.set(v)).collect()
    }

    /// Liquid level as a percentage of a full mug.
    #[must_use]
    pub fn liquid_level_percent(&self) -> Option<f32> {
        self.liquid_level
            .map(|level| f32::from(level) / f32::from(MAX_LIQUID_LEVEL) * 100.0)
    }

    /// Returns the display text of an attribute, empty when unknown.
    #[must_use]
    pub fn formatted(&self, attribute: Attribute) -> String {
        match attribute {
            Attribute::CurrentTemp | Attribute::TargetTemp => {
                let temp = if attribute == Attribute::CurrentTemp {
                    self.current_temp
                } else {
                    self.target_temp
                };
                temp.map(|t| format!("{t:.2}{}", self.unit()))
                    .unwrap_or_default()
            }
            Attribute::LiquidLevel => self
                .liquid_level_percent()
                .map(|p| format!("{p:.2}%"))
                .unwrap_or_default(),
            other => self
                .get(other)
                .map(|v| v.to_string())
                .unwrap_or_default(),
        }
    }

    /// Attributes the model exposes, in display order, with their labels and
    /// display text.
    #[must_use]
    pub fn formatted_rows(&self) -> Vec<(&'static str, String)> {
        Attribute::ALL
            .into_iter()
            .filter(|a| self.model.supports(*a))
            .filter(|a| {
                self.model.include_extra || !crate::types::model::EXTRA_ATTRIBUTES.contains(a)
            })
            .map(|a| (a.label(), self.formatted(a)))
            .collect()
    }
}

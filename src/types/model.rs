//! Device model detection and per-model attribute sets.

use std::collections::BTreeSet;
use std::fmt;

use crate::types::Attribute;

/// Advertised name of the ceramic mug.
pub const EMBER_MUG: &str = "Ember Ceramic Mug";
/// Advertised name of the cup.
pub const EMBER_CUP: &str = "Ember Cup";
/// Advertised name of the travel mug.
pub const EMBER_TRAVEL_MUG: &str = "Ember Travel Mug";
/// Advertised name of the tumbler.
pub const EMBER_TUMBLER: &str = "Ember Tumbler";
/// Name used when the peripheral does not advertise one.
pub const DEFAULT_NAME: &str = "EMBER";

/// Attributes that rarely change and are read once after connecting.
pub const INITIAL_ATTRIBUTES: [Attribute; 8] = [
    Attribute::Meta,
    Attribute::Firmware,
    Attribute::Udsk,
    Attribute::Dsk,
    Attribute::LedColour,
    Attribute::Name,
    Attribute::VolumeLevel,
    Attribute::TemperatureUnit,
];

/// Attributes read on every full update.
pub const UPDATE_ATTRIBUTES: [Attribute; 13] = [
    Attribute::LedColour,
    Attribute::CurrentTemp,
    Attribute::TargetTemp,
    Attribute::TemperatureUnit,
    Attribute::LiquidLevel,
    Attribute::DateTimeZone,
    Attribute::Battery,
    Attribute::LiquidState,
    Attribute::Name,
    Attribute::VolumeLevel,
    Attribute::BatteryVoltage,
    Attribute::Udsk,
    Attribute::Dsk,
];

/// Diagnostic attributes, only read when extras are enabled.
pub const EXTRA_ATTRIBUTES: [Attribute; 4] = [
    Attribute::BatteryVoltage,
    Attribute::DateTimeZone,
    Attribute::Udsk,
    Attribute::Dsk,
];

/// Kind of Ember device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Ceramic mug (default).
    #[default]
    Mug,
    /// Cup.
    Cup,
    /// Travel mug.
    TravelMug,
    /// Tumbler.
    Tumbler,
}

impl DeviceKind {
    /// Detects the kind from the advertised name.
    #[must_use]
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            EMBER_CUP => Self::Cup,
            EMBER_TRAVEL_MUG => Self::TravelMug,
            EMBER_TUMBLER => Self::Tumbler,
            _ => Self::Mug,
        }
    }
}

/// Device model, fixed for the lifetime of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    /// Advertised name.
    pub name: String,
    /// Detected kind.
    pub kind: DeviceKind,
    /// Whether diagnostic attributes are read.
    pub include_extra: bool,
}

impl Model {
    /// Creates a model from the advertised name.
    #[must_use]
    pub fn new(name: impl Into<String>, include_extra: bool) -> Self {
        let name = name.into();
        let kind = DeviceKind::from_name(&name);
        Self {
            name,
            kind,
            include_extra,
        }
    }

    /// Returns true for the travel mug.
    #[must_use]
    pub fn is_travel_mug(&self) -> bool {
        self.kind == DeviceKind::TravelMug
    }

    /// Returns true if this model exposes the attribute at all.
    #[must_use]
    pub fn supports(&self, attribute: Attribute) -> bool {
        match attribute {
            Attribute::VolumeLevel => self.is_travel_mug(),
            _ => true,
        }
    }

    /// Attributes read once after connecting.
    #[must_use]
    pub fn initial_attributes(&self) -> BTreeSet<Attribute> {
        self.filter(&INITIAL_ATTRIBUTES)
    }

    /// Attributes read on every full update.
    #[must_use]
    pub fn update_attributes(&self) -> BTreeSet<Attribute> {
        self.filter(&UPDATE_ATTRIBUTES)
    }

    fn filter(&self, attributes: &[Attribute]) -> BTreeSet<Attribute> {
        attributes
            .iter()
            .copied()
            .filter(|a| self.include_extra || !EXTRA_ATTRIBUTES.contains(a))
            .filter(|a| self.supports(*a))
            .collect()
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new(DEFAULT_NAME, false)
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_from_name() {
        assert_eq!(DeviceKind::from_name(EMBER_MUG), DeviceKind::Mug);
        assert_eq!(DeviceKind::from_name(EMBER_TRAVEL_MUG), DeviceKind::TravelMug);
        assert_eq!(DeviceKind::from_name(EMBER_CUP), DeviceKind::Cup);
        assert_eq!(DeviceKind::from_name(DEFAULT_NAME), DeviceKind::Mug);
    }

    #[test]
    fn test_initial_attributes_without_extra() {
        let model = Model::new(EMBER_MUG, false);
        let attributes = model.initial_attributes();
        assert!(attributes.contains(&Attribute::Meta));
        assert!(attributes.contains(&Attribute::Name));
        assert!(!attributes.contains(&Attribute::Udsk));
        assert!(!attributes.contains(&Attribute::Dsk));
        assert!(!attributes.contains(&Attribute::VolumeLevel));
    }

    #[test]
    fn test_update_attributes_with_extra() {
        let model = Model::new(EMBER_MUG, true);
        let attributes = model.update_attributes();
        assert!(attributes.contains(&Attribute::BatteryVoltage));
        assert!(attributes.contains(&Attribute::DateTimeZone));
        assert_eq!(attributes.len(), UPDATE_ATTRIBUTES.len() - 1);
    }

    #[test]
    fn test_travel_mug_reads_volume() {
        let model = Model::new(EMBER_TRAVEL_MUG, false);
        assert!(model.is_travel_mug());
        assert!(model.update_attributes().contains(&Attribute::VolumeLevel));
        assert!(model.initial_attributes().contains(&Attribute::VolumeLevel));
    }
}

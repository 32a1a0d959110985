//! Enumerated mug settings and states.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Temperature unit shown on the mug and in the app.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TemperatureUnit {
    /// Degrees Celsius.
    #[default]
    Celsius,
    /// Degrees Fahrenheit.
    Fahrenheit,
}

impl TemperatureUnit {
    /// Parses the unit from its wire byte. Anything non-zero is Fahrenheit.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        if byte == 0 {
            Self::Celsius
        } else {
            Self::Fahrenheit
        }
    }

    /// Encodes the unit to its wire byte.
    #[must_use]
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Celsius => 0,
            Self::Fahrenheit => 1,
        }
    }

    /// Returns the unit for a metric or imperial session.
    #[must_use]
    pub const fn for_metric(use_metric: bool) -> Self {
        if use_metric {
            Self::Celsius
        } else {
            Self::Fahrenheit
        }
    }

    /// Returns the unit symbol.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for TemperatureUnit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "C" | "c" | "°C" | "celsius" => Ok(Self::Celsius),
            "F" | "f" | "°F" | "fahrenheit" => Ok(Self::Fahrenheit),
            other => Err(Error::InvalidArgument {
                reason: format!("unknown temperature unit '{other}'"),
            }),
        }
    }
}

/// What the mug thinks is happening to the drink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LiquidState {
    /// State not reported.
    #[default]
    Unknown = 0,
    /// No liquid.
    Empty = 1,
    /// Being filled.
    Filling = 2,
    /// Cold, heater idle.
    ColdNoControl = 3,
    /// Cooling down to target.
    Cooling = 4,
    /// Heating up to target.
    Heating = 5,
    /// At target temperature.
    TargetTemperature = 6,
    /// Warm, heater idle.
    WarmNoControl = 7,
}

impl LiquidState {
    /// Parses the state from its wire byte.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Self {
        match byte {
            1 => Self::Empty,
            2 => Self::Filling,
            3 => Self::ColdNoControl,
            4 => Self::Cooling,
            5 => Self::Heating,
            6 => Self::TargetTemperature,
            7 => Self::WarmNoControl,
            _ => Self::Unknown,
        }
    }

    /// Returns the human readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Empty => "Empty",
            Self::Filling => "Filling",
            Self::ColdNoControl => "Cold (No control)",
            Self::Cooling => "Cooling",
            Self::Heating => "Heating",
            Self::TargetTemperature => "Perfect",
            Self::WarmNoControl => "Warm (No control)",
        }
    }
}

impl fmt::Display for LiquidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Speaker volume of the travel mug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VolumeLevel {
    /// Quiet.
    Low,
    /// Medium.
    Medium,
    /// Loud.
    High,
}

impl VolumeLevel {
    /// All levels, quietest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// Parses the level from its wire state.
    #[must_use]
    pub const fn from_state(state: u8) -> Option<Self> {
        match state {
            0 => Some(Self::Low),
            1 => Some(Self::Medium),
            2 => Some(Self::High),
            _ => None,
        }
    }

    /// Returns the wire state.
    #[must_use]
    pub const fn state(self) -> u8 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
        }
    }

    /// Returns the lower-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for VolumeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VolumeLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(state) = trimmed.parse::<u8>() {
            return Self::from_state(state).ok_or_else(|| Error::InvalidArgument {
                reason: "Volume level must be between 0 and 2 inclusively".into(),
            });
        }
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| Error::InvalidArgument {
                reason: format!("unknown volume level '{trimmed}'"),
            })
    }
}

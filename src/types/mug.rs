//! Composite values read from the mug.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

/// Battery status.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatteryInfo {
    /// Charge in percent.
    pub percent: f32,
    /// True while the mug sits on its charging coaster.
    pub on_charging_base: bool,
}

impl fmt::Display for BatteryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let base = if self.on_charging_base {
            "on charging base"
        } else {
            "not on charging base"
        };
        write!(f, "{:.1}%, {base}", self.percent)
    }
}

/// LED colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Colour {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
    /// Alpha channel. The mug expects 255 on writes.
    pub a: u8,
}

impl Colour {
    /// Creates an opaque colour.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Creates a colour with explicit alpha.
    #[must_use]
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the same colour with alpha forced to 255.
    #[must_use]
    pub const fn opaque(self) -> Self {
        Self::rgb(self.r, self.g, self.b)
    }

    /// Returns the colour as `#rrggbb`.
    #[must_use]
    pub fn as_hex(&self) -> String {
        format!("#{}", hex::encode([self.r, self.g, self.b]))
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_hex())
    }
}

impl FromStr for Colour {
    type Err = Error;

    /// Parses `#rrggbb`, `rrggbb` or `r,g,b[,a]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        let invalid = || Error::InvalidArgument {
            reason: format!("\"{value}\" is not a valid rgba or hex colour"),
        };

        let hex_part = value.strip_prefix('#').unwrap_or(value);
        if hex_part.len() == 6 && hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
            let bytes = hex::decode(hex_part).map_err(|_| invalid())?;
            return Ok(Self::rgb(bytes[0], bytes[1], bytes[2]));
        }

        if !value.contains(',') {
            return Err(invalid());
        }
        let parts = value
            .split(',')
            .map(|part| part.trim().parse::<i64>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| invalid())?;
        if !(3..=4).contains(&parts.len()) {
            return Err(Error::InvalidArgument {
                reason: "Three or four values should be specified for colour".into(),
            });
        }
        let channels = parts
            .iter()
            .map(|&c| u8::try_from(c))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::InvalidArgument {
                reason: "Colour values must be between 0 and 255".into(),
            })?;
        Ok(Self::rgba(
            channels[0],
            channels[1],
            channels[2],
            channels.get(3).copied().unwrap_or(255),
        ))
    }
}

/// Mug identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MugMeta {
    /// Base64 mug id.
    pub mug_id: String,
    /// Serial number.
    pub serial_number: String,
}

impl fmt::Display for MugMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mug ID: {}, Serial Number: {}",
            self.mug_id, self.serial_number
        )
    }
}

/// Firmware information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MugFirmwareInfo {
    /// Firmware version.
    pub version: u16,
    /// Hardware revision.
    pub hardware: u16,
    /// Bootloader version.
    pub bootloader: u16,
}

impl fmt::Display for MugFirmwareInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Version: {}, Hardware: {}, Bootloader: {}",
            self.version, self.hardware, self.bootloader
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_battery_display() {
        let battery = BatteryInfo {
            percent: 53.0,
            on_charging_base: true,
        };
        assert_eq!(battery.to_string(), "53.0%, on charging base");

        let battery = BatteryInfo {
            percent: 7.5,
            on_charging_base: false,
        };
        assert_eq!(battery.to_string(), "7.5%, not on charging base");
    }

    #[test]
    fn test_colour_hex() {
        assert_eq!(Colour::rgb(244, 0, 161).as_hex(), "#f400a1");
        assert_eq!(Colour::rgba(1, 2, 3, 4).opaque().a, 255);
    }

    #[test]
    fn test_colour_parse_hex() {
        assert_eq!("#f400a1".parse::<Colour>().unwrap(), Colour::rgb(244, 0, 161));
        assert_eq!("F400A1".parse::<Colour>().unwrap(), Colour::rgb(244, 0, 161));
    }

    #[test]
    fn test_colour_parse_rgba() {
        assert_eq!("1, 2, 3".parse::<Colour>().unwrap(), Colour::rgb(1, 2, 3));
        assert_eq!("1,2,3,4".parse::<Colour>().unwrap(), Colour::rgba(1, 2, 3, 4));
        assert!("1,2".parse::<Colour>().is_err());
        assert!("1,2,300".parse::<Colour>().is_err());
        assert!("purple".parse::<Colour>().is_err());
    }

    #[test]
    fn test_firmware_display() {
        let firmware = MugFirmwareInfo {
            version: 355,
            hardware: 128,
            bootloader: 18,
        };
        assert_eq!(
            firmware.to_string(),
            "Version: 355, Hardware: 128, Bootloader: 18"
        );
    }
}

//! Attribute payload decoding and encoding.
//!
//! Decoders turn raw characteristic values into typed values; encoders build
//! the exact payloads the mug expects on writes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, Utc};
use data_encoding::BASE64;

use crate::error::{DecodeError, Error, Result};
use crate::protocol::MugCharacteristic;
use crate::types::{
    BatteryInfo, Colour, LiquidState, MugFirmwareInfo, MugMeta, TemperatureUnit, VolumeLevel,
};

/// Temperatures travel as hundredths of a degree Celsius.
const TEMP_SCALE: f32 = 100.0;

/// Longest name the mug accepts.
pub const MAX_NAME_LEN: usize = 16;

/// Punctuation allowed in a mug name besides ASCII letters, digits and space.
const NAME_PUNCTUATION: &str = ",.[]#()!\"';:|-_+<>%=";

fn ensure_len(data: &[u8], expected: usize, characteristic: MugCharacteristic) -> Result<()> {
    if data.len() < expected {
        return Err(DecodeError::TooShort {
            characteristic: characteristic.name(),
            expected,
            got: data.len(),
        }
        .into());
    }
    Ok(())
}

/// Rounds to two decimal places.
fn round2(value: f32) -> f32 {
    (value * 100.0).round() / 100.0
}

/// Converts Celsius to Fahrenheit.
#[must_use]
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Converts Fahrenheit to Celsius.
#[must_use]
pub fn fahrenheit_to_celsius(fahrenheit: f32) -> f32 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Reads a little-endian unsigned integer of any width up to 8 bytes.
fn little_int(data: &[u8]) -> u64 {
    data.iter()
        .take(8)
        .rev()
        .fold(0, |acc, &b| (acc << 8) | u64::from(b))
}

/// Parses a temperature.
///
/// Format: `[hundredths_celsius:2LE]`. Returns Celsius when `use_metric`,
/// Fahrenheit otherwise, rounded to two decimals.
pub fn parse_temperature(
    data: &[u8],
    use_metric: bool,
    characteristic: MugCharacteristic,
) -> Result<f32> {
    ensure_len(data, 2, characteristic)?;
    let raw = (&data[..2]).get_u16_le();
    let celsius = f32::from(raw) / TEMP_SCALE;
    Ok(if use_metric {
        round2(celsius)
    } else {
        round2(celsius_to_fahrenheit(celsius))
    })
}

/// Encodes a temperature given in the session's unit.
///
/// Format: `[hundredths_celsius:2LE]`.
pub fn encode_temperature(temp: f32, use_metric: bool) -> Result<Bytes> {
    let celsius = if use_metric {
        temp
    } else {
        fahrenheit_to_celsius(temp)
    };
    let raw = (celsius * TEMP_SCALE).round();
    if !raw.is_finite() || raw < 0.0 || raw > f32::from(u16::MAX) {
        return Err(Error::InvalidArgument {
            reason: format!("temperature {temp} cannot be sent to the mug"),
        });
    }
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let raw = raw as u16;
    let mut buf = BytesMut::with_capacity(2);
    buf.put_u16_le(raw);
    Ok(buf.freeze())
}

/// Parses battery status.
///
/// Format: `[percent:1] [on_charging_base:1]`.
pub fn parse_battery(data: &[u8]) -> Result<BatteryInfo> {
    ensure_len(data, 2, MugCharacteristic::Battery)?;
    Ok(BatteryInfo {
        percent: f32::from(data[0]),
        on_charging_base: data[1] == 1,
    })
}

/// Parses the LED colour.
///
/// Format: `[r:1] [g:1] [b:1] [a:1]`.
pub fn parse_colour(data: &[u8]) -> Result<Colour> {
    ensure_len(data, 4, MugCharacteristic::Led)?;
    Ok(Colour::rgba(data[0], data[1], data[2], data[3]))
}

/// Encodes an LED colour. Alpha is always sent as 255.
#[must_use]
pub fn encode_colour(colour: Colour) -> Bytes {
    let colour = colour.opaque();
    Bytes::copy_from_slice(&[colour.r, colour.g, colour.b, colour.a])
}

/// Parses mug id and serial number.
///
/// Format: `[mug_id:6] [separator:1] [serial:...]`.
pub fn parse_meta(data: &[u8]) -> Result<MugMeta> {
    ensure_len(data, 7, MugCharacteristic::MugId)?;
    Ok(MugMeta {
        mug_id: BASE64.encode(&data[..6]),
        serial_number: String::from_utf8_lossy(&data[7..]).into_owned(),
    })
}

/// Parses firmware information.
///
/// Format: `[version:2LE] [hardware:2LE] [bootloader:2LE]`.
pub fn parse_firmware(data: &[u8]) -> Result<MugFirmwareInfo> {
    ensure_len(data, 6, MugCharacteristic::Firmware)?;
    let mut cursor = data;
    Ok(MugFirmwareInfo {
        version: cursor.get_u16_le(),
        hardware: cursor.get_u16_le(),
        bootloader: cursor.get_u16_le(),
    })
}

/// Parses the raw liquid level (0-30).
pub fn parse_liquid_level(data: &[u8]) -> Result<u8> {
    ensure_len(data, 1, MugCharacteristic::LiquidLevel)?;
    let level = little_int(data);
    u8::try_from(level).map_err(|_| {
        DecodeError::InvalidValue {
            what: "liquid level",
            value: level.to_string(),
        }
        .into()
    })
}

/// Parses the liquid state.
pub fn parse_liquid_state(data: &[u8]) -> Result<LiquidState> {
    ensure_len(data, 1, MugCharacteristic::LiquidState)?;
    Ok(LiquidState::from_byte(data[0]))
}

/// Parses the travel mug volume level.
pub fn parse_volume_level(data: &[u8]) -> Result<VolumeLevel> {
    ensure_len(data, 1, MugCharacteristic::Volume)?;
    VolumeLevel::from_state(data[0]).ok_or_else(|| {
        DecodeError::InvalidValue {
            what: "volume level",
            value: data[0].to_string(),
        }
        .into()
    })
}

/// Encodes the travel mug volume level.
#[must_use]
pub fn encode_volume_level(level: VolumeLevel) -> Bytes {
    Bytes::copy_from_slice(&[level.state()])
}

/// Parses the temperature unit.
pub fn parse_temperature_unit(data: &[u8]) -> Result<TemperatureUnit> {
    ensure_len(data, 1, MugCharacteristic::TemperatureUnit)?;
    Ok(TemperatureUnit::from_byte(data[0]))
}

/// Encodes the temperature unit.
#[must_use]
pub fn encode_temperature_unit(unit: TemperatureUnit) -> Bytes {
    Bytes::copy_from_slice(&[unit.to_byte()])
}

/// Parses battery voltage from control register data.
///
/// Only the first byte is meaningful.
pub fn parse_battery_voltage(data: &[u8]) -> Result<u8> {
    ensure_len(data, 1, MugCharacteristic::ControlRegisterData)?;
    Ok(data[0])
}

/// Parses the mug clock.
///
/// Format: `[unix_seconds:4BE] [tz_offset:...]`. Zero means the clock is unset.
pub fn parse_date_time(data: &[u8]) -> Result<Option<DateTime<Utc>>> {
    ensure_len(data, 4, MugCharacteristic::DateTimeAndZone)?;
    let seconds = (&data[..4]).get_u32();
    if seconds == 0 {
        return Ok(None);
    }
    DateTime::from_timestamp(i64::from(seconds), 0)
        .map(Some)
        .ok_or_else(|| {
            DecodeError::InvalidValue {
                what: "timestamp",
                value: seconds.to_string(),
            }
            .into()
        })
}

/// Parses the mug name.
#[must_use]
pub fn parse_name(data: &[u8]) -> String {
    String::from_utf8_lossy(data).into_owned()
}

/// Returns true if the mug would accept this name.
#[must_use]
pub fn is_valid_name(name: &str) -> bool {
    let len = name.chars().count();
    (1..=MAX_NAME_LEN).contains(&len)
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == ' ' || NAME_PUNCTUATION.contains(c))
}

/// Encodes a mug name.
pub fn encode_name(name: &str) -> Result<Bytes> {
    if !is_valid_name(name) {
        return Err(Error::InvalidArgument {
            reason: "Name cannot contain any special characters".into(),
        });
    }
    Ok(Bytes::copy_from_slice(name.as_bytes()))
}

/// Decodes an opaque key (DSK/UDSK) into its base64 text.
#[must_use]
pub fn decode_byte_string(data: &[u8]) -> String {
    BASE64.encode(data)
}

/// Encodes an opaque key for writing: the base64 text of the string, as bytes.
#[must_use]
pub fn encode_byte_string(value: &str) -> Bytes {
    Bytes::from(BASE64.encode(value.as_bytes()).into_bytes())
}

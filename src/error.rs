//! Error types for the ember-mug library.

use thiserror::Error;
use uuid::Uuid;

use crate::types::Attribute;

/// The main error type for mug operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Bluetooth stack error.
    #[error("bluetooth error: {0}")]
    Ble(#[from] btleplug::Error),

    /// Attribute payload decoding error.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Operation timed out waiting for the mug.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Connection is not established.
    #[error("not connected")]
    NotConnected,

    /// No usable Bluetooth adapter.
    #[error("no Bluetooth adapter found")]
    NoAdapter,

    /// The peripheral does not expose a characteristic we need.
    #[error("characteristic {uuid} not found on device")]
    CharacteristicNotFound { uuid: Uuid },

    /// The attribute is not available on this model.
    #[error("{attribute} is not supported by the {model}")]
    Unsupported { attribute: Attribute, model: String },

    /// A value passed to the library was rejected before reaching the mug.
    #[error("invalid argument: {reason}")]
    InvalidArgument { reason: String },
}

/// Payload decoding errors.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload shorter than the attribute format requires.
    #[error("{characteristic} payload too short: need at least {expected} bytes, got {got}")]
    TooShort {
        characteristic: &'static str,
        expected: usize,
        got: usize,
    },

    /// Payload decoded to a value outside the known range.
    #[error("invalid {what}: {value}")]
    InvalidValue { what: &'static str, value: String },
}

/// Result type alias for mug operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let uuid = Uuid::nil();
        assert_eq!(
            Error::CharacteristicNotFound { uuid }.to_string(),
            format!("characteristic {uuid} not found on device")
        );
        assert_eq!(
            Error::Timeout { timeout_ms: 10 }.to_string(),
            "operation timed out after 10ms"
        );
    }

    #[test]
    fn test_decode_error_message() {
        let err = Error::from(DecodeError::TooShort {
            characteristic: "Battery",
            expected: 2,
            got: 1,
        });
        assert_eq!(
            err.to_string(),
            "decode error: Battery payload too short: need at least 2 bytes, got 1"
        );
    }
}

//! Command handlers for Ember mug operations.
//!
//! This module serializes GATT operations on the shared transport and turns
//! raw characteristic values into typed values.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::protocol::MugCharacteristic;
use crate::protocol::parser::{
    decode_byte_string, parse_battery, parse_battery_voltage, parse_colour, parse_date_time,
    parse_firmware, parse_liquid_level, parse_liquid_state, parse_meta, parse_name,
    parse_temperature, parse_temperature_unit, parse_volume_level,
};
use crate::transport::Transport;
use crate::types::{
    BatteryInfo, Colour, LiquidState, MugFirmwareInfo, MugMeta, TemperatureUnit, VolumeLevel,
};

/// Default command timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Command handler for Ember mug operations.
///
/// The transport lock is held for the duration of one operation, so only one
/// GATT request is in flight at a time.
pub struct CommandHandler<T> {
    transport: Arc<Mutex<T>>,
    timeout: Duration,
}

impl<T: Transport> CommandHandler<T> {
    /// Creates a new command handler.
    #[must_use]
    pub const fn new(transport: Arc<Mutex<T>>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the command timeout.
    pub const fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Returns the command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<R>(&self, operation: impl Future<Output = Result<R>>) -> Result<R> {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| Error::Timeout {
                timeout_ms: u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
            })?
    }

    // ==================== Raw Operations ====================

    /// Reads a characteristic.
    pub async fn read(&self, characteristic: MugCharacteristic) -> Result<Bytes> {
        let mut transport = self.transport.lock().await;
        let value = self.bounded(transport.read(characteristic.uuid())).await?;
        tracing::debug!(
            "Read attribute '{characteristic}' with value '{}'",
            hex::encode(&value)
        );
        Ok(value)
    }

    /// Writes a characteristic.
    pub async fn write(&self, characteristic: MugCharacteristic, data: Bytes) -> Result<()> {
        let encoded = hex::encode(&data);
        let mut transport = self.transport.lock().await;
        match self
            .bounded(transport.write(characteristic.uuid(), data))
            .await
        {
            Ok(()) => {
                tracing::debug!("Wrote '{encoded}' to attribute '{characteristic}'");
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to write '{encoded}' to attribute '{characteristic}': {e}");
                Err(e)
            }
        }
    }

    /// Subscribes to notifications of a characteristic.
    pub async fn start_notify(&self, characteristic: MugCharacteristic) -> Result<()> {
        let mut transport = self.transport.lock().await;
        self.bounded(transport.start_notify(characteristic.uuid()))
            .await
    }

    /// Unsubscribes from notifications of a characteristic.
    pub async fn stop_notify(&self, characteristic: MugCharacteristic) -> Result<()> {
        let mut transport = self.transport.lock().await;
        self.bounded(transport.stop_notify(characteristic.uuid()))
            .await
    }

    // ==================== Identity ====================

    /// Reads the mug name.
    pub async fn get_name(&self) -> Result<String> {
        Ok(parse_name(&self.read(MugCharacteristic::MugName).await?))
    }

    /// Reads the mug id and serial number.
    pub async fn get_meta(&self) -> Result<MugMeta> {
        parse_meta(&self.read(MugCharacteristic::MugId).await?)
    }

    /// Reads firmware information.
    pub async fn get_firmware(&self) -> Result<MugFirmwareInfo> {
        parse_firmware(&self.read(MugCharacteristic::Firmware).await?)
    }

    /// Reads the device secret key as base64 text.
    pub async fn get_dsk(&self) -> Result<String> {
        Ok(decode_byte_string(&self.read(MugCharacteristic::Dsk).await?))
    }

    /// Reads the user device secret key as base64 text.
    pub async fn get_udsk(&self) -> Result<String> {
        Ok(decode_byte_string(&self.read(MugCharacteristic::Udsk).await?))
    }

    // ==================== Temperature ====================

    /// Reads the drink temperature in the requested unit.
    pub async fn get_current_temp(&self, use_metric: bool) -> Result<f32> {
        let data = self.read(MugCharacteristic::CurrentTemperature).await?;
        parse_temperature(&data, use_metric, MugCharacteristic::CurrentTemperature)
    }

    /// Reads the target temperature in the requested unit.
    pub async fn get_target_temp(&self, use_metric: bool) -> Result<f32> {
        let data = self.read(MugCharacteristic::TargetTemperature).await?;
        parse_temperature(&data, use_metric, MugCharacteristic::TargetTemperature)
    }

    /// Reads the unit shown by the mug app.
    pub async fn get_temperature_unit(&self) -> Result<TemperatureUnit> {
        parse_temperature_unit(&self.read(MugCharacteristic::TemperatureUnit).await?)
    }

    // ==================== Liquid ====================

    /// Reads the raw liquid level.
    pub async fn get_liquid_level(&self) -> Result<u8> {
        parse_liquid_level(&self.read(MugCharacteristic::LiquidLevel).await?)
    }

    /// Reads the liquid state.
    pub async fn get_liquid_state(&self) -> Result<LiquidState> {
        parse_liquid_state(&self.read(MugCharacteristic::LiquidState).await?)
    }

    /// Reads the travel mug volume level.
    pub async fn get_volume_level(&self) -> Result<VolumeLevel> {
        parse_volume_level(&self.read(MugCharacteristic::Volume).await?)
    }

    // ==================== Battery & Misc ====================

    /// Reads battery status.
    pub async fn get_battery(&self) -> Result<BatteryInfo> {
        parse_battery(&self.read(MugCharacteristic::Battery).await?)
    }

    /// Reads battery voltage.
    pub async fn get_battery_voltage(&self) -> Result<u8> {
        parse_battery_voltage(&self.read(MugCharacteristic::ControlRegisterData).await?)
    }

    /// Reads the LED colour.
    pub async fn get_led_colour(&self) -> Result<Colour> {
        parse_colour(&self.read(MugCharacteristic::Led).await?)
    }

    /// Reads the mug clock.
    pub async fn get_date_time_zone(&self) -> Result<Option<DateTime<Utc>>> {
        parse_date_time(&self.read(MugCharacteristic::DateTimeAndZone).await?)
    }
}

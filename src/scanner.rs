//! Discovery of Ember mugs over Bluetooth LE.
//!
//! Mugs in pairing mode advertise the standard Ember service. Mugs that are
//! already paired only carry the Ember manufacturer data or an "Ember" name.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use btleplug::api::{BDAddr, Central, Manager as _, Peripheral as _, PeripheralProperties, ScanFilter};
use btleplug::platform::{Adapter, Manager, Peripheral};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::protocol::MugCharacteristic;
use crate::types::model::DEFAULT_NAME;

/// Bluetooth SIG company id of Ember Technologies.
pub const EMBER_MANUFACTURER_ID: u16 = 0x03C1;

/// Default time to listen for advertisements.
pub const DEFAULT_SCAN_WAIT: Duration = Duration::from_secs(5);

/// Configuration for scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Only accept this address.
    pub mac: Option<BDAddr>,
    /// Adapter name to scan with (`BlueZ` only).
    pub adapter: Option<String>,
    /// Time to listen for advertisements.
    pub wait: Duration,
}

impl ScanConfig {
    /// Creates a configuration with default settings.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mac: None,
            adapter: None,
            wait: DEFAULT_SCAN_WAIT,
        }
    }

    /// Restricts the scan to one address.
    #[must_use]
    pub const fn mac(mut self, mac: Option<BDAddr>) -> Self {
        self.mac = mac;
        self
    }

    /// Selects the adapter by name.
    #[must_use]
    pub fn adapter(mut self, adapter: Option<String>) -> Self {
        self.adapter = adapter;
        self
    }

    /// Sets how long to listen.
    #[must_use]
    pub const fn wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Checks the options against the current platform.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if an adapter is selected off Linux.
    pub fn validate(&self) -> Result<()> {
        if self.adapter.is_some() && !cfg!(target_os = "linux") {
            return Err(Error::InvalidArgument {
                reason: "The adapter option is only valid for the Linux BlueZ backend".into(),
            });
        }
        Ok(())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// What a peripheral advertised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisementInfo {
    /// Peripheral address.
    pub address: BDAddr,
    /// Advertised local name.
    pub name: Option<String>,
    /// Signal strength.
    pub rssi: Option<i16>,
    /// Manufacturer data by company id.
    pub manufacturer_data: HashMap<u16, Vec<u8>>,
    /// Advertised service UUIDs.
    pub services: Vec<Uuid>,
}

impl AdvertisementInfo {
    /// Returns true if the address filter accepts this peripheral.
    #[must_use]
    pub fn matches_mac(&self, mac: Option<BDAddr>) -> bool {
        mac.is_none_or(|mac| mac == self.address)
    }

    /// Returns true if the mug advertises its pairing service.
    #[must_use]
    pub fn is_pairing(&self) -> bool {
        self.services
            .contains(&MugCharacteristic::StandardService.uuid())
    }

    /// Returns true if this looks like an Ember device.
    #[must_use]
    pub fn is_ember(&self) -> bool {
        self.manufacturer_data.contains_key(&EMBER_MANUFACTURER_ID)
            || self
                .name
                .as_deref()
                .is_some_and(|name| name.starts_with("Ember"))
            || self.is_pairing()
    }
}

impl From<PeripheralProperties> for AdvertisementInfo {
    fn from(properties: PeripheralProperties) -> Self {
        Self {
            address: properties.address,
            name: properties.local_name,
            rssi: properties.rssi,
            manufacturer_data: properties.manufacturer_data,
            services: properties.services,
        }
    }
}

/// Picks the peripheral `find` should use.
///
/// With a mac filter only that address is accepted, otherwise the first
/// Ember device.
#[must_use]
pub fn select_mug(infos: &[AdvertisementInfo], mac: Option<BDAddr>) -> Option<usize> {
    infos.iter().position(|info| match mac {
        Some(_) => info.matches_mac(mac),
        None => info.is_ember(),
    })
}

/// Keeps the peripherals that reported advertisement data.
///
/// Peripherals whose properties cannot be read are skipped.
fn collect_advertisements<P: fmt::Debug>(
    seen: Vec<(P, btleplug::Result<Option<PeripheralProperties>>)>,
) -> Vec<(P, AdvertisementInfo)> {
    seen.into_iter()
        .filter_map(|(peripheral, properties)| match properties {
            Ok(Some(properties)) => {
                tracing::debug!("Saw {} ({:?})", properties.address, properties.local_name);
                Some((peripheral, AdvertisementInfo::from(properties)))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::debug!("Skipping {peripheral:?}: {e}");
                None
            }
        })
        .collect()
}

/// A mug found by scanning.
#[derive(Debug, Clone)]
pub struct DiscoveredMug {
    /// Adapter that saw the mug.
    pub adapter: Adapter,
    /// The peripheral.
    pub peripheral: Peripheral,
    /// Advertisement data.
    pub info: AdvertisementInfo,
}

impl DiscoveredMug {
    /// Peripheral address.
    #[must_use]
    pub const fn address(&self) -> BDAddr {
        self.info.address
    }

    /// Advertised name, or the generic default.
    #[must_use]
    pub fn model_name(&self) -> &str {
        self.info.name.as_deref().unwrap_or(DEFAULT_NAME)
    }
}

impl fmt::Display for DiscoveredMug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.info.address, self.model_name())
    }
}

/// Scans for mugs with one adapter.
pub struct Scanner {
    adapter: Adapter,
    config: ScanConfig,
}

impl Scanner {
    /// Creates a scanner using the configured adapter, or the first one.
    ///
    /// # Errors
    ///
    /// Returns `NoAdapter` if no matching adapter exists.
    pub async fn new(config: ScanConfig) -> Result<Self> {
        config.validate()?;
        let manager = Manager::new().await?;
        let adapters = manager.adapters().await?;

        let mut selected = None;
        for adapter in adapters {
            let Some(wanted) = config.adapter.as_deref() else {
                selected = Some(adapter);
                break;
            };
            let info = adapter.adapter_info().await?;
            tracing::debug!("Found adapter: {info}");
            if info.contains(wanted) {
                selected = Some(adapter);
                break;
            }
        }

        let adapter = selected.ok_or(Error::NoAdapter)?;
        Ok(Self { adapter, config })
    }

    async fn scan(&self, filter: ScanFilter) -> Result<Vec<DiscoveredMug>> {
        self.adapter.start_scan(filter).await?;
        tokio::time::sleep(self.config.wait).await;
        let peripherals = self.adapter.peripherals().await;
        if let Err(e) = self.adapter.stop_scan().await {
            tracing::debug!("Failed to stop scan: {e}");
        }

        let mut seen = Vec::new();
        for peripheral in peripherals? {
            let properties = peripheral.properties().await;
            seen.push((peripheral, properties));
        }
        Ok(collect_advertisements(seen)
            .into_iter()
            .map(|(peripheral, info)| DiscoveredMug {
                adapter: self.adapter.clone(),
                peripheral,
                info,
            })
            .collect())
    }

    /// Finds mugs in pairing mode.
    ///
    /// # Errors
    ///
    /// Returns an error if scanning fails.
    pub async fn discover(&self) -> Result<Vec<DiscoveredMug>> {
        let filter = ScanFilter {
            services: vec![MugCharacteristic::StandardService.uuid()],
        };
        let mugs = self.scan(filter).await?;
        Ok(mugs
            .into_iter()
            .filter(|mug| mug.info.is_pairing() && mug.info.matches_mac(self.config.mac))
            .collect())
    }

    /// Finds the first mug, paired or not.
    ///
    /// # Errors
    ///
    /// Returns an error if scanning fails.
    pub async fn find(&self) -> Result<Option<DiscoveredMug>> {
        let mut mugs = self.scan(ScanFilter::default()).await?;
        let infos: Vec<AdvertisementInfo> = mugs.iter().map(|mug| mug.info.clone()).collect();
        Ok(select_mug(&infos, self.config.mac).map(|index| mugs.swap_remove(index)))
    }
}

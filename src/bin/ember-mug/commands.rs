//! Subcommand implementations.

use std::fmt;
use std::time::Duration;

use ember_mug::{
    Attribute, BleTransport, Colour, DiscoveredMug, EmberMug, MugConfig, MugData, ScanConfig,
    Scanner, TemperatureUnit, VolumeLevel,
};

use crate::format::{print_changes, print_info, print_table};
use crate::{InfoArgs, SetArgs, SharedArgs};

/// Seconds between queued refreshes while polling.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polling iterations between full refreshes.
const FULL_REFRESH_EVERY: u32 = 60;

/// Failure of a subcommand. The message is printed before exiting with 1.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error(transparent)]
    Mug(#[from] ember_mug::Error),
    #[error("{0}")]
    Message(String),
}

pub type CliResult = Result<(), CliError>;

#[cfg(target_os = "linux")]
fn scan_config(shared: &SharedArgs) -> ScanConfig {
    ScanConfig::new()
        .mac(shared.mac)
        .adapter(shared.adapter.clone())
}

#[cfg(not(target_os = "linux"))]
fn scan_config(shared: &SharedArgs) -> ScanConfig {
    ScanConfig::new().mac(shared.mac)
}

fn mug_config(shared: &SharedArgs, info: InfoArgs) -> MugConfig {
    MugConfig::new()
        .use_metric(!info.imperial)
        .include_extra(info.extra)
        .debug(shared.debug)
}

async fn find_device(shared: &SharedArgs) -> Result<DiscoveredMug, CliError> {
    let failed =
        |e: ember_mug::Error| CliError::Message(format!("An error occurred trying to find a mug: {e}"));
    let scanner = Scanner::new(scan_config(shared)).await.map_err(failed)?;
    let device = scanner
        .find()
        .await
        .map_err(failed)?
        .ok_or_else(|| CliError::Message("No mug was found.".into()))?;

    if !shared.raw {
        println!("Found mug: {device}");
    }
    Ok(device)
}

async fn connect_mug(
    shared: &SharedArgs,
    info: InfoArgs,
) -> Result<EmberMug<BleTransport>, CliError> {
    let device = find_device(shared).await?;
    if !shared.raw {
        println!("Connecting...");
    }
    Ok(EmberMug::from_device(device, mug_config(shared, info)))
}

/// Finds the first paired mug.
pub async fn find(shared: &SharedArgs) -> CliResult {
    let device = find_device(shared).await?;
    if shared.raw {
        println!("{}", device.address());
    }
    Ok(())
}

/// Lists mugs in pairing mode.
pub async fn discover(shared: &SharedArgs) -> CliResult {
    let failed = |e: ember_mug::Error| {
        CliError::Message(format!("An error occurred trying to discover mugs: {e}"))
    };
    let scanner = Scanner::new(scan_config(shared)).await.map_err(failed)?;
    let mugs = scanner.discover().await.map_err(failed)?;
    if mugs.is_empty() {
        return Err(CliError::Message(
            "No mugs were found. Be sure it is in pairing mode. Or use \"find\" if already paired."
                .into(),
        ));
    }

    for mug in mugs {
        if shared.raw {
            println!("{}", mug.address());
        } else {
            println!("Found mug: {mug}");
        }
    }
    Ok(())
}

/// Prints every attribute once.
pub async fn info(shared: &SharedArgs, info: InfoArgs) -> CliResult {
    let mug = connect_mug(shared, info).await?;
    let raw = shared.raw;
    mug.connection(|mug| async move {
        if !raw {
            println!("Connected.\nFetching Info");
        }
        mug.update_all().await
    })
    .await?;

    print_info(&mug.data(), raw);
    Ok(())
}

/// Prints every attribute, then changes until interrupted.
pub async fn poll(shared: &SharedArgs, info: InfoArgs) -> CliResult {
    let mug = connect_mug(shared, info).await?;
    let raw = shared.raw;
    mug.connection(|mug| async move {
        if !raw {
            println!("Connected.\nFetching Info");
        }
        mug.update_all().await?;
        print_info(&mug.data(), raw);
        if !raw {
            println!("\nWatching for changes");
        }

        let ctrl_c = tokio::signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let mut interval = tokio::time::interval(POLL_INTERVAL);
        interval.tick().await;

        let mut iteration: u32 = 0;
        loop {
            tokio::select! {
                _ = &mut ctrl_c => break,
                _ = interval.tick() => {
                    iteration = iteration.wrapping_add(1);
                    print_changes(&mug.update_queued_attributes().await?);
                    if iteration % FULL_REFRESH_EVERY == 0 {
                        print_changes(&mug.update_all().await?);
                    }
                }
            }
        }
        Ok::<_, ember_mug::Error>(())
    })
    .await?;
    Ok(())
}

/// Reads the requested attributes.
pub async fn get(shared: &SharedArgs, info: InfoArgs, attributes: Vec<Attribute>) -> CliResult {
    let mug = connect_mug(shared, info).await?;
    let requested = attributes.clone();
    let values = mug
        .connection(|mug| async move {
            let mut values = Vec::with_capacity(attributes.len());
            for attribute in attributes {
                values.push(mug.get(attribute).await?);
            }
            Ok::<_, ember_mug::Error>(values)
        })
        .await?;

    if shared.raw {
        for value in &values {
            println!("{value}");
        }
        return Ok(());
    }

    let mut data = MugData::new(mug.model(), !info.imperial);
    data.update(values);
    let rows: Vec<(&str, String)> = requested
        .into_iter()
        .map(|attribute| (attribute.label(), data.formatted(attribute)))
        .collect();
    print_table(&rows);
    Ok(())
}

/// One value to write with `set`.
#[derive(Debug, Clone, PartialEq)]
enum Setting {
    Name(String),
    TargetTemp(f32),
    TemperatureUnit(TemperatureUnit),
    LedColour(Colour),
    VolumeLevel(VolumeLevel),
}

impl Setting {
    fn from_args(args: SetArgs) -> Vec<Self> {
        let mut settings = Vec::new();
        if let Some(name) = args.name {
            settings.push(Self::Name(name));
        }
        if let Some(temp) = args.target_temp {
            settings.push(Self::TargetTemp(temp));
        }
        if let Some(unit) = args.temperature_unit {
            settings.push(Self::TemperatureUnit(unit));
        }
        if let Some(colour) = args.led_colour {
            settings.push(Self::LedColour(colour));
        }
        if let Some(level) = args.volume_level {
            settings.push(Self::VolumeLevel(level));
        }
        settings
    }

    const fn attribute(&self) -> Attribute {
        match self {
            Self::Name(_) => Attribute::Name,
            Self::TargetTemp(_) => Attribute::TargetTemp,
            Self::TemperatureUnit(_) => Attribute::TemperatureUnit,
            Self::LedColour(_) => Attribute::LedColour,
            Self::VolumeLevel(_) => Attribute::VolumeLevel,
        }
    }

    async fn apply(&self, mug: &EmberMug<BleTransport>) -> ember_mug::Result<()> {
        match self {
            Self::Name(name) => mug.set_name(name).await,
            Self::TargetTemp(temp) => mug.set_target_temp(*temp).await,
            Self::TemperatureUnit(unit) => mug.set_temperature_unit(*unit).await,
            Self::LedColour(colour) => mug.set_led_colour(*colour).await,
            Self::VolumeLevel(level) => mug.set_volume_level(*level).await,
        }
    }
}

impl fmt::Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{name}"),
            Self::TargetTemp(temp) => write!(f, "{temp}"),
            Self::TemperatureUnit(unit) => write!(f, "{unit}"),
            Self::LedColour(colour) => write!(f, "{colour}"),
            Self::VolumeLevel(level) => write!(f, "{level}"),
        }
    }
}

/// Writes the given values.
pub async fn set(shared: &SharedArgs, info: InfoArgs, args: SetArgs) -> CliResult {
    let settings = Setting::from_args(args);
    if settings.is_empty() {
        return Err(CliError::Message(
            "Please specify at least one attribute and value to set.\n\
             Options: --name, --target-temp, --temperature-unit, --led-colour, --volume-level"
                .into(),
        ));
    }

    let mug = connect_mug(shared, info).await?;
    mug.connection(|mug| async move {
        for setting in &settings {
            println!("Setting {} to {setting}", setting.attribute());
            setting.apply(mug).await?;
        }
        Ok::<_, ember_mug::Error>(())
    })
    .await?;
    Ok(())
}

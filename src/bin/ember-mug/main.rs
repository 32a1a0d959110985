//! Command line tool to interact with an Ember mug.

mod commands;
mod format;

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use btleplug::api::BDAddr;
use clap::{Args, Parser, Subcommand};
use ember_mug::{Attribute, Colour, TemperatureUnit, VolumeLevel};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ember-mug")]
#[command(about = "CLI to interact with an Ember Mug")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// Options accepted by every command.
#[derive(Args, Debug, Clone, Default)]
pub struct SharedArgs {
    /// Only look for this specific address
    #[arg(short, long, value_parser = parse_mac)]
    pub mac: Option<BDAddr>,
    /// Print extra information for development or debugging issues
    #[arg(short, long)]
    pub debug: bool,
    /// File to write logs to (will be overwritten)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    /// No formatting. One value per line.
    #[arg(short, long)]
    pub raw: bool,
    /// Use this Bluetooth adapter instead of the default one
    #[cfg(target_os = "linux")]
    #[arg(short, long)]
    pub adapter: Option<String>,
}

/// Options for commands that read mug state.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct InfoArgs {
    /// Show extra info
    #[arg(short, long)]
    pub extra: bool,
    /// Use Imperial units
    #[arg(long)]
    pub imperial: bool,
}

/// Values to write with `set`.
#[derive(Args, Debug, Clone, Default)]
pub struct SetArgs {
    /// Name
    #[arg(long)]
    pub name: Option<String>,
    /// Target Temperature
    #[arg(long)]
    pub target_temp: Option<f32>,
    /// Temperature Unit (C or F)
    #[arg(long)]
    pub temperature_unit: Option<TemperatureUnit>,
    /// LED Colour (hex or r,g,b[,a])
    #[arg(long)]
    pub led_colour: Option<Colour>,
    /// Volume Level (low, medium or high)
    #[arg(long)]
    pub volume_level: Option<VolumeLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Find the first paired device
    Find {
        #[command(flatten)]
        shared: SharedArgs,
    },
    /// Discover devices in pairing mode
    Discover {
        #[command(flatten)]
        shared: SharedArgs,
    },
    /// Fetch all info from device
    Info {
        #[command(flatten)]
        shared: SharedArgs,
        #[command(flatten)]
        info: InfoArgs,
    },
    /// Poll mug for information
    Poll {
        #[command(flatten)]
        shared: SharedArgs,
        #[command(flatten)]
        info: InfoArgs,
    },
    /// Get mug value
    Get {
        #[command(flatten)]
        shared: SharedArgs,
        #[command(flatten)]
        info: InfoArgs,
        /// Attributes to read
        #[arg(value_name = "ATTRIBUTE", required = true, value_parser = Attribute::from_str)]
        attributes: Vec<Attribute>,
    },
    /// Set mug value
    Set {
        #[command(flatten)]
        shared: SharedArgs,
        #[command(flatten)]
        info: InfoArgs,
        #[command(flatten)]
        values: SetArgs,
    },
}

impl Command {
    const fn shared(&self) -> &SharedArgs {
        match self {
            Self::Find { shared }
            | Self::Discover { shared }
            | Self::Info { shared, .. }
            | Self::Poll { shared, .. }
            | Self::Get { shared, .. }
            | Self::Set { shared, .. } => shared,
        }
    }
}

fn parse_mac(value: &str) -> Result<BDAddr, String> {
    BDAddr::from_str(value).map_err(|_| format!("Invalid MAC address: {value}"))
}

fn init_logging(shared: &SharedArgs) -> std::io::Result<()> {
    let default = if shared.debug {
        "ember_mug=debug,warn"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if let Some(path) = &shared.log_file {
        let file = std::fs::File::create(path)?;
        builder
            .with_ansi(false)
            .with_writer(std::sync::Mutex::new(file))
            .init();
    } else {
        builder.with_writer(std::io::stderr).init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.command.shared()) {
        eprintln!("Unable to open log file: {e}");
        return ExitCode::FAILURE;
    }

    let result = match cli.command {
        Command::Find { shared } => commands::find(&shared).await,
        Command::Discover { shared } => commands::discover(&shared).await,
        Command::Info { shared, info } => commands::info(&shared, info).await,
        Command::Poll { shared, info } => commands::poll(&shared, info).await,
        Command::Get {
            shared,
            info,
            attributes,
        } => commands::get(&shared, info, attributes).await,
        Command::Set {
            shared,
            info,
            values,
        } => commands::set(&shared, info, values).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{e}");
            ExitCode::FAILURE
        }
    }
}

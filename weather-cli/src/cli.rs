use anyhow::Context;
use clap::{ArgAction, Args, Parser, Subcommand};
use inquire::{Password, Select, Text};
use std::{process::ExitCode, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use weather_core::{
    Config, Coordinates, DisplayUnit, FlowError, FlowSettings, FusedLocationService, IpLocator,
    PermissionGate, Screen, TcpProbe, UnitSystem, WeatherFlow, WeatherPresenter,
    config::LocationConfig, presenter::region_from_locale, provider_from_config,
};

use crate::{
    permissions::PromptPermissions,
    terminal::{TerminalDisplay, TerminalNotifier, TerminalProgress},
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Current weather for your location")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RUST_LOG wins when set.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively set the API key and unit preferences.
    Configure,

    /// Show the current weather for this device's location.
    Show(ShowArgs),

    /// Inspect or reset stored location permission answers.
    Permissions {
        #[command(subcommand)]
        action: PermissionsAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum PermissionsAction {
    /// Print the stored answers.
    Status,
    /// Forget the stored answers so the next run prompts again.
    Reset,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    /// Fixed latitude, used as the GPS-grade provider.
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    pub lat: Option<f64>,

    /// Fixed longitude, used as the GPS-grade provider.
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    pub lon: Option<f64>,

    /// Units requested from the API: metric or imperial.
    #[arg(long, value_parser = parse_units)]
    pub units: Option<UnitSystem>,

    /// Temperature label: auto, celsius or fahrenheit.
    #[arg(long, value_parser = parse_display_unit)]
    pub display_unit: Option<DisplayUnit>,

    /// Two-letter region used when the display unit is auto.
    #[arg(long)]
    pub region: Option<String>,

    /// OpenWeather API key; overrides the configured one.
    #[arg(long, env = "OPENWEATHER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Grant location permission without prompting.
    #[arg(long)]
    pub allow_location: bool,

    /// Do not fall back to IP geolocation.
    #[arg(long)]
    pub no_ip_lookup: bool,

    /// Seconds to wait for a location fix.
    #[arg(long)]
    pub location_timeout: Option<u64>,

    /// Print the raw response as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

fn parse_units(s: &str) -> Result<UnitSystem, String> {
    UnitSystem::try_from(s).map_err(|e| e.to_string())
}

fn parse_display_unit(s: &str) -> Result<DisplayUnit, String> {
    DisplayUnit::try_from(s).map_err(|e| e.to_string())
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        match self.command {
            Command::Configure => configure()?,
            Command::Show(args) => return show(args).await,
            Command::Permissions { action } => permissions(action)?,
        }

        Ok(ExitCode::SUCCESS)
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;
    config.set_api_key(api_key.trim().to_string());

    config.api.units = Select::new("Units to request from the API:", UnitSystem::all().to_vec())
        .prompt()
        .context("Failed to read units")?;

    config.display.unit = Select::new("Temperature label:", DisplayUnit::all().to_vec())
        .prompt()
        .context("Failed to read display unit")?;

    let region = Text::new("Region code (blank to use the system locale):")
        .prompt()
        .context("Failed to read region")?;
    config.display.region = Some(region.trim().to_uppercase()).filter(|r| !r.is_empty());

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn permissions(action: PermissionsAction) -> anyhow::Result<()> {
    let mut config = Config::load()?;

    match action {
        PermissionsAction::Status => {
            for permission in weather_core::Permission::LOCATION {
                let status = config
                    .permissions
                    .get(permission)
                    .map(|s| format!("{s:?}"))
                    .unwrap_or_else(|| "not asked".to_string());
                println!("{permission}: {status}");
            }
        }
        PermissionsAction::Reset => {
            config.permissions.clear();
            config.save()?;
            println!("Location permission answers cleared.");
        }
    }

    Ok(())
}

async fn show(args: ShowArgs) -> anyhow::Result<ExitCode> {
    let mut config = Config::load()?;
    apply_overrides(&mut config, &args);

    let api_key = match args.api_key.as_deref() {
        Some(key) => key.to_string(),
        None => config.api_key()?.to_string(),
    };

    let region = config.display.region.clone().or_else(system_region);
    let glyph = config.display.unit.glyph(region.as_deref());
    debug!(?region, glyph, units = %config.api.units, "resolved display settings");

    let mut settings = FlowSettings::new(api_key);
    settings.units = config.api.units;
    settings.location_timeout = config.location.timeout();

    let cancel = CancellationToken::new();
    let mut flow = WeatherFlow::new(
        Box::new(location_service(&config.location)?),
        PermissionGate::new(PromptPermissions::new(
            config.permissions,
            args.allow_location,
            cancel.clone(),
        )),
        Box::new(TcpProbe::for_url(&config.api.base_url, PROBE_TIMEOUT)?),
        provider_from_config(&config)?,
        WeatherPresenter::new(glyph),
        settings,
    );

    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });

    let mut notifier = TerminalNotifier::new(Config::config_file_path().ok());
    let mut progress = TerminalProgress;
    let mut display = TerminalDisplay::default();
    let mut screen =
        Screen { notifier: &mut notifier, progress: &mut progress, display: &mut display };

    let outcome = flow.run(&mut screen, &cancel).await;

    let answers = *flow.permissions().backend().stored();
    if answers != config.permissions {
        let mut on_disk = Config::load()?;
        on_disk.permissions = answers;
        on_disk.save()?;
    }

    match outcome {
        Ok(response) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&response)?);
            } else {
                print!("{}", display.render());
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(FlowError::Cancelled) => Ok(ExitCode::from(130)),
        Err(err) => {
            debug!(error = %err, "flow ended without weather");
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Command-line values win over the stored config for this run only.
fn apply_overrides(config: &mut Config, args: &ShowArgs) {
    if let (Some(lat), Some(lon)) = (args.lat, args.lon) {
        config.location.latitude = Some(lat);
        config.location.longitude = Some(lon);
    }
    if let Some(units) = args.units {
        config.api.units = units;
    }
    if let Some(unit) = args.display_unit {
        config.display.unit = unit;
    }
    if let Some(region) = &args.region {
        config.display.region = Some(region.to_uppercase());
    }
    if args.no_ip_lookup {
        config.location.ip_lookup = false;
    }
    if let Some(secs) = args.location_timeout {
        config.location.timeout_secs = secs;
    }
}

fn location_service(cfg: &LocationConfig) -> anyhow::Result<FusedLocationService> {
    let network = if cfg.ip_lookup {
        Some(IpLocator::new(cfg.ip_lookup_url.clone(), cfg.timeout())?)
    } else {
        None
    };
    let gps: Option<Coordinates> = cfg.fixed_coordinates();

    Ok(FusedLocationService::new(gps, network))
}

fn system_region() -> Option<String> {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|var| std::env::var(var).ok())
        .find(|v| !v.is_empty())
        .and_then(|locale| region_from_locale(&locale))
}

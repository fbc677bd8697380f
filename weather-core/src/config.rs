use anyhow::{Context, Result, anyhow};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, path::PathBuf, time::Duration};

use crate::{
    location::DEFAULT_IP_LOOKUP_URL,
    model::{Coordinates, UnitSystem},
    permission::{Permission, PermissionStatus},
    presenter::DisplayUnit,
    provider::openweather::{DEFAULT_BASE_URL, DEFAULT_TIMEOUT},
};

const DEFAULT_LOCATION_TIMEOUT_SECS: u64 = 30;

/// Weather API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Units requested from the API. Independent of [`DisplayConfig::unit`].
    pub units: UnitSystem,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            units: UnitSystem::default(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// How results are labelled on screen.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub unit: DisplayUnit,
    /// Two-letter region code, e.g. "US". Falls back to the locale when absent.
    pub region: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub ip_lookup: bool,
    pub ip_lookup_url: String,
    pub timeout_secs: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            latitude: None,
            longitude: None,
            ip_lookup: true,
            ip_lookup_url: DEFAULT_IP_LOOKUP_URL.to_string(),
            timeout_secs: DEFAULT_LOCATION_TIMEOUT_SECS,
        }
    }
}

impl LocationConfig {
    /// Fixed coordinates, only when both halves are present.
    pub fn fixed_coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Stored answers to the location permission prompt.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PermissionsConfig {
    pub fine_location: Option<PermissionStatus>,
    pub coarse_location: Option<PermissionStatus>,
}

impl PermissionsConfig {
    pub fn get(&self, permission: Permission) -> Option<PermissionStatus> {
        match permission {
            Permission::FineLocation => self.fine_location,
            Permission::CoarseLocation => self.coarse_location,
        }
    }

    pub fn set(&mut self, permission: Permission, status: PermissionStatus) {
        match permission {
            Permission::FineLocation => self.fine_location = Some(status),
            Permission::CoarseLocation => self.coarse_location = Some(status),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Top-level configuration stored on disk.
///
/// Example TOML:
/// [api]
/// api_key = "..."
/// units = "metric"
///
/// [display]
/// unit = "auto"
/// region = "US"
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub display: DisplayConfig,
    pub location: LocationConfig,
    pub permissions: PermissionsConfig,
}

impl Config {
    /// Returns the API key or a hint on how to configure one.
    pub fn api_key(&self) -> Result<&str> {
        self.api.api_key.as_deref().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
            anyhow!(
                "No OpenWeather API key configured.\n\
                 Hint: run `weather configure` or pass --api-key."
            )
        })
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.api.api_key = Some(api_key);
    }

    /// Load config from disk, or return an empty default if it doesn't exist yet.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_file_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            // First run: no config file, return defaults.
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(cfg)
    }

    /// Save config to disk, creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_file_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml =
            toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")?;

        fs::write(path, toml)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Path to the config file.
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("dev", "weather-task", "weather-cli")
            .ok_or_else(|| anyhow!("Could not determine platform config directory"))?;

        Ok(dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_errors_when_not_set() {
        let cfg = Config::default();
        let err = cfg.api_key().unwrap_err();

        assert!(err.to_string().contains("No OpenWeather API key configured"));
        assert!(err.to_string().contains("weather configure"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let mut cfg = Config::default();
        cfg.set_api_key("   ".into());
        assert!(cfg.api_key().is_err());

        cfg.set_api_key("OPEN_KEY".into());
        assert_eq!(cfg.api_key().expect("key must exist"), "OPEN_KEY");
    }

    #[test]
    fn defaults_fetch_metric_and_auto_display() {
        let cfg = Config::default();

        assert_eq!(cfg.api.units, UnitSystem::Metric);
        assert_eq!(cfg.display.unit, DisplayUnit::Auto);
        assert_eq!(cfg.api.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.location.timeout(), Duration::from_secs(30));
        assert!(cfg.location.ip_lookup);
    }

    #[test]
    fn fixed_coordinates_need_both_halves() {
        let mut loc = LocationConfig { latitude: Some(1.0), ..Default::default() };
        assert_eq!(loc.fixed_coordinates(), None);

        loc.longitude = Some(2.0);
        assert_eq!(loc.fixed_coordinates(), Some(Coordinates::new(1.0, 2.0)));
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [api]
            api_key = "abc"
            units = "imperial"

            [display]
            unit = "celsius"

            [permissions]
            fine_location = "permanently_denied"
            "#,
        )
        .expect("valid toml");

        assert_eq!(cfg.api.units, UnitSystem::Imperial);
        assert_eq!(cfg.api.timeout_secs, 10);
        assert_eq!(cfg.display.unit, DisplayUnit::Celsius);
        assert_eq!(
            cfg.permissions.get(Permission::FineLocation),
            Some(PermissionStatus::PermanentlyDenied)
        );
        assert_eq!(cfg.permissions.get(Permission::CoarseLocation), None);
    }

    #[test]
    fn save_and_load_round_trip_through_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.set_api_key("KEY".into());
        cfg.display.region = Some("LR".into());
        cfg.permissions.set(Permission::CoarseLocation, PermissionStatus::Granted);
        cfg.save_to(&path).expect("save");

        let loaded = Config::load_from(&path).expect("load");
        assert_eq!(loaded.api_key().expect("key"), "KEY");
        assert_eq!(loaded.display.region.as_deref(), Some("LR"));
        assert_eq!(
            loaded.permissions.get(Permission::CoarseLocation),
            Some(PermissionStatus::Granted)
        );
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg = Config::load_from(&dir.path().join("absent.toml")).expect("defaults");
        assert!(cfg.api.api_key.is_none());
    }
}

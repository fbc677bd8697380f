//! Maps a [`WeatherResponse`] onto named display targets.

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

use crate::model::WeatherResponse;

pub const PLACEHOLDER: &str = "--";
pub const CELSIUS_GLYPH: &str = "°C";
pub const FAHRENHEIT_GLYPH: &str = "°F";

/// Regions that label temperatures in Fahrenheit.
const FAHRENHEIT_REGIONS: [&str; 3] = ["US", "LR", "MM"];

/// Text targets on the weather screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DisplayField {
    Main,
    Description,
    Temperature,
    Humidity,
    Min,
    Max,
    WindSpeed,
    Name,
    Country,
    Sunrise,
    Sunset,
}

impl DisplayField {
    pub const ALL: [DisplayField; 11] = [
        DisplayField::Main,
        DisplayField::Description,
        DisplayField::Temperature,
        DisplayField::Humidity,
        DisplayField::Min,
        DisplayField::Max,
        DisplayField::WindSpeed,
        DisplayField::Name,
        DisplayField::Country,
        DisplayField::Sunrise,
        DisplayField::Sunset,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            DisplayField::Main => "Weather",
            DisplayField::Description => "Description",
            DisplayField::Temperature => "Temperature",
            DisplayField::Humidity => "Humidity",
            DisplayField::Min => "Min",
            DisplayField::Max => "Max",
            DisplayField::WindSpeed => "Wind speed",
            DisplayField::Name => "Location",
            DisplayField::Country => "Country",
            DisplayField::Sunrise => "Sunrise",
            DisplayField::Sunset => "Sunset",
        }
    }
}

/// Bundled weather images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconAsset {
    Sunny,
    Cloud,
    Rain,
    Storm,
    Snowflake,
}

impl IconAsset {
    /// Look up an OpenWeather icon code. Unknown codes map to nothing.
    pub fn for_code(code: &str) -> Option<Self> {
        match code {
            "01d" => Some(IconAsset::Sunny),
            "02d" | "03d" | "04d" | "04n" | "01n" | "02n" | "03n" | "10n" => Some(IconAsset::Cloud),
            "10d" | "11n" => Some(IconAsset::Rain),
            "11d" => Some(IconAsset::Storm),
            "13d" | "13n" => Some(IconAsset::Snowflake),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IconAsset::Sunny => "sunny",
            IconAsset::Cloud => "cloud",
            IconAsset::Rain => "rain",
            IconAsset::Storm => "storm",
            IconAsset::Snowflake => "snowflake",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            IconAsset::Sunny => "☀",
            IconAsset::Cloud => "☁",
            IconAsset::Rain => "🌧",
            IconAsset::Storm => "⛈",
            IconAsset::Snowflake => "❄",
        }
    }
}

/// Where the presenter writes.
pub trait DisplaySurface: Send {
    fn set_text(&mut self, field: DisplayField, text: &str);
    fn set_image(&mut self, asset: IconAsset);
}

/// Temperature label preference. Independent of the units fetched from the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DisplayUnit {
    /// Derive the glyph from the region code.
    #[default]
    Auto,
    Celsius,
    Fahrenheit,
}

impl DisplayUnit {
    pub fn glyph(&self, region: Option<&str>) -> &'static str {
        match self {
            DisplayUnit::Celsius => CELSIUS_GLYPH,
            DisplayUnit::Fahrenheit => FAHRENHEIT_GLYPH,
            DisplayUnit::Auto => glyph_for_region(region.unwrap_or_default()),
        }
    }

    pub const fn all() -> &'static [DisplayUnit] {
        &[DisplayUnit::Auto, DisplayUnit::Celsius, DisplayUnit::Fahrenheit]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayUnit::Auto => "auto",
            DisplayUnit::Celsius => "celsius",
            DisplayUnit::Fahrenheit => "fahrenheit",
        }
    }
}

impl std::fmt::Display for DisplayUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for DisplayUnit {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "auto" => Ok(DisplayUnit::Auto),
            "celsius" | "c" => Ok(DisplayUnit::Celsius),
            "fahrenheit" | "f" => Ok(DisplayUnit::Fahrenheit),
            _ => Err(anyhow::anyhow!(
                "Unknown display unit '{value}'. Supported: auto, celsius, fahrenheit."
            )),
        }
    }
}

pub fn glyph_for_region(region: &str) -> &'static str {
    if FAHRENHEIT_REGIONS.iter().any(|r| r.eq_ignore_ascii_case(region.trim())) {
        FAHRENHEIT_GLYPH
    } else {
        CELSIUS_GLYPH
    }
}

/// Extract the region from a POSIX locale string such as `en_US.UTF-8`.
pub fn region_from_locale(locale: &str) -> Option<String> {
    let without_encoding = locale.split(['.', '@']).next()?;
    let region = without_encoding.split(['_', '-']).nth(1)?;

    (region.len() == 2 && region.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| region.to_ascii_uppercase())
}

/// `HH:MM:SS` wall-clock time of a Unix timestamp in `tz`.
pub fn format_time_of_day<Tz>(epoch_secs: i64, tz: &Tz) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    DateTime::from_timestamp(epoch_secs, 0)
        .map(|utc| utc.with_timezone(tz).format("%H:%M:%S").to_string())
}

fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[derive(Debug, Clone)]
pub struct WeatherPresenter<Tz: TimeZone = Local> {
    glyph: &'static str,
    tz: Tz,
}

impl WeatherPresenter<Local> {
    pub fn new(glyph: &'static str) -> Self {
        Self { glyph, tz: Local }
    }
}

impl<Tz> WeatherPresenter<Tz>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    pub fn with_timezone<T: TimeZone>(self, tz: T) -> WeatherPresenter<T> {
        WeatherPresenter { glyph: self.glyph, tz }
    }

    pub fn glyph(&self) -> &'static str {
        self.glyph
    }

    pub fn present(&self, response: &WeatherResponse, display: &mut dyn DisplaySurface) {
        if response.weather.is_empty() {
            display.set_text(DisplayField::Main, PLACEHOLDER);
            display.set_text(DisplayField::Description, PLACEHOLDER);
        }

        for condition in &response.weather {
            display.set_text(DisplayField::Main, or_placeholder(condition.main.clone()).as_str());
            display.set_text(
                DisplayField::Description,
                or_placeholder(condition.description.clone()).as_str(),
            );
            if let Some(asset) = condition.icon.as_deref().and_then(IconAsset::for_code) {
                display.set_image(asset);
            }
        }

        let main = response.main.unwrap_or_default();
        let sys = response.sys.clone().unwrap_or_default();

        let fields = [
            (DisplayField::Temperature, main.temp.map(|t| format!("{}{}", format_number(t), self.glyph))),
            (DisplayField::Humidity, main.humidity.map(|h| format!("{h} per cent"))),
            (DisplayField::Min, main.temp_min.map(|t| format!("{} min", format_number(t)))),
            (DisplayField::Max, main.temp_max.map(|t| format!("{} max", format_number(t)))),
            (DisplayField::WindSpeed, response.wind.and_then(|w| w.speed).map(format_number)),
            (DisplayField::Name, response.name.clone()),
            (DisplayField::Country, sys.country),
            (DisplayField::Sunrise, sys.sunrise.and_then(|s| format_time_of_day(s, &self.tz))),
            (DisplayField::Sunset, sys.sunset.and_then(|s| format_time_of_day(s, &self.tz))),
        ];

        for (field, text) in fields {
            display.set_text(field, or_placeholder(text).as_str());
        }
    }
}

fn or_placeholder(value: Option<String>) -> String {
    value.unwrap_or_else(|| PLACEHOLDER.to_string())
}

//! Core library for the `weather` CLI.
//!
//! This crate defines:
//! - Configuration & stored permission answers
//! - Location providers and the one-shot location fix
//! - The OpenWeather client behind the `WeatherProvider` trait
//! - The presenter that maps a response onto display fields
//! - The flow controller tying the stages together
//!
//! It is used by `weather-cli`, but any front end can implement the
//! collaborator traits (`Notifier`, `ProgressIndicator`, `DisplaySurface`,
//! `PermissionBackend`) and drive the same flow.

pub mod config;
pub mod connectivity;
pub mod flow;
pub mod location;
pub mod model;
pub mod notice;
pub mod permission;
pub mod presenter;
pub mod progress;
pub mod provider;

pub use config::Config;
pub use connectivity::{Connectivity, TcpProbe};
pub use flow::{FlowError, FlowSettings, Screen, WeatherFlow};
pub use location::{FusedLocationService, IpLocator, LocationFix, LocationService, Priority};
pub use model::{Coordinates, UnitSystem, WeatherQuery, WeatherResponse};
pub use notice::{Notice, Notifier};
pub use permission::{Permission, PermissionBackend, PermissionGate, PermissionStatus};
pub use presenter::{DisplayField, DisplaySurface, DisplayUnit, IconAsset, WeatherPresenter};
pub use progress::ProgressIndicator;
pub use provider::{WeatherError, WeatherProvider, provider_from_config};

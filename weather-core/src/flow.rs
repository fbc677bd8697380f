//! The single-screen pipeline: availability, permissions, fix, request, display.

use chrono::{Local, TimeZone};
use std::{fmt::Display, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::{
    connectivity::Connectivity,
    location::{LocationError, LocationFix, LocationService, Priority, is_location_enabled},
    model::{UnitSystem, WeatherQuery, WeatherResponse},
    notice::{Notice, Notifier},
    permission::{PermissionBackend, PermissionGate, PermissionOutcome},
    presenter::{CELSIUS_GLYPH, DisplaySurface, FAHRENHEIT_GLYPH, WeatherPresenter},
    progress::{ProgressGuard, ProgressIndicator},
    provider::{WeatherError, WeatherProvider},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("Location provider is disabled")]
    LocationProviderDisabled,
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location permission permanently denied")]
    PermissionPermanentlyDenied,
    #[error("Location unavailable: {0}")]
    LocationUnavailable(String),
    #[error("No internet connection available")]
    NoConnectivity,
    #[error("Bad request (HTTP 400)")]
    HttpBadRequest,
    #[error("Not found (HTTP 404)")]
    HttpNotFound,
    #[error("Weather API returned HTTP {0}")]
    HttpGenericError(u16),
    #[error("Transport failure: {0}")]
    TransportFailure(String),
    #[error("Cancelled")]
    Cancelled,
}

impl From<WeatherError> for FlowError {
    fn from(err: WeatherError) -> Self {
        match err {
            WeatherError::BadRequest => FlowError::HttpBadRequest,
            WeatherError::NotFound => FlowError::HttpNotFound,
            WeatherError::Http(code) => FlowError::HttpGenericError(code),
            WeatherError::Transport(msg) => FlowError::TransportFailure(msg),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FlowSettings {
    pub api_key: String,
    pub units: UnitSystem,
    pub priority: Priority,
    pub location_timeout: Duration,
}

impl FlowSettings {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            units: UnitSystem::Metric,
            priority: Priority::HighAccuracy,
            location_timeout: crate::location::DEFAULT_FIX_TIMEOUT,
        }
    }
}

/// UI collaborators owned by the caller and lent to the flow for one run.
pub struct Screen<'a> {
    pub notifier: &'a mut dyn Notifier,
    pub progress: &'a mut dyn ProgressIndicator,
    pub display: &'a mut dyn DisplaySurface,
}

pub struct WeatherFlow<B, Tz: TimeZone = Local> {
    location: Box<dyn LocationService>,
    permissions: PermissionGate<B>,
    connectivity: Box<dyn Connectivity>,
    provider: Box<dyn WeatherProvider>,
    presenter: WeatherPresenter<Tz>,
    settings: FlowSettings,
}

impl<B, Tz> WeatherFlow<B, Tz>
where
    B: PermissionBackend,
    Tz: TimeZone + Send + Sync,
    Tz::Offset: Display,
{
    pub fn new(
        location: Box<dyn LocationService>,
        permissions: PermissionGate<B>,
        connectivity: Box<dyn Connectivity>,
        provider: Box<dyn WeatherProvider>,
        presenter: WeatherPresenter<Tz>,
        settings: FlowSettings,
    ) -> Self {
        Self { location, permissions, connectivity, provider, presenter, settings }
    }

    pub fn permissions(&self) -> &PermissionGate<B> {
        &self.permissions
    }

    /// Run every stage once. Each failure is reported on `screen` where it
    /// happens and then returned.
    pub async fn run(
        &mut self,
        screen: &mut Screen<'_>,
        cancel: &CancellationToken,
    ) -> Result<WeatherResponse, FlowError> {
        self.warn_on_unit_mismatch();

        if !is_location_enabled(&*self.location) {
            warn!("no location provider enabled");
            return Err(fail(screen, Notice::LocationDisabled, FlowError::LocationProviderDisabled));
        }

        self.ensure_permissions(screen, cancel)?;

        let coordinates = LocationFix::new(&*self.location)
            .priority(self.settings.priority)
            .timeout(self.settings.location_timeout)
            .acquire(cancel)
            .await
            .map_err(|e| match e {
                LocationError::Cancelled => FlowError::Cancelled,
                LocationError::ProviderDisabled => {
                    fail(screen, Notice::LocationDisabled, FlowError::LocationProviderDisabled)
                }
                other => fail(
                    screen,
                    Notice::LocationUnavailable(other.to_string()),
                    FlowError::LocationUnavailable(other.to_string()),
                ),
            })?;

        let online = tokio::select! {
            _ = cancel.cancelled() => return Err(FlowError::Cancelled),
            up = self.connectivity.is_network_available() => up,
        };
        if !online {
            warn!("connectivity precheck failed, not calling the weather API");
            return Err(fail(screen, Notice::NoInternet, FlowError::NoConnectivity));
        }

        let query = WeatherQuery {
            coordinates,
            units: self.settings.units,
            api_key: self.settings.api_key.clone(),
        };

        let progress = ProgressGuard::show(&mut *screen.progress);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(FlowError::Cancelled),
            res = self.provider.get_weather(&query) => res.map_err(FlowError::from),
        };

        match outcome {
            Ok(response) => {
                progress.dismiss();
                info!(coordinates = %coordinates, "presenting weather");
                self.presenter.present(&response, &mut *screen.display);
                Ok(response)
            }
            Err(FlowError::Cancelled) => Err(FlowError::Cancelled),
            Err(err) => {
                drop(progress);
                error!(error = %err, "weather request failed");
                Err(fail(screen, Notice::RequestFailed(err.to_string()), err))
            }
        }
    }

    /// A backend that cancels `cancel` while prompting ends the flow silently,
    /// whatever answer it reported.
    fn ensure_permissions(
        &mut self,
        screen: &mut Screen<'_>,
        cancel: &CancellationToken,
    ) -> Result<(), FlowError> {
        let first = self.permissions.check();
        if cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        match first {
            PermissionOutcome::AllGranted => return Ok(()),
            PermissionOutcome::PermanentlyDenied => {
                return Err(permanently_denied(screen));
            }
            PermissionOutcome::RationaleNeeded => {
                screen.notifier.notify(&Notice::PermissionRationale);
            }
        }

        let second = self.permissions.check();
        if cancel.is_cancelled() {
            return Err(FlowError::Cancelled);
        }
        match second {
            PermissionOutcome::AllGranted => Ok(()),
            PermissionOutcome::PermanentlyDenied => Err(permanently_denied(screen)),
            PermissionOutcome::RationaleNeeded => {
                Err(fail(screen, Notice::PermissionDenied, FlowError::PermissionDenied))
            }
        }
    }

    fn warn_on_unit_mismatch(&self) {
        let glyph = self.presenter.glyph();
        let mismatch = match self.settings.units {
            UnitSystem::Metric => glyph == FAHRENHEIT_GLYPH,
            UnitSystem::Imperial => glyph == CELSIUS_GLYPH,
        };
        if mismatch {
            warn!(
                units = %self.settings.units,
                glyph,
                "display unit does not match the units fetched from the API"
            );
        }
    }
}

fn permanently_denied(screen: &mut Screen<'_>) -> FlowError {
    fail(screen, Notice::PermissionPermanentlyDenied, FlowError::PermissionPermanentlyDenied)
}

fn fail(screen: &mut Screen<'_>, notice: Notice, err: FlowError) -> FlowError {
    screen.notifier.notify(&notice);
    err
}

use std::fmt;

/// User-visible messages raised while the flow runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// No provider is on; the user should be sent to the location settings.
    LocationDisabled,
    PermissionRationale,
    PermissionDenied,
    /// The user should be sent to the app's settings page.
    PermissionPermanentlyDenied,
    LocationUnavailable(String),
    NoInternet,
    RequestFailed(String),
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::LocationDisabled => f.write_str("Please turn on your location provider."),
            Notice::PermissionRationale => f.write_str(
                "It looks like you have turned off permissions required for this feature. \
                 They can be enabled under application settings.",
            ),
            Notice::PermissionDenied => f.write_str("Location permission was not granted."),
            Notice::PermissionPermanentlyDenied => f.write_str(
                "You have denied location permission. Please allow it, it is mandatory.",
            ),
            Notice::LocationUnavailable(reason) => write!(f, "Location unavailable: {reason}"),
            Notice::NoInternet => f.write_str("No internet connection available."),
            Notice::RequestFailed(reason) => write!(f, "Could not load weather: {reason}"),
        }
    }
}

/// Toast/dialog sink.
pub trait Notifier: Send {
    fn notify(&mut self, notice: &Notice);
}

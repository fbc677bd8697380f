//! Runtime location permissions.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, warn};

/// The two permissions the flow needs before asking for a location fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    FineLocation,
    CoarseLocation,
}

impl Permission {
    pub const LOCATION: [Permission; 2] = [Permission::FineLocation, Permission::CoarseLocation];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::FineLocation => "fine_location",
            Permission::CoarseLocation => "coarse_location",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// The backend will not prompt again; only the settings page can change it.
    PermanentlyDenied,
}

/// Result of one pass through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionOutcome {
    AllGranted,
    RationaleNeeded,
    PermanentlyDenied,
}

/// Source of truth for permission state, and the thing that prompts the user.
pub trait PermissionBackend: Send {
    fn status(&self, permission: Permission) -> PermissionStatus;

    /// Prompt for `permissions` and report the answer for each one.
    fn request(&mut self, permissions: &[Permission]) -> Vec<(Permission, PermissionStatus)>;
}

#[derive(Debug)]
pub struct PermissionGate<B> {
    backend: B,
    permissions: Vec<Permission>,
}

impl<B: PermissionBackend> PermissionGate<B> {
    pub fn new(backend: B) -> Self {
        Self::with_permissions(backend, &Permission::LOCATION)
    }

    pub fn with_permissions(backend: B, permissions: &[Permission]) -> Self {
        Self { backend, permissions: permissions.to_vec() }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Check current state and prompt only for what is missing.
    pub fn check(&mut self) -> PermissionOutcome {
        let current: Vec<_> =
            self.permissions.iter().map(|p| (*p, self.backend.status(*p))).collect();

        if let Some(outcome) = settled(&current) {
            debug!(?outcome, "permissions settled without prompting");
            return outcome;
        }

        let missing: Vec<Permission> = current
            .iter()
            .filter(|(_, status)| *status != PermissionStatus::Granted)
            .map(|(p, _)| *p)
            .collect();

        debug!(?missing, "prompting for permissions");
        let answers = self.backend.request(&missing);

        let merged: Vec<_> = current
            .iter()
            .map(|(p, status)| {
                let answer = answers.iter().find(|(q, _)| q == p).map(|(_, s)| *s);
                (*p, answer.unwrap_or(*status))
            })
            .collect();

        let outcome = settled(&merged).unwrap_or(PermissionOutcome::RationaleNeeded);
        if outcome != PermissionOutcome::AllGranted {
            warn!(?outcome, "location permission not granted");
        }
        outcome
    }
}

fn settled(statuses: &[(Permission, PermissionStatus)]) -> Option<PermissionOutcome> {
    if statuses.iter().all(|(_, s)| *s == PermissionStatus::Granted) {
        Some(PermissionOutcome::AllGranted)
    } else if statuses.iter().any(|(_, s)| *s == PermissionStatus::PermanentlyDenied) {
        Some(PermissionOutcome::PermanentlyDenied)
    } else {
        None
    }
}

use inquire::{InquireError, Select};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use weather_core::{
    Permission, PermissionBackend, PermissionStatus, config::PermissionsConfig,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Allow,
    Deny,
    DenyForever,
}

impl Answer {
    const ALL: [Answer; 3] = [Answer::Allow, Answer::Deny, Answer::DenyForever];

    fn status(self) -> PermissionStatus {
        match self {
            Answer::Allow => PermissionStatus::Granted,
            Answer::Deny => PermissionStatus::Denied,
            Answer::DenyForever => PermissionStatus::PermanentlyDenied,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Answer::Allow => "Allow",
            Answer::Deny => "Deny",
            Answer::DenyForever => "Deny and don't ask again",
        })
    }
}

/// Permission state kept in the config file, asked for on the terminal.
#[derive(Debug)]
pub struct PromptPermissions {
    stored: PermissionsConfig,
    auto_grant: bool,
    /// Cancelled when the prompt is interrupted with Ctrl-C.
    cancel: CancellationToken,
}

impl PromptPermissions {
    pub fn new(stored: PermissionsConfig, auto_grant: bool, cancel: CancellationToken) -> Self {
        Self { stored, auto_grant, cancel }
    }

    /// Answers to write back to the config file.
    pub fn stored(&self) -> &PermissionsConfig {
        &self.stored
    }

    /// `None` means the user interrupted the prompt and gave no answer.
    fn ask(&self, permissions: &[Permission]) -> Option<PermissionStatus> {
        if self.auto_grant {
            return Some(PermissionStatus::Granted);
        }

        let names: Vec<&str> = permissions.iter().map(Permission::as_str).collect();
        let prompt = format!("Allow weather to use your location ({})?", names.join(", "));

        self.answer(Select::new(&prompt, Answer::ALL.to_vec()).prompt())
    }

    fn answer(&self, prompted: Result<Answer, InquireError>) -> Option<PermissionStatus> {
        match prompted {
            Ok(answer) => Some(answer.status()),
            Err(InquireError::OperationInterrupted) => {
                info!("permission prompt interrupted, cancelling");
                self.cancel.cancel();
                None
            }
            Err(e) => {
                warn!(error = %e, "could not prompt for location permission");
                Some(PermissionStatus::Denied)
            }
        }
    }
}

impl PermissionBackend for PromptPermissions {
    fn status(&self, permission: Permission) -> PermissionStatus {
        self.stored.get(permission).unwrap_or(PermissionStatus::Denied)
    }

    fn request(&mut self, permissions: &[Permission]) -> Vec<(Permission, PermissionStatus)> {
        let Some(status) = self.ask(permissions) else {
            return permissions.iter().map(|p| (*p, self.status(*p))).collect();
        };

        permissions
            .iter()
            .map(|p| {
                self.stored.set(*p, status);
                (*p, status)
            })
            .collect()
    }
}

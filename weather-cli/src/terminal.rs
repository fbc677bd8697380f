//! Terminal implementations of the screen collaborators.

use std::{collections::BTreeMap, fmt::Write as _, io::Write as _, path::PathBuf};

use weather_core::{DisplayField, DisplaySurface, IconAsset, Notice, Notifier, ProgressIndicator};

/// Prints notices to stderr, with a hint where the user can act on them.
#[derive(Debug, Default)]
pub struct TerminalNotifier {
    config_path: Option<PathBuf>,
}

impl TerminalNotifier {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    fn hint(&self, notice: &Notice) -> Option<String> {
        let config = self
            .config_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "the config file".to_string());

        match notice {
            Notice::LocationDisabled => Some(format!(
                "Hint: pass --lat/--lon, or set [location] latitude/longitude or ip_lookup = true in {config}."
            )),
            Notice::PermissionPermanentlyDenied => {
                Some("Hint: run `weather permissions reset` to be asked again.".to_string())
            }
            _ => None,
        }
    }
}

impl Notifier for TerminalNotifier {
    fn notify(&mut self, notice: &Notice) {
        eprintln!("{notice}");
        if let Some(hint) = self.hint(notice) {
            eprintln!("{hint}");
        }
    }
}

#[derive(Debug, Default)]
pub struct TerminalProgress;

impl ProgressIndicator for TerminalProgress {
    fn show(&mut self) {
        eprint!("Fetching weather... ");
        let _ = std::io::stderr().flush();
    }

    fn dismiss(&mut self) {
        eprintln!("done.");
    }
}

/// Buffers the presenter's writes and renders them as a table.
#[derive(Debug, Default)]
pub struct TerminalDisplay {
    fields: BTreeMap<DisplayField, String>,
    icon: Option<IconAsset>,
}

impl TerminalDisplay {
    pub fn render(&self) -> String {
        let mut out = String::new();

        if let Some(icon) = self.icon {
            let _ = writeln!(out, "{}  {}", icon.symbol(), icon.name());
        }

        let width = DisplayField::ALL.iter().map(|f| f.label().len()).max().unwrap_or_default();
        for field in DisplayField::ALL {
            if let Some(text) = self.fields.get(&field) {
                let _ = writeln!(out, "{:<width$}  {}", field.label(), text);
            }
        }

        out
    }
}

impl DisplaySurface for TerminalDisplay {
    fn set_text(&mut self, field: DisplayField, text: &str) {
        self.fields.insert(field, text.to_string());
    }

    fn set_image(&mut self, asset: IconAsset) {
        self.icon = Some(asset);
    }
}

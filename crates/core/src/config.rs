//! Application configuration loading.
//!
//! Settings are read once at startup from a JSON file and consumed by the
//! application shell; the synchronization core never touches them directly.
//!
//! # Example
//!
//! ```
//! use renderhost_core::Settings;
//!
//! let settings: Settings = serde_json::from_str(
//!     r#"{"application_settings": {"name": "demo", "window_width": 800, "window_height": 600}}"#,
//! ).unwrap();
//! assert_eq!(settings.application_settings.window_width, 800);
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::{Error, Result};

fn default_name() -> String {
    "renderhost".to_string()
}

fn default_window_width() -> u32 {
    1280
}

fn default_window_height() -> u32 {
    768
}

/// Display-related application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    /// Display name used for the window title.
    #[serde(default = "default_name")]
    pub name: String,
    /// Initial window width in pixels.
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    /// Initial window height in pixels.
    #[serde(default = "default_window_height")]
    pub window_height: u32,
}

impl Default for ApplicationSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            window_width: default_window_width(),
            window_height: default_window_height(),
        }
    }
}

/// Root settings record.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    /// Display settings consumed at startup.
    #[serde(default)]
    pub application_settings: ApplicationSettings,
}

impl Settings {
    /// Loads settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or does not parse as a
    /// settings record.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let settings: Settings = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        info!(
            "Loaded settings from {}: '{}' {}x{}",
            path.display(),
            settings.application_settings.name,
            settings.application_settings.window_width,
            settings.application_settings.window_height
        );

        Ok(settings)
    }

    /// Loads settings from a JSON file, falling back to defaults when the
    /// file is missing.
    ///
    /// A present-but-malformed file is still an error; only absence falls
    /// back silently.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            info!(
                "No settings file at {}, using defaults",
                path.display()
            );
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_record() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "application_settings": {
                    "name": "demo",
                    "window_width": 1920,
                    "window_height": 1080
                }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.application_settings.name, "demo");
        assert_eq!(settings.application_settings.window_width, 1920);
        assert_eq!(settings.application_settings.window_height, 1080);
    }

    #[test]
    fn missing_fields_use_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"application_settings": {"name": "demo"}}"#).unwrap();

        assert_eq!(settings.application_settings.window_width, 1280);
        assert_eq!(settings.application_settings.window_height, 768);
    }

    #[test]
    fn empty_record_uses_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();

        assert_eq!(settings.application_settings.name, "renderhost");
        assert_eq!(settings.application_settings.window_width, 1280);
        assert_eq!(settings.application_settings.window_height, 768);
    }

    #[test]
    fn load_or_default_handles_missing_file() {
        let settings = Settings::load_or_default(Path::new("does/not/exist.json")).unwrap();
        assert_eq!(settings.application_settings.name, "renderhost");
    }
}

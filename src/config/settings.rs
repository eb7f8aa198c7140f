//! Engine settings loaded from config.toml
//!
//! Only operational knobs live here. Production lead time, just-because spacing
//! and the plan allotment table are fixed constants in their own modules.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Default number of days past the lead time within which orders are materialized.
pub const DEFAULT_ORDER_WINDOW_DAYS: i64 = 30;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Batch scheduling settings
    #[serde(default)]
    pub scheduling: SchedulingSettings,
}

/// Settings for the `create_due_orders` batch pass
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SchedulingSettings {
    /// An on-time occurrence becomes due once it is at most
    /// `LEAD_TIME_DAYS + order_window_days` days away.
    #[serde(default = "default_order_window_days")]
    pub order_window_days: i64,
}

const fn default_order_window_days() -> i64 {
    DEFAULT_ORDER_WINDOW_DAYS
}

impl Default for SchedulingSettings {
    fn default() -> Self {
        Self {
            order_window_days: DEFAULT_ORDER_WINDOW_DAYS,
        }
    }
}

/// Parses settings from a TOML string and validates them.
///
/// # Errors
/// Returns [`Error::Configuration`] if the TOML is invalid or a value is out of range.
pub fn parse_settings(contents: &str) -> Result<Settings> {
    let settings: Settings = toml::from_str(contents).map_err(|e| Error::Configuration {
        message: format!("Failed to parse config.toml: {e}"),
    })?;

    if settings.scheduling.order_window_days < 0 {
        return Err(Error::Configuration {
            message: format!(
                "scheduling.order_window_days must be non-negative, got {}",
                settings.scheduling.order_window_days
            ),
        });
    }

    Ok(settings)
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A value is out of range
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Configuration {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_settings(&contents)
}

/// Loads settings from the default location (./config.toml), using defaults if
/// the file does not exist.
pub fn load_default_settings() -> Result<Settings> {
    let path = Path::new("config.toml");
    if path.exists() {
        load_settings(path)
    } else {
        info!("No config.toml found, using default settings");
        Ok(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_parse_settings() {
        let settings = parse_settings(
            r"
            [scheduling]
            order_window_days = 10
        ",
        )
        .unwrap();
        assert_eq!(settings.scheduling.order_window_days, 10);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let settings = parse_settings("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(
            settings.scheduling.order_window_days,
            DEFAULT_ORDER_WINDOW_DAYS
        );
    }

    #[test]
    fn test_negative_window_rejected() {
        let result = parse_settings(
            r"
            [scheduling]
            order_window_days = -1
        ",
        );
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let result = parse_settings("[scheduling\norder_window_days = 3");
        assert!(matches!(result, Err(Error::Configuration { .. })));
    }
}

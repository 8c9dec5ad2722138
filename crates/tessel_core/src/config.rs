//! Runtime configuration
//!
//! Timing and navigation knobs shared by every widget. Values can be built
//! in code (`RuntimeConfig::default()`) or loaded from a TOML file:
//!
//! ```toml
//! typeahead_timeout_ms = 800
//! rotate_navigation = true
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Shared interaction timings
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RuntimeConfig {
    /// Idle time before a typeahead query resets
    #[serde(default = "default_typeahead_timeout_ms")]
    pub typeahead_timeout_ms: u64,
    /// Scheduling ticks a blur waits before closing a popup
    #[serde(default = "default_blur_defer_ticks")]
    pub blur_defer_ticks: u32,
    /// Delay before a menu item's select callback runs
    #[serde(default)]
    pub menu_select_delay_ms: u64,
    /// Wrap around at the ends of a collection
    #[serde(default)]
    pub rotate_navigation: bool,
    /// Idle time before a listbox leaves its searching state
    #[serde(default = "default_typeahead_timeout_ms")]
    pub listbox_typeahead_clear_ms: u64,
}

fn default_typeahead_timeout_ms() -> u64 {
    1000
}

fn default_blur_defer_ticks() -> u32 {
    1
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            typeahead_timeout_ms: default_typeahead_timeout_ms(),
            blur_defer_ticks: default_blur_defer_ticks(),
            menu_select_delay_ms: 0,
            rotate_navigation: false,
            listbox_typeahead_clear_ms: default_typeahead_timeout_ms(),
        }
    }
}

impl RuntimeConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: RuntimeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "loaded runtime configuration");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.typeahead_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "typeahead_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.listbox_typeahead_clear_ms == 0 {
            return Err(ConfigError::Invalid(
                "listbox_typeahead_clear_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn typeahead_timeout(&self) -> Duration {
        Duration::from_millis(self.typeahead_timeout_ms)
    }

    pub fn menu_select_delay(&self) -> Duration {
        Duration::from_millis(self.menu_select_delay_ms)
    }

    pub fn listbox_typeahead_clear(&self) -> Duration {
        Duration::from_millis(self.listbox_typeahead_clear_ms)
    }
}

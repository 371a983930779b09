use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::settings::DEFAULT_NAMESPACE;

/// Static configuration of the mirror
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MirrorConfig {
    /// Display name given to the output surface
    #[serde(default = "default_dest_name")]
    pub dest_name: String,

    /// Namespace of the reactive settings (`<namespace>.enabled`, ...)
    #[serde(default = "default_namespace")]
    pub settings_namespace: String,

    /// Delay before the output surface is created, in milliseconds.
    /// Creation cannot happen inside a modification callback.
    #[serde(default = "default_creation_delay")]
    pub creation_delay_ms: u64,

    /// Hide the host's output panel after a build is launched
    #[serde(default = "default_true")]
    pub hide_panel_on_build: bool,

    /// Delay before hiding the output panel, so it runs after the host shows it
    #[serde(default = "default_hide_panel_delay")]
    pub hide_panel_delay_ms: u64,

    /// Delay before restoring the previous viewport in `last` scroll mode
    #[serde(default = "default_restore_scroll_delay")]
    pub restore_scroll_delay_ms: u64,

    /// Above this many open surfaces the stale output cleanup scan is skipped
    #[serde(default = "default_stale_scan_limit")]
    pub stale_scan_limit: usize,

    /// Surface settings copied from the source to the output surface
    /// (e.g. the regexes that make `file:line` results clickable)
    #[serde(default = "default_pass_through_settings")]
    pub pass_through_settings: Vec<String>,

    /// Give focus back to the surface the build was launched from once the
    /// output surface is created
    #[serde(default = "default_true")]
    pub refocus_launcher: bool,

    /// Never reuse a remembered location inside the launching surface's group
    #[serde(default = "default_false")]
    pub avoid_source_group: bool,
}

fn default_dest_name() -> String {
    "Build output".to_string()
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_creation_delay() -> u64 {
    100
}

fn default_hide_panel_delay() -> u64 {
    500
}

fn default_restore_scroll_delay() -> u64 {
    100
}

fn default_stale_scan_limit() -> usize {
    64
}

fn default_pass_through_settings() -> Vec<String> {
    vec![
        "result_file_regex".to_string(),
        "result_line_regex".to_string(),
        "result_base_dir".to_string(),
    ]
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

/// Upper bound for any configured delay
const MAX_DELAY_MS: u64 = 10_000;

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            dest_name: default_dest_name(),
            settings_namespace: default_namespace(),
            creation_delay_ms: default_creation_delay(),
            hide_panel_on_build: true,
            hide_panel_delay_ms: default_hide_panel_delay(),
            restore_scroll_delay_ms: default_restore_scroll_delay(),
            stale_scan_limit: default_stale_scan_limit(),
            pass_through_settings: default_pass_through_settings(),
            refocus_launcher: true,
            avoid_source_group: false,
        }
    }
}

impl MirrorConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: MirrorConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path.as_ref(), contents).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// JSON schema of the config file
    pub fn json_schema() -> Result<String, ConfigError> {
        let schema = schemars::schema_for!(MirrorConfig);
        serde_json::to_string_pretty(&schema).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dest_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "dest_name cannot be empty".to_string(),
            ));
        }

        if self.settings_namespace.is_empty() || self.settings_namespace.contains('.') {
            return Err(ConfigError::ValidationError(
                "settings_namespace must be a non-empty name without dots".to_string(),
            ));
        }

        for (name, value) in [
            ("creation_delay_ms", self.creation_delay_ms),
            ("hide_panel_delay_ms", self.hide_panel_delay_ms),
            ("restore_scroll_delay_ms", self.restore_scroll_delay_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(ConfigError::ValidationError(format!(
                    "{name} must be <= {MAX_DELAY_MS}"
                )));
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {msg}"),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            ConfigError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

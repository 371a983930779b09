//! Reactive settings.
//!
//! A [`ReactiveSetting`] reads a typed value from a [`SettingsStore`],
//! validates it on every read and write, and can carry a local override
//! set by a toggle command. When the store reports a change for the
//! setting's key, the cached value is refreshed so later reads never hit
//! the store.
//!
//! Values outside their domain (wrong JSON type, unknown enum variant, or
//! not in the setting's valid set) silently fall back to the default.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::path::Path;

use crate::config::ConfigError;

/// Namespace used when no config overrides it
pub const DEFAULT_NAMESPACE: &str = "buildview";

/// Backing store for settings, keyed by full setting key
/// (`"<namespace>.<name>"`)
pub trait SettingsStore {
    fn get(&self, key: &str) -> Option<serde_json::Value>;

    fn set(&mut self, key: &str, value: serde_json::Value);
}

/// Settings held in a map, optionally loaded from a flat JSON object
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySettingsStore {
    values: HashMap<String, serde_json::Value>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a flat JSON object such as `{"buildview.scroll": "top"}`
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.as_ref().display(), e)))?;

        let values: HashMap<String, serde_json::Value> = serde_json::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.as_ref().display(), e)))?;

        Ok(Self { values })
    }
}

impl SettingsStore for MemorySettingsStore {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: serde_json::Value) {
        self.values.insert(key.to_string(), value);
    }
}

/// A typed setting backed by a [`SettingsStore`]
#[derive(Debug, Clone)]
pub struct ReactiveSetting<T> {
    namespace: String,
    key: String,
    default: T,
    /// Enumerated domain; `None` accepts anything that decodes
    valid: Option<Vec<T>>,
    dirty: bool,
    override_value: T,
    /// Last validated value read from the store
    live: T,
}

impl<T> ReactiveSetting<T>
where
    T: Clone + PartialEq + Debug + Serialize + DeserializeOwned,
{
    pub fn new(namespace: &str, name: &str, default: T) -> Self {
        Self {
            namespace: namespace.to_string(),
            key: format!("{namespace}.{name}"),
            default: default.clone(),
            valid: None,
            dirty: false,
            override_value: default.clone(),
            live: default,
        }
    }

    /// A setting restricted to `valid` values
    pub fn enumerated(namespace: &str, name: &str, default: T, valid: Vec<T>) -> Self {
        Self {
            valid: Some(valid),
            ..Self::new(namespace, name, default)
        }
    }

    /// Create the setting and read its current value from `store`
    pub fn bind(mut self, store: &dyn SettingsStore) -> Self {
        self.reload(store);
        self
    }

    /// Full key, `"<namespace>.<name>"`
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Effective value: the override if one was set, else the cached store value
    pub fn get(&self) -> T {
        let value = if self.dirty {
            &self.override_value
        } else {
            &self.live
        };
        self.clamp(value.clone())
    }

    /// Override the store value locally
    pub fn set(&mut self, value: T) {
        self.override_value = self.clamp(value);
        self.dirty = true;
    }

    /// Drop the local override and go back to the store value
    pub fn clear_override(&mut self) {
        self.dirty = false;
        self.override_value = self.default.clone();
    }

    /// Re-read the store and cache the validated value
    pub fn reload(&mut self, store: &dyn SettingsStore) {
        self.live = self.read_from(store);
    }

    /// React to a store change notification. `key` may be this setting's
    /// full key or its namespace. The newest store value wins over a local
    /// override. Returns whether the notification concerned this setting.
    pub fn on_store_changed(&mut self, key: &str, store: &dyn SettingsStore) -> bool {
        if key != self.key && key != self.namespace {
            return false;
        }
        self.reload(store);
        self.dirty = false;
        tracing::trace!("Setting {} is now {:?}", self.key, self.live);
        true
    }

    /// Validated value stored under this setting's key
    pub fn read_from(&self, store: &dyn SettingsStore) -> T {
        let Some(raw) = store.get(&self.key) else {
            return self.default.clone();
        };
        match serde_json::from_value::<T>(raw.clone()) {
            Ok(value) => self.clamp(value),
            Err(_) => {
                tracing::debug!(
                    "Invalid value {} for setting {}, using default {:?}",
                    raw,
                    self.key,
                    self.default
                );
                self.default.clone()
            }
        }
    }

    /// Write `value` (clamped to the valid set) to the store
    pub fn write_to(&self, store: &mut dyn SettingsStore, value: T) {
        let value = self.clamp(value);
        match serde_json::to_value(&value) {
            Ok(json) => store.set(&self.key, json),
            Err(e) => tracing::warn!("Failed to serialize setting {}: {}", self.key, e),
        }
    }

    fn clamp(&self, value: T) -> T {
        match &self.valid {
            Some(valid) if !valid.contains(&value) => self.default.clone(),
            _ => value,
        }
    }
}

impl ReactiveSetting<bool> {
    /// Flip the effective value and keep it as an override
    pub fn set_opposite(&mut self) -> bool {
        let value = !self.get();
        self.set(value);
        value
    }
}

/// How the output surface follows new content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ScrollMode {
    /// Show the start of the output once after it is (re)built
    Top,
    /// Keep the end of the output in view
    #[default]
    Bottom,
    /// Keep the viewport where it was before the build restarted
    Last,
}

impl ScrollMode {
    pub const ALL: [ScrollMode; 3] = [ScrollMode::Bottom, ScrollMode::Top, ScrollMode::Last];
}

/// Setting names inside the namespace
pub const ENABLED: &str = "enabled";
pub const SCROLL: &str = "scroll";
pub const SILENCE_MODIFIED_WARNING: &str = "silence_modified_warning";

/// The settings one mirror session reads
#[derive(Debug, Clone)]
pub struct MirrorSettings {
    pub enabled: ReactiveSetting<bool>,
    pub scroll: ReactiveSetting<ScrollMode>,
    /// Whether the output surface suppresses the "save changes?" prompt
    pub silence_modified_warning: ReactiveSetting<bool>,
}

impl MirrorSettings {
    /// Snapshot the current store values
    pub fn from_store(namespace: &str, store: &dyn SettingsStore) -> Self {
        Self {
            enabled: ReactiveSetting::new(namespace, ENABLED, true).bind(store),
            scroll: ReactiveSetting::enumerated(
                namespace,
                SCROLL,
                ScrollMode::default(),
                ScrollMode::ALL.to_vec(),
            )
            .bind(store),
            silence_modified_warning: ReactiveSetting::new(namespace, SILENCE_MODIFIED_WARNING, true)
                .bind(store),
        }
    }

    /// Take a fresh snapshot of the store, dropping local overrides
    pub fn reload(&mut self, store: &dyn SettingsStore) {
        self.enabled.clear_override();
        self.enabled.reload(store);
        self.scroll.clear_override();
        self.scroll.reload(store);
        self.silence_modified_warning.clear_override();
        self.silence_modified_warning.reload(store);
    }

    /// Forward a store change notification to every setting
    pub fn on_store_changed(&mut self, key: &str, store: &dyn SettingsStore) -> bool {
        let enabled = self.enabled.on_store_changed(key, store);
        let scroll = self.scroll.on_store_changed(key, store);
        let silence = self.silence_modified_warning.on_store_changed(key, store);
        enabled || scroll || silence
    }
}

//! TOML-based application configuration.
//!
//! Stores the coach's defaults:
//! - Circuit work/rest/rounds and the station list used by the next Start
//! - Dynamic and static stretch durations
//! - Drill countdown length
//! - Refresh and store polling intervals
//!
//! Configuration is stored at `<data dir>/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::session::{CircuitSelection, TrackSettings};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitConfig {
    #[serde(default = "default_work")]
    pub work: u64,
    #[serde(default = "default_rest")]
    pub rest: u64,
    #[serde(default = "default_rounds")]
    pub rounds: u32,
    #[serde(default)]
    pub stations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StretchConfig {
    #[serde(default = "default_dynamic")]
    pub dynamic: TrackSettings,
    #[serde(rename = "static", default = "default_static")]
    pub stat: TrackSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrillConfig {
    #[serde(default = "default_drill_duration")]
    pub duration: u64,
    #[serde(default = "default_extend_by")]
    pub extend_by: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Re-derivation period while a session is running.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// How often the SQLite store looks for other processes' commits.
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub circuit: CircuitConfig,
    #[serde(default)]
    pub stretch: StretchConfig,
    #[serde(default)]
    pub drill: DrillConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
}

// Default functions
fn default_work() -> u64 {
    45
}
fn default_rest() -> u64 {
    15
}
fn default_rounds() -> u32 {
    3
}
fn default_dynamic() -> TrackSettings {
    TrackSettings::DYNAMIC
}
fn default_static() -> TrackSettings {
    TrackSettings::STATIC
}
fn default_drill_duration() -> u64 {
    90
}
fn default_extend_by() -> u64 {
    30
}
fn default_tick_ms() -> u64 {
    1000
}
fn default_poll_ms() -> u64 {
    500
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            work: default_work(),
            rest: default_rest(),
            rounds: default_rounds(),
            stations: Vec::new(),
        }
    }
}

impl Default for StretchConfig {
    fn default() -> Self {
        Self {
            dynamic: default_dynamic(),
            stat: default_static(),
        }
    }
}

impl Default for DrillConfig {
    fn default() -> Self {
        Self {
            duration: default_drill_duration(),
            extend_by: default_extend_by(),
        }
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            poll_ms: default_poll_ms(),
        }
    }
}

impl RefreshConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }
        key.split('.').try_fold(root, |current, part| current.get(part))
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }
        let parent = match parent_path {
            Some(path) => path
                .split('.')
                .try_fold(&mut *root, |current, part| current.get_mut(part))
                .ok_or_else(unknown)?,
            None => root,
        };
        let obj = parent.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => serde_json::Value::Number(
                value
                    .parse::<u64>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?
                    .into(),
            ),
            // Lists accept JSON or a comma-separated shorthand.
            serde_json::Value::Array(_) => match serde_json::from_str(value) {
                Ok(serde_json::Value::Array(items)) => serde_json::Value::Array(items),
                _ => serde_json::Value::Array(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| serde_json::Value::String(s.to_string()))
                        .collect(),
                ),
            },
            serde_json::Value::Object(_) => return Err(unknown()),
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    pub fn path() -> Result<PathBuf, ConfigError> {
        data_dir()
            .map(|dir| dir.join("config.toml"))
            .map_err(|e| ConfigError::LoadFailed {
                path: PathBuf::from("config.toml"),
                message: e.to_string(),
            })
    }

    /// Load from disk, writing the defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| failed(e.to_string()))
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        match Self::get_json_value_by_path(&json, key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a value by dot-separated key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse
    /// as the key's type.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// The selection the next circuit Start will snapshot.
    pub fn circuit_selection(&self) -> CircuitSelection {
        CircuitSelection {
            work: self.circuit.work,
            rest: self.circuit.rest,
            rounds: self.circuit.rounds,
            stations: self.circuit.stations.clone(),
        }
    }
}

//! TOML-based configuration.
//!
//! Two service sections plus optional logging settings:
//! - `[insight]`: session source login, UTC offset, feed shape
//! - `[beeminder]`: goal account, auth token, goal name
//! - `[logging]`: diagnostic log file location
//!
//! Configuration is stored at `~/.config/beesight/config.toml` unless a path
//! is given explicitly. Every field is optional at parse time; required keys
//! are checked when the file is resolved into [`SyncSettings`](super::SyncSettings).

use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::reconcile::FeedFormat;

/// Written by `config init`.
pub const CONFIG_TEMPLATE: &str = r#"[insight]
username = ""
password = ""
# Hours to add to the session source's reporting zone, e.g. "9.0" or "-5.5".
utc_timezone = "0.0"
# "csv" (tabular export) or "json" (session listing).
feed = "csv"
# header_rows = 2
# trailer_rows = 1

[beeminder]
username = ""
auth_token = ""
goal_name = ""
# detailed_comment = false

[logging]
# file = "beesight.log"
"#;

/// Session source (Insight Timer) section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Float hours, kept as written.
    #[serde(default, deserialize_with = "string_or_number")]
    pub utc_timezone: Option<String>,
    #[serde(default)]
    pub feed: FeedFormat,
    #[serde(default)]
    pub header_rows: Option<usize>,
    #[serde(default)]
    pub trailer_rows: Option<usize>,
    /// Override for the service root, used against staging or mock servers.
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Goal service (Beeminder) section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeeminderConfig {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default)]
    pub goal_name: Option<String>,
    #[serde(default)]
    pub detailed_comment: bool,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub file: Option<String>,
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub insight: InsightConfig,
    #[serde(default)]
    pub beeminder: BeeminderConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

const REDACTED: &str = "********";

fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Str(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    }))
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn leaf_mut<'a>(
        root: &'a mut serde_json::Value,
        key: &str,
    ) -> Result<&'a mut serde_json::Value, ConfigError> {
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        for part in key.split('.') {
            current = current
                .as_object_mut()
                .and_then(|obj| obj.get_mut(part))
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        if current.is_object() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }
        Ok(current)
    }

    /// Candidate JSON encodings of `value`, in order of preference.
    fn candidates(existing: &serde_json::Value, value: &str) -> Vec<serde_json::Value> {
        use serde_json::Value;

        let literal = serde_json::from_str::<Value>(value)
            .ok()
            .filter(|v| v.is_number() || v.is_boolean());

        match existing {
            Value::Bool(_) => value.parse::<bool>().map(Value::Bool).into_iter().collect(),
            Value::Number(_) => literal.into_iter().collect(),
            _ => std::iter::once(Value::String(value.to_string()))
                .chain(literal)
                .collect(),
        }
    }

    /// `~/.config/beesight/config.toml`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/beesight"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::LoadFailed`] if the file cannot be read and
    /// [`ConfigError::ParseFailed`] if it is not valid TOML for this schema.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.to_path_buf(),
            message: if e.kind() == std::io::ErrorKind::NotFound {
                "file not found (run `beesight config init`)".to_string()
            } else {
                e.to_string()
            },
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Persist to an explicit path.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Write [`CONFIG_TEMPLATE`] unless a file already exists. Returns whether it wrote.
    pub fn write_template(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        let save_failed = |e: std::io::Error| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(save_failed)?;
        }
        std::fs::write(path, CONFIG_TEMPLATE).map_err(save_failed)?;
        Ok(true)
    }

    /// Get a value by dot-separated key. `Ok(None)` means the key exists but is unset.
    pub fn get(&self, key: &str) -> Result<Option<String>, ConfigError> {
        let json = serde_json::to_value(self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        let val = Self::get_json_value_by_path(&json, key)
            .filter(|v| !v.is_object())
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        Ok(match val {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
    }

    /// Set a value by dot-separated key. The change is in memory only.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let json = serde_json::to_value(&*self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;

        let mut probe = json.clone();
        let existing = Self::leaf_mut(&mut probe, key)?.clone();

        for candidate in Self::candidates(&existing, value) {
            let mut attempt = json.clone();
            *Self::leaf_mut(&mut attempt, key)? = candidate;
            if let Ok(updated) = serde_json::from_value::<Config>(attempt) {
                *self = updated;
                return Ok(());
            }
        }

        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("cannot use '{value}' here"),
        })
    }

    /// Copy with secrets masked, for display.
    pub fn redacted(&self) -> Self {
        let mask = |v: &Option<String>| v.as_ref().map(|_| REDACTED.to_string());
        let mut out = self.clone();
        out.insight.password = mask(&self.insight.password);
        out.beeminder.auth_token = mask(&self.beeminder.auth_token);
        out
    }
}

//! TOML-based configuration for Strata.
//!
//! Supports a config file (strata.toml) with environment variable expansion
//! in string values.
//!
//! Example configuration:
//! ```toml
//! [database]
//! path = "${STRATA_HOME}/metadata.db"
//! busy_timeout_ms = 5000
//!
//! [migrations]
//! fail_on_error = false
//!
//! [inference]
//! resolver = "naming"   # or "inflection"
//!
//! [diagram]
//! node_width = 300
//! node_height = 200
//! spacing = 50
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Error type for settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseSettings,
    pub migrations: MigrationSettings,
    pub inference: InferenceSettings,
    pub diagram: DiagramSettings,
}

/// Database location and connection behaviour.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// Database file path (supports ${ENV_VAR} expansion). `:memory:` opens
    /// an in-memory database; unset uses the platform data directory.
    pub path: Option<String>,

    /// How long a statement waits on a locked database, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: 5000,
        }
    }
}

impl DatabaseSettings {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Startup migration behaviour.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MigrationSettings {
    /// Refuse to start when a migration step fails. Off by default: failed
    /// steps are logged and startup continues.
    pub fail_on_error: bool,
}

/// Which resolver the relationship inferencer uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolverKind {
    /// Exact, token + "s", token minus last character.
    #[default]
    Naming,
    /// English pluralization/singularization.
    Inflection,
}

/// Inference settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub resolver: ResolverKind,
}

/// Diagram layout settings.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct DiagramSettings {
    pub node_width: u32,
    pub node_height: u32,
    pub spacing: u32,
}

impl Default for DiagramSettings {
    fn default() -> Self {
        Self {
            node_width: 300,
            node_height: 200,
            spacing: 50,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SettingsError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML text, expanding environment variables.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let mut settings: Settings = toml::from_str(content)?;
        settings.resolve()?;
        Ok(settings)
    }

    /// Load settings from the default config file locations.
    ///
    /// Searches in order:
    /// 1. Environment variable `STRATA_CONFIG`
    /// 2. `./strata.toml`
    /// 3. `~/.strata/strata.toml`
    pub fn load() -> Result<Self, SettingsError> {
        if let Ok(path) = env::var("STRATA_CONFIG") {
            return Self::from_file(&path);
        }

        let local_config = PathBuf::from("strata.toml");
        if local_config.exists() {
            return Self::from_file(&local_config);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".strata").join("strata.toml");
            if user_config.exists() {
                return Self::from_file(&user_config);
            }
        }

        Ok(Settings::default())
    }

    /// Expand environment variables and check value ranges.
    fn resolve(&mut self) -> Result<(), SettingsError> {
        if let Some(path) = &self.database.path {
            self.database.path = Some(expand_env_vars(path)?);
        }

        if self.diagram.node_width == 0 || self.diagram.node_height == 0 {
            return Err(SettingsError::InvalidConfig(
                "diagram node_width and node_height must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports `${VAR}` and `$VAR` syntax.
pub fn expand_env_vars(s: &str) -> Result<String, SettingsError> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '$' {
            result.push(c);
            continue;
        }

        let braced = chars.peek() == Some(&'{');
        if braced {
            chars.next();
        }

        let mut var_name = String::new();
        while let Some(&ch) = chars.peek() {
            if braced && ch == '}' {
                chars.next();
                break;
            }
            if !braced && !(ch.is_alphanumeric() || ch == '_') {
                break;
            }
            var_name.push(ch);
            chars.next();
        }

        if var_name.is_empty() && !braced {
            // Just a lone $, keep it
            result.push('$');
            continue;
        }

        let value = env::var(&var_name).map_err(|_| SettingsError::MissingEnvVar(var_name))?;
        result.push_str(&value);
    }

    Ok(result)
}

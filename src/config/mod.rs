//! Configuration module for Strata.
//!
//! Handles the config file, environment variable expansion and defaults.

mod settings;

pub use settings::{
    expand_env_vars, DatabaseSettings, DiagramSettings, InferenceSettings, MigrationSettings,
    ResolverKind, Settings, SettingsError,
};

//! Error types for buildsetup-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while reading or writing the settings store.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Underlying I/O failure, annotated with the file involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load with file path and line context from serde_yaml.
    #[error("failed to parse settings at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// YAML serialization error (write path).
    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or pass --top-dir")]
    HomeNotFound,

    /// The requested profile has no section in any settings file.
    #[error("no section '{section}' in settings ({path})")]
    UnknownSection { section: String, path: PathBuf },

    /// A required key is missing or empty.
    #[error("setting '{key}' in section '{section}' is not set; use `buildsetup change-setting {section} {key} <value>`")]
    MissingKey { section: String, key: String },
}

/// Errors raised while loading config documents from a registry.
///
/// This is the parse-side counterpart of the sync engine's errors: anything
/// wrong with the *content* of a registry ends up here.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed JSON, or a field of the wrong type.
    #[error("failed to parse config document {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A required top-level or per-entry key is absent.
    #[error("config document {path} is missing required key '{key}'")]
    MissingKey { path: PathBuf, key: String },

    /// A remote spec could not be parsed.
    #[error("invalid remote spec '{spec}': {reason}")]
    InvalidRemote { spec: String, reason: String },

    /// A source or configuration name cannot be used as a directory name.
    #[error("invalid {kind} name '{name}' in {path}")]
    InvalidName {
        kind: &'static str,
        name: String,
        path: PathBuf,
    },

    /// No document with this identifier exists in the registry.
    #[error("configuration '{identifier}' not found in registry {registry}")]
    NotFound { identifier: String, registry: PathBuf },
}

pub(crate) fn settings_io(path: impl Into<PathBuf>, source: std::io::Error) -> SettingsError {
    SettingsError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}

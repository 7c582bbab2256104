//! Error types for buildsetup-sync.

use std::path::PathBuf;

use thiserror::Error;

use buildsetup_core::{ConfigError, SettingsError};

/// All errors that can arise from synchronization operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Remote unreachable, revision unresolvable, or local working copy
    /// dirty/diverged.
    #[error("failed to synchronize source '{source_name}': {cause}")]
    SourceSync { source_name: String, cause: String },

    /// A build collaborator failed or produced no expected output.
    #[error("configuration '{configuration}' failed to materialize: {reason}")]
    Materialization {
        configuration: String,
        reason: String,
    },

    /// One or more configurations failed; the others were still attempted.
    #[error("{} configuration(s) failed to materialize:\n{}", .failed.len(), summarize(.failed))]
    ConfigurationsFailed { failed: Vec<SyncError> },

    #[error("build directory {path} already exists; use `buildsetup update` to refresh it")]
    AlreadyInitialized { path: PathBuf },

    /// Two identifiers flatten to the same directory name (`a/b` and `a-b`).
    #[error(
        "build directory {path} for '{identifier}' is already used by '{existing}'; \
         rename one of the documents"
    )]
    BuildDirConflict {
        path: PathBuf,
        identifier: String,
        existing: String,
    },

    #[error("{path} is not a build directory; run `buildsetup init` first")]
    NotInitialized { path: PathBuf },

    #[error("unsupported snapshot format version {version} in {path}")]
    UnsupportedSnapshot { path: PathBuf, version: u32 },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error (snapshot store).
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures of an external build collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("'{program}' not found in any layer's scripts/ or bin/, nor on PATH")]
    ProgramNotFound { program: String },

    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("'{program}' did not produce {}", .expected.display())]
    MissingOutput { program: String, expected: PathBuf },

    #[error("invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::SourceSync`].
pub(crate) fn source_err(source_name: &str, cause: impl ToString) -> SyncError {
    SyncError::SourceSync {
        source_name: source_name.to_string(),
        cause: cause.to_string(),
    }
}

fn summarize(failed: &[SyncError]) -> String {
    failed
        .iter()
        .map(|e| format!("  - {e}"))
        .collect::<Vec<_>>()
        .join("\n")
}

//! Strongly-typed names used across the workspace.
//!
//! All path fields use `PathBuf`; names that end up as directory components
//! are validated by the document loader, not here.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// Name of a source repository inside a config document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceName(pub String);

impl fmt::Display for SourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for SourceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SourceName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Name of a build configuration inside a config document.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigurationName(pub String);

impl ConfigurationName {
    /// `build-<name>`, the per-configuration subtree of a build directory.
    pub fn build_dir_name(&self) -> String {
        format!("build-{}", self.0)
    }
}

impl fmt::Display for ConfigurationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ConfigurationName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConfigurationName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Registry-relative identifier of a config document, `/`-separated and
/// without the `.conf.json` suffix (e.g. `config-2/test-config-2`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    /// Directory name of the build directory materialized from this document.
    ///
    /// Nested identifiers are flattened so every document maps to exactly one
    /// directory directly under the top dir.
    pub fn build_dir_name(&self) -> String {
        self.0.replace('/', "-")
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

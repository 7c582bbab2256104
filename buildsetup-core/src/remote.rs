//! Git remote specs: a URI plus optional `;key=value` qualifiers.
//!
//! ```text
//! git:///srv/registry;protocol=file;branch=master;rev=master
//! https://git.example.com/meta-foo.git;branch=kirkstone
//! ```
//!
//! `protocol` replaces the URI scheme, `branch` names the branch to track and
//! `rev` pins a branch, tag or commit id. Parsing happens once, at the point
//! the registry or a source is synchronized.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Revision used when neither `rev` nor `branch` is given.
pub const DEFAULT_REVISION: &str = "master";

/// A parsed git remote spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSpec {
    /// The spec exactly as written; kept so snapshots and messages can echo it.
    pub raw: String,
    /// URL handed to git, with any `protocol` qualifier applied.
    pub url: String,
    pub branch: Option<String>,
    pub rev: Option<String>,
}

impl RemoteSpec {
    pub fn parse(spec: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::InvalidRemote {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = spec.trim();
        let mut parts = trimmed.split(';');
        let uri = parts.next().unwrap_or_default().trim();
        if uri.is_empty() {
            return Err(invalid("empty URI"));
        }

        let mut protocol = None;
        let mut branch = None;
        let mut rev = None;
        for qualifier in parts {
            let qualifier = qualifier.trim();
            if qualifier.is_empty() {
                continue;
            }
            let Some((key, value)) = qualifier.split_once('=') else {
                return Err(invalid(&format!("qualifier '{qualifier}' is not key=value")));
            };
            let value = value.trim();
            if value.is_empty() {
                return Err(invalid(&format!("qualifier '{key}' has an empty value")));
            }
            match key.trim() {
                "protocol" => protocol = Some(value.to_string()),
                "branch" => branch = Some(value.to_string()),
                "rev" => rev = Some(value.to_string()),
                other => return Err(invalid(&format!("unknown qualifier '{other}'"))),
            }
        }

        let url = match protocol {
            Some(protocol) => {
                let Some((_, rest)) = uri.split_once("://") else {
                    return Err(invalid("'protocol' qualifier needs a scheme://… URI"));
                };
                format!("{protocol}://{rest}")
            }
            None => uri.to_string(),
        };

        Ok(Self {
            raw: trimmed.to_string(),
            url,
            branch,
            rev,
        })
    }

    /// The revision to check out: `rev`, then `branch`, then [`DEFAULT_REVISION`].
    pub fn revision(&self) -> &str {
        self.rev
            .as_deref()
            .or(self.branch.as_deref())
            .unwrap_or(DEFAULT_REVISION)
    }

    /// A scheme-less absolute or relative path, e.g. a registry kept in a
    /// plain local directory.
    pub fn local_path(&self) -> Option<PathBuf> {
        if self.url.contains("://") || self.url.contains('@') {
            return None;
        }
        Some(PathBuf::from(&self.url))
    }

    /// Filesystem-safe directory name for a working copy of this remote.
    pub fn cache_dir_name(&self) -> String {
        let stripped = self
            .url
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.url);
        let mut name: String = stripped
            .trim_matches('/')
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
            .collect();
        if let Some(branch) = &self.branch {
            name.push('@');
            name.push_str(&branch.replace('/', "_"));
        }
        name
    }
}

impl FromStr for RemoteSpec {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for RemoteSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}

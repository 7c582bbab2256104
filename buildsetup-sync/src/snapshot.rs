//! Build directory state: origin record and last-applied snapshot.
//!
//! ```text
//! <build-dir>/.buildsetup/
//!   origin.json     where the config document comes from (written by init)
//!   snapshot.json   last successfully applied document + source commits
//! ```
//!
//! `snapshot.json` is written last by a materialization and only when every
//! source and configuration succeeded; an interrupted or failed run leaves
//! the previous snapshot in place. Writes use the `.tmp` + rename pattern.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use buildsetup_core::{registry::document_id_for_file, DocumentId, SourceName};

use crate::error::{io_err, SyncError};

/// Current snapshot record layout.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Per-build-directory state directory.
pub const STATE_DIR: &str = ".buildsetup";

/// Where a build directory's config document comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Origin {
    /// A document in a git (or plain directory) registry.
    Registry {
        registry: String,
        identifier: DocumentId,
    },
    /// A standalone document file.
    File { file: PathBuf },
}

impl Origin {
    /// Identifier of the document, as `init` derived it.
    pub fn identifier(&self) -> Option<DocumentId> {
        match self {
            Origin::Registry { identifier, .. } => Some(identifier.clone()),
            Origin::File { file } => document_id_for_file(file),
        }
    }
}

/// Resolved state of one source at the time it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceState {
    pub name: SourceName,
    /// Remote URL as handed to git.
    pub url: String,
    pub revision: String,
    pub commit: String,
    /// Checkout path relative to `layers/`.
    pub path: PathBuf,
}

/// The last-applied state of a build directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub format_version: u32,
    pub applied_at: DateTime<Utc>,
    /// The config document as authored.
    pub document: Value,
    pub sources: Vec<SourceState>,
}

impl Snapshot {
    pub fn new(document: Value, sources: Vec<SourceState>) -> Self {
        Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            applied_at: Utc::now(),
            document,
            sources,
        }
    }

    pub fn source(&self, name: &SourceName) -> Option<&SourceState> {
        self.sources.iter().find(|s| &s.name == name)
    }
}

#[derive(Debug, Deserialize)]
struct SnapshotHeader {
    format_version: u32,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

pub fn state_dir(build_dir: &Path) -> PathBuf {
    build_dir.join(STATE_DIR)
}

pub fn origin_path(build_dir: &Path) -> PathBuf {
    state_dir(build_dir).join("origin.json")
}

pub fn snapshot_path(build_dir: &Path) -> PathBuf {
    state_dir(build_dir).join("snapshot.json")
}

/// Whether `dir` has been set up by `init` (successfully or not).
pub fn is_build_dir(dir: &Path) -> bool {
    origin_path(dir).is_file()
}

/// The nearest of `start` and its ancestors that is a build directory.
pub fn find_build_dir(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| is_build_dir(dir))
        .map(Path::to_path_buf)
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

pub fn load_origin(build_dir: &Path) -> Result<Origin, SyncError> {
    let path = origin_path(build_dir);
    if !path.is_file() {
        return Err(SyncError::NotInitialized {
            path: build_dir.to_path_buf(),
        });
    }
    read_json(&path)
}

pub fn save_origin(build_dir: &Path, origin: &Origin) -> Result<(), SyncError> {
    write_json(&origin_path(build_dir), origin)
}

/// Load the snapshot; `None` if nothing has been applied successfully yet.
pub fn load_snapshot(build_dir: &Path) -> Result<Option<Snapshot>, SyncError> {
    let path = snapshot_path(build_dir);
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let header: SnapshotHeader = serde_json::from_str(&contents)?;
    if header.format_version != SNAPSHOT_FORMAT_VERSION {
        return Err(SyncError::UnsupportedSnapshot {
            path,
            version: header.format_version,
        });
    }
    Ok(Some(serde_json::from_str(&contents)?))
}

pub fn save_snapshot(build_dir: &Path, snapshot: &Snapshot) -> Result<(), SyncError> {
    write_json(&snapshot_path(build_dir), snapshot)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, SyncError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    Ok(serde_json::from_str(&contents)?)
}

/// Writes to `<path>.tmp` then renames to `<path>`.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), SyncError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("invalid state file path"),
        ));
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        Snapshot::new(
            json!({"sources": {}, "configuration": {"b": {}, "a": {}}}),
            vec![SourceState {
                name: SourceName::from("test-repo"),
                url: "file:///srv/test-repo".into(),
                revision: "master".into(),
                commit: "1111111111111111111111111111111111111111".into(),
                path: PathBuf::from("test-repo"),
            }],
        )
    }

    #[test]
    fn missing_snapshot_is_none() {
        let tmp = TempDir::new().unwrap();
        assert!(load_snapshot(tmp.path()).unwrap().is_none());
    }

    #[test]
    fn roundtrip_keeps_document_order() {
        let tmp = TempDir::new().unwrap();
        let snap = sample();
        save_snapshot(tmp.path(), &snap).unwrap();
        let loaded = load_snapshot(tmp.path()).unwrap().unwrap();
        assert_eq!(loaded, snap);
        let keys: Vec<_> = loaded.document["configuration"]
            .as_object()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn tmp_file_cleaned_up_after_save() {
        let tmp = TempDir::new().unwrap();
        save_snapshot(tmp.path(), &sample()).unwrap();
        assert!(!snapshot_path(tmp.path()).with_extension("json.tmp").exists());
    }

    #[test]
    fn future_format_version_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = snapshot_path(tmp.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"format_version": 99}"#).unwrap();
        let err = load_snapshot(tmp.path()).unwrap_err();
        assert!(
            matches!(err, SyncError::UnsupportedSnapshot { version: 99, .. }),
            "got: {err}"
        );
    }

    #[test]
    fn origin_roundtrip_and_lookup() {
        let tmp = TempDir::new().unwrap();
        let build = tmp.path().join("test-config-1");
        let origin = Origin::Registry {
            registry: "file:///srv/reg".into(),
            identifier: DocumentId::from("test-config-1"),
        };
        save_origin(&build, &origin).unwrap();
        assert_eq!(load_origin(&build).unwrap(), origin);

        let nested = build.join("build-gadget").join("conf");
        std::fs::create_dir_all(&nested).unwrap();
        assert_eq!(find_build_dir(&nested), Some(build.clone()));
        assert_eq!(find_build_dir(tmp.path()), None);
    }

    #[test]
    fn file_origin_is_distinguished() {
        let origin: Origin = serde_json::from_str(r#"{"file": "/tmp/x.conf.json"}"#).unwrap();
        assert_eq!(
            origin,
            Origin::File {
                file: PathBuf::from("/tmp/x.conf.json")
            }
        );
    }

    #[test]
    fn load_origin_outside_build_dir_is_not_initialized() {
        let tmp = TempDir::new().unwrap();
        let err = load_origin(tmp.path()).unwrap_err();
        assert!(matches!(err, SyncError::NotInitialized { .. }), "got: {err}");
    }
}

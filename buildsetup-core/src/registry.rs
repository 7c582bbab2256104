//! Registry index over a synchronized registry working copy.
//!
//! # Layout
//!
//! ```text
//! <registry>/
//!   test-config-1.conf.json          -> "test-config-1"
//!   config-2/
//!     test-config-2.conf.json        -> "config-2/test-config-2"
//!   README.md                        (ignored)
//!   .git/                            (ignored, as is every dot-entry)
//! ```
//!
//! Identifiers are listed in lexicographic order so `list` output never
//! depends on directory iteration order.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::document::ConfigDocument;
use crate::error::{config_io, ConfigError};
use crate::types::DocumentId;

/// File suffix that marks a config document.
pub const DOCUMENT_SUFFIX: &str = ".conf.json";

/// Read-only view of a registry directory.
#[derive(Debug, Clone)]
pub struct RegistryIndex {
    root: PathBuf,
}

impl RegistryIndex {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// All document identifiers, recursively, in lexicographic order.
    pub fn list_configs(&self) -> Result<Vec<DocumentId>, ConfigError> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

        let mut ids = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| self.root.clone(), Path::to_path_buf);
                config_io(path, e.into())
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            if let Some(id) = self.document_id(entry.path()) {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// `<root>/<identifier>.conf.json` (pure, no I/O).
    pub fn document_path(&self, id: &DocumentId) -> PathBuf {
        let mut path = self.root.clone();
        for part in id.0.split('/') {
            path.push(part);
        }
        path.set_file_name(format!("{}{DOCUMENT_SUFFIX}", leaf(id)));
        path
    }

    /// Load one document.
    ///
    /// Returns `ConfigError::NotFound` if absent, `ConfigError::Parse` /
    /// `ConfigError::MissingKey` if malformed.
    pub fn load(&self, id: &DocumentId) -> Result<ConfigDocument, ConfigError> {
        if id.0.is_empty() || id.0.split('/').any(|p| p.is_empty() || p == "." || p == "..") {
            return Err(self.not_found(id));
        }
        let path = self.document_path(id);
        if !path.is_file() {
            return Err(self.not_found(id));
        }
        ConfigDocument::load(&path)
    }

    /// Every document with its parsed content, in identifier order.
    ///
    /// A malformed document keeps its slot and carries its load error.
    pub fn entries(
        &self,
    ) -> Result<Vec<(DocumentId, Result<ConfigDocument, ConfigError>)>, ConfigError> {
        Ok(self
            .list_configs()?
            .into_iter()
            .map(|id| {
                let doc = self.load(&id);
                (id, doc)
            })
            .collect())
    }

    /// `<root>/a/b.conf.json` -> `a/b`; `None` for anything else.
    fn document_id(&self, path: &Path) -> Option<DocumentId> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let name = rel.file_name()?.to_string_lossy();
        let stem = name.strip_suffix(DOCUMENT_SUFFIX).filter(|s| !s.is_empty())?;
        let mut parts: Vec<String> = rel
            .parent()
            .map(|p| {
                p.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        parts.push(stem.to_string());
        Some(DocumentId::from(parts.join("/")))
    }

    fn not_found(&self, id: &DocumentId) -> ConfigError {
        ConfigError::NotFound {
            identifier: id.0.clone(),
            registry: self.root.clone(),
        }
    }
}

/// Identifier for a document file outside any registry: its file name with
/// the document suffix removed.
pub fn document_id_for_file(path: &Path) -> Option<DocumentId> {
    let name = path.file_name()?.to_string_lossy();
    let stem = name.strip_suffix(DOCUMENT_SUFFIX)?;
    (!stem.is_empty()).then(|| DocumentId::from(stem))
}

fn leaf(id: &DocumentId) -> &str {
    id.0.rsplit('/').next().unwrap_or(&id.0)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"{"description": "d", "sources": {}, "configuration": {}}"#;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn empty_registry_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        let index = RegistryIndex::new(tmp.path());
        assert!(index.list_configs().unwrap().is_empty());
    }

    #[test]
    fn missing_root_lists_nothing() {
        let tmp = TempDir::new().unwrap();
        let index = RegistryIndex::new(tmp.path().join("absent"));
        assert!(index.list_configs().unwrap().is_empty());
    }

    #[test]
    fn document_path_handles_nesting() {
        let index = RegistryIndex::new("/reg");
        assert_eq!(
            index.document_path(&DocumentId::from("config-2/test-config-2")),
            PathBuf::from("/reg/config-2/test-config-2.conf.json")
        );
    }

    #[test]
    fn load_unknown_identifier_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let index = RegistryIndex::new(tmp.path());
        let err = index.load(&DocumentId::from("nope")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
        let err = index.load(&DocumentId::from("../escape")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }), "got: {err}");
    }

    #[test]
    fn entries_keep_malformed_documents_with_their_error() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "good.conf.json", MINIMAL);
        write(tmp.path(), "bad.conf.json", "{");
        let entries = RegistryIndex::new(tmp.path()).entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, DocumentId::from("bad"));
        assert!(matches!(entries[0].1, Err(ConfigError::Parse { .. })));
        assert!(entries[1].1.is_ok());
    }

    #[test]
    fn hidden_entries_are_skipped_at_any_depth() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), ".git/x.conf.json", MINIMAL);
        write(tmp.path(), "nested/.hidden.conf.json", MINIMAL);
        write(tmp.path(), "nested/.cache/y.conf.json", MINIMAL);
        write(tmp.path(), "nested/z.conf.json", MINIMAL);
        write(tmp.path(), ".conf.json", MINIMAL);
        let ids = RegistryIndex::new(tmp.path()).list_configs().unwrap();
        assert_eq!(ids, vec![DocumentId::from("nested/z")]);
    }

    #[test]
    fn file_identifier_strips_suffix() {
        assert_eq!(
            document_id_for_file(Path::new("/tmp/x/poky.conf.json")),
            Some(DocumentId::from("poky"))
        );
        assert_eq!(document_id_for_file(Path::new("/tmp/x/poky.json")), None);
    }
}

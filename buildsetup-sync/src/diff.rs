//! Config differ: document diffs, source revision diffs and conf tree diffs.
//!
//! Every comparison yields a [`Diff`] whose `changed` flag is authoritative;
//! an unchanged diff carries [`NO_CHANGES`] rather than empty text so callers
//! never have to guess whether empty output means "nothing" or "failed".

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde_json::Value;
use similar::TextDiff;
use walkdir::WalkDir;

use buildsetup_core::{document::pretty_json, ConfigDocument, SourceName};

use crate::{
    error::{io_err, source_err},
    git,
    snapshot::Snapshot,
    SyncError,
};

/// Text of an unchanged [`Diff`].
pub const NO_CHANGES: &str = "(no changes)\n";

/// A textual comparison result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diff {
    pub changed: bool,
    /// Unified diff when changed, [`NO_CHANGES`] otherwise.
    pub text: String,
}

impl Diff {
    pub fn unchanged() -> Self {
        Self {
            changed: false,
            text: NO_CHANGES.to_string(),
        }
    }
}

/// A single rendered file diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Unified diff of two texts with `a/`/`b/` headers and 3 lines of context.
pub fn unified(old: &str, new: &str, old_header: &str, new_header: &str) -> Diff {
    let old = normalize_line_endings(old);
    let new = normalize_line_endings(new);
    if old == new {
        return Diff::unchanged();
    }
    let text = TextDiff::from_lines(&old, &new)
        .unified_diff()
        .header(old_header, new_header)
        .context_radius(3)
        .to_string();
    Diff {
        changed: true,
        text,
    }
}

// ---------------------------------------------------------------------------
// Document diff
// ---------------------------------------------------------------------------

/// Diff two pretty-printed documents. A missing previous document compares
/// as empty text, so everything shows up as added.
pub fn document_diff(old: Option<&Value>, new: &Value, label: &str) -> Result<Diff, SyncError> {
    let old = old.map(pretty_json).transpose()?.unwrap_or_default();
    let new = pretty_json(new)?;
    Ok(unified(
        &old,
        &new,
        &format!("a/{label}"),
        &format!("b/{label}"),
    ))
}

// ---------------------------------------------------------------------------
// Source diff
// ---------------------------------------------------------------------------

/// What happened to one source between the snapshot and now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChange {
    Unchanged { commit: String },
    /// New in the document, or never applied.
    Added { commit: String },
    /// Dropped from the document; its working copy is left alone.
    Removed { commit: String },
    Moved { from: String, to: String },
    /// Recorded in the snapshot but the working copy is gone.
    Missing { commit: String },
}

/// Per-source comparison result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDiff {
    pub name: SourceName,
    pub url: String,
    pub revision: String,
    pub layer_dir: PathBuf,
    pub change: SourceChange,
    /// Content diffs of files that differ between the two commits.
    pub files: Vec<FileDiff>,
}

impl SourceDiff {
    pub fn changed(&self) -> bool {
        !matches!(self.change, SourceChange::Unchanged { .. })
    }
}

/// Compare the snapshot's sources against the live remotes of `document`.
///
/// Read-only: revisions are resolved with `git ls-remote`, and objects needed
/// for content diffs are fetched into a scratch object directory.
/// `tracked` limits file diffs to the given repo-relative paths.
pub fn diff_sources(
    layers_dir: &Path,
    snapshot: Option<&Snapshot>,
    document: &ConfigDocument,
    tracked: Option<&[PathBuf]>,
) -> Result<Vec<SourceDiff>, SyncError> {
    let mut out = Vec::new();
    for source in &document.sources {
        let name = source.name.0.as_str();
        let layer_dir = layers_dir.join(&source.path);
        let resolved = git::resolve(name, &source.remote, &source.revision)?;
        let previous = snapshot
            .and_then(|s| s.source(&source.name))
            .filter(|prev| prev.path == source.path);

        let (change, files) = match previous {
            None => (
                SourceChange::Added {
                    commit: resolved.commit.clone(),
                },
                Vec::new(),
            ),
            Some(prev) if !layer_dir.join(".git").exists() => (
                SourceChange::Missing {
                    commit: prev.commit.clone(),
                },
                Vec::new(),
            ),
            Some(prev) if prev.commit == resolved.commit => (
                SourceChange::Unchanged {
                    commit: prev.commit.clone(),
                },
                Vec::new(),
            ),
            Some(prev) => {
                let files = commit_file_diffs(
                    name,
                    &layer_dir,
                    &source.remote,
                    &prev.commit,
                    &resolved,
                    tracked,
                )?;
                (
                    SourceChange::Moved {
                        from: prev.commit.clone(),
                        to: resolved.commit.clone(),
                    },
                    files,
                )
            }
        };

        out.push(SourceDiff {
            name: source.name.clone(),
            url: source.remote.url.clone(),
            revision: source.revision.clone(),
            layer_dir,
            change,
            files,
        });
    }

    if let Some(snapshot) = snapshot {
        for prev in &snapshot.sources {
            if document.source(&prev.name).is_some() {
                continue;
            }
            out.push(SourceDiff {
                name: prev.name.clone(),
                url: prev.url.clone(),
                revision: prev.revision.clone(),
                layer_dir: layers_dir.join(&prev.path),
                change: SourceChange::Removed {
                    commit: prev.commit.clone(),
                },
                files: Vec::new(),
            });
        }
    }
    Ok(out)
}

/// File diffs between `old` and `new` in a working copy, without touching it.
pub fn commit_file_diffs(
    source_name: &str,
    repo: &Path,
    remote: &buildsetup_core::RemoteSpec,
    old: &str,
    new: &git::Resolved,
    tracked: Option<&[PathBuf]>,
) -> Result<Vec<FileDiff>, SyncError> {
    let scratch = git::ScratchObjects::new(repo).map_err(|e| io_err(repo, e))?;
    let env = scratch.env();
    git::ensure_commit(repo, remote, new, &env).map_err(|e| source_err(source_name, e))?;
    file_diffs(repo, old, &new.commit, &env, tracked).map_err(|e| source_err(source_name, e))
}

/// File diffs between two commits already present in `repo` (or in the
/// object store `env` points git at).
pub fn file_diffs(
    repo: &Path,
    old: &str,
    new: &str,
    env: &[(OsString, OsString)],
    tracked: Option<&[PathBuf]>,
) -> Result<Vec<FileDiff>, String> {
    let mut diffs = Vec::new();
    for path in git::changed_files(repo, old, new, env)? {
        if let Some(tracked) = tracked {
            if !tracked.iter().any(|t| t == &path) {
                continue;
            }
        }
        let before = git::file_at(repo, old, &path, env)?;
        let after = git::file_at(repo, new, &path, env)?;
        let shown = path.to_string_lossy().replace('\\', "/");
        let diff = unified(
            before.as_deref().unwrap_or_default(),
            after.as_deref().unwrap_or_default(),
            &format!("a/{shown}"),
            &format!("b/{shown}"),
        );
        if diff.changed {
            diffs.push(FileDiff {
                path,
                unified_diff: diff.text,
            });
        }
    }
    Ok(diffs)
}

// ---------------------------------------------------------------------------
// Tree diff
// ---------------------------------------------------------------------------

/// Diff every file under two directories, e.g. a `conf-backup` and the fresh
/// `conf` that replaced it. Paths are relative and sorted; a file present on
/// one side only compares against empty content.
pub fn diff_trees(old_dir: &Path, new_dir: &Path) -> Result<Vec<FileDiff>, SyncError> {
    let mut paths = BTreeSet::new();
    collect_files(old_dir, &mut paths)?;
    collect_files(new_dir, &mut paths)?;

    let mut diffs = Vec::new();
    for rel in paths {
        let old = read_existing_or_empty(&old_dir.join(&rel))?;
        let new = read_existing_or_empty(&new_dir.join(&rel))?;
        let shown = rel.to_string_lossy().replace('\\', "/");
        let diff = unified(&old, &new, &format!("a/{shown}"), &format!("b/{shown}"));
        if diff.changed {
            diffs.push(FileDiff {
                path: rel,
                unified_diff: diff.text,
            });
        }
    }
    Ok(diffs)
}

fn collect_files(root: &Path, out: &mut BTreeSet<PathBuf>) -> Result<(), SyncError> {
    if !root.exists() {
        return Ok(());
    }
    for entry in WalkDir::new(root).follow_links(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| root.to_path_buf(), Path::to_path_buf);
            io_err(path, e.into())
        })?;
        if entry.file_type().is_dir() {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(root) {
            out.insert(rel.to_path_buf());
        }
    }
    Ok(())
}

fn read_existing_or_empty(path: &Path) -> Result<String, SyncError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(io_err(path, err)),
    }
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n")
}

//! Directory materializer.
//!
//! ## `materialize` protocol
//!
//! 1. Sync every source into `layers/<path>` (document order). A source
//!    failure aborts the run. File diffs are taken from the commit the last
//!    snapshot recorded, so a run that failed halfway still reports them.
//! 2. For every configuration, in document order:
//!    a. rename an existing `build-<name>/conf` to the first free
//!       `conf-backup[.N]`;
//!    b. run the backend's setup, then each fragment;
//!    c. write `build-<name>/build-targets`;
//!    d. diff the backup against the fresh `conf`.
//!    A failing configuration is reported and the next one is attempted.
//! 3. If everything succeeded, write `.buildsetup/snapshot.json`.
//!
//! Backups are never rolled back or pruned.

use std::path::{Path, PathBuf};

use buildsetup_core::{ConfigDocument, Configuration, ConfigurationName, SourceName};

use crate::{
    backend::{quote_target, BuildBackend},
    diff::{self, FileDiff},
    error::{io_err, SyncError},
    git::{self, SyncOutcome},
    snapshot::{self, Snapshot, SourceState},
};

/// Name of the generated entry point in each build subtree.
pub const TARGETS_SCRIPT: &str = "build-targets";

/// Base name of `conf` backups.
pub const BACKUP_NAME: &str = "conf-backup";

/// Progress reported while materializing, in the order things happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    SourceSynced {
        source: SourceName,
        url: String,
        revision: String,
        layer_dir: PathBuf,
        outcome: SyncOutcome,
        /// Commit `files` are diffed from: the one the last snapshot recorded,
        /// else the checkout's commit before syncing.
        baseline: Option<String>,
        files: Vec<FileDiff>,
    },
    BackupCreated {
        configuration: ConfigurationName,
        /// [`BuildBackend::name`] of the backend that owns the directory.
        backend: String,
        backup: PathBuf,
    },
    ConfDiff {
        configuration: ConfigurationName,
        diffs: Vec<FileDiff>,
    },
    ConfigurationMaterialized {
        configuration: ConfigurationName,
        build_dir: PathBuf,
    },
    ConfigurationFailed {
        configuration: ConfigurationName,
        error: String,
    },
    SnapshotWritten {
        path: PathBuf,
    },
}

/// Brings a build directory into agreement with a config document.
pub struct Materializer<'a> {
    backend: &'a dyn BuildBackend,
    tracked: Option<&'a [PathBuf]>,
}

impl<'a> Materializer<'a> {
    pub fn new(backend: &'a dyn BuildBackend) -> Self {
        Self {
            backend,
            tracked: None,
        }
    }

    /// Limit reported source file diffs to these repo-relative paths.
    pub fn with_tracked_files(mut self, tracked: &'a [PathBuf]) -> Self {
        self.tracked = Some(tracked);
        self
    }

    pub fn materialize(
        &self,
        build_dir: &Path,
        document: &ConfigDocument,
        on_event: &mut dyn FnMut(Event),
    ) -> Result<Snapshot, SyncError> {
        let layers_dir = build_dir.join("layers");
        let applied = snapshot::load_snapshot(build_dir)?;
        let mut states = Vec::with_capacity(document.sources.len());
        let mut layer_paths = Vec::with_capacity(document.sources.len());

        for source in &document.sources {
            let name = source.name.0.as_str();
            let layer_dir = layers_dir.join(&source.path);
            let outcome = git::sync(name, &source.remote, &source.revision, &layer_dir)?;

            let baseline = applied
                .as_ref()
                .and_then(|s| s.source(&source.name))
                .filter(|prev| prev.path == source.path)
                .map(|prev| prev.commit.clone())
                .or_else(|| outcome.previous.clone());
            let files = match &baseline {
                Some(from) if from != &outcome.current => {
                    diff::file_diffs(&layer_dir, from, &outcome.current, &[], self.tracked)
                        .unwrap_or_else(|cause| {
                            tracing::warn!("cannot diff {name} from {from}: {cause}");
                            Vec::new()
                        })
                }
                _ => Vec::new(),
            };

            states.push(SourceState {
                name: source.name.clone(),
                url: source.remote.url.clone(),
                revision: source.revision.clone(),
                commit: outcome.current.clone(),
                path: source.path.clone(),
            });
            layer_paths.push(layer_dir.clone());
            on_event(Event::SourceSynced {
                source: source.name.clone(),
                url: source.remote.url.clone(),
                revision: source.revision.clone(),
                layer_dir,
                outcome,
                baseline,
                files,
            });
        }

        let mut failed = Vec::new();
        for configuration in &document.configurations {
            let sub = build_dir.join(configuration.name.build_dir_name());
            match self.materialize_configuration(configuration, &layer_paths, &sub, on_event) {
                Ok(()) => on_event(Event::ConfigurationMaterialized {
                    configuration: configuration.name.clone(),
                    build_dir: sub,
                }),
                Err(err) => {
                    tracing::warn!("configuration '{}' failed: {err}", configuration.name);
                    on_event(Event::ConfigurationFailed {
                        configuration: configuration.name.clone(),
                        error: err.to_string(),
                    });
                    failed.push(err);
                }
            }
        }
        if !failed.is_empty() {
            return Err(SyncError::ConfigurationsFailed { failed });
        }

        let snapshot = Snapshot::new(document.raw.clone(), states);
        snapshot::save_snapshot(build_dir, &snapshot)?;
        let path = snapshot::snapshot_path(build_dir);
        tracing::info!("snapshot written: {}", path.display());
        on_event(Event::SnapshotWritten { path });
        Ok(snapshot)
    }

    fn materialize_configuration(
        &self,
        configuration: &Configuration,
        layers: &[PathBuf],
        sub: &Path,
        on_event: &mut dyn FnMut(Event),
    ) -> Result<(), SyncError> {
        let failed = |reason: String| SyncError::Materialization {
            configuration: configuration.name.0.clone(),
            reason,
        };

        let conf = sub.join("conf");
        let backup = if conf.exists() {
            let backup = next_backup_path(sub);
            std::fs::rename(&conf, &backup).map_err(|e| io_err(&conf, e))?;
            tracing::info!("renamed {} to {}", conf.display(), backup.display());
            on_event(Event::BackupCreated {
                configuration: configuration.name.clone(),
                backend: self.backend.name().to_string(),
                backup: backup.clone(),
            });
            Some(backup)
        } else {
            None
        };

        tracing::info!(
            "setting up {} with {} template '{}'",
            sub.display(),
            self.backend.name(),
            configuration.template
        );
        self.backend
            .setup(layers, &configuration.template, sub)
            .map_err(|e| failed(e.to_string()))?;
        for fragment in &configuration.fragments {
            self.backend
                .enable_fragment(layers, fragment, sub)
                .map_err(|e| failed(format!("fragment '{fragment}': {e}")))?;
        }

        let script = targets_script(self.backend, sub, &configuration.targets)
            .map_err(|e| failed(e.to_string()))?;
        write_executable(&sub.join(TARGETS_SCRIPT), &script)?;

        if let Some(backup) = backup {
            let diffs = diff::diff_trees(&backup, &conf)?;
            if !diffs.is_empty() {
                on_event(Event::ConfDiff {
                    configuration: configuration.name.clone(),
                    diffs,
                });
            }
        }
        Ok(())
    }
}

/// First of `conf-backup`, `conf-backup.1`, `conf-backup.2`, … that doesn't
/// exist yet.
pub fn next_backup_path(sub: &Path) -> PathBuf {
    let first = sub.join(BACKUP_NAME);
    if !first.exists() {
        return first;
    }
    (1u32..)
        .map(|n| sub.join(format!("{BACKUP_NAME}.{n}")))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// The `build-targets` script: source the environment file, then run each
/// target in order, stopping at the first failure.
pub fn targets_script(
    backend: &dyn BuildBackend,
    sub: &Path,
    targets: &[String],
) -> Result<String, crate::error::BackendError> {
    let env_file = backend.env_file(sub);
    let env_name = env_file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut script = String::from("#!/bin/sh\n");
    script.push_str("# Generated by buildsetup. Rewritten on every update.\n");
    script.push_str("set -e\n");
    script.push_str("cd \"$(dirname \"$0\")\"\n");
    script.push_str(&format!(". ./{}\n", shell_words::quote(&env_name)));
    for target in targets {
        script.push_str(&quote_target(target)?);
        script.push('\n');
    }
    Ok(script)
}

/// Writes to `<path>.tmp`, marks it executable, then renames to `<path>`.
fn write_executable(path: &Path, content: &str) -> Result<(), SyncError> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content).map_err(|e| io_err(&tmp, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))
            .map_err(|e| io_err(&tmp, e))?;
    }
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

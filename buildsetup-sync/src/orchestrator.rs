//! Synchronization orchestrator: `list`, `init`, `status`, `update`.
//!
//! Composes the registry, git gateway, differ and materializer. Rendering is
//! left to the caller; every operation returns a report value, and
//! materialization progress is streamed through an event callback.
//!
//! Per build directory:
//!
//! ```text
//! Absent --init--> Initialized --(snapshot written)--> Synced <--> Drifted
//! ```
//!
//! `status` only observes; `update` drives a drifted directory back to synced
//! or fails and leaves it drifted.

use std::path::{Path, PathBuf};

use buildsetup_core::{
    registry::{document_id_for_file, DOCUMENT_SUFFIX},
    ConfigDocument, ConfigurationName, DocumentId, RegistryIndex, RemoteSpec, Settings,
};

use crate::{
    backend::BuildBackend,
    diff::{self, Diff, SourceDiff},
    error::io_err,
    git,
    materialize::{Event, Materializer},
    snapshot::{self, Origin, Snapshot},
    SyncError,
};

/// Directory under the top dir holding registry working copies.
pub const REGISTRY_CACHE_DIR: &str = ".buildsetup-registry";

/// One row of `list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub identifier: DocumentId,
    pub description: String,
}

/// Result of `init`.
#[derive(Debug, Clone, PartialEq)]
pub struct InitReport {
    pub identifier: DocumentId,
    pub build_dir: PathBuf,
    /// Configurations set up, in document order.
    pub configurations: Vec<ConfigurationName>,
    pub snapshot: Snapshot,
}

/// Result of `status`: the last-applied state against the current one.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub build_dir: PathBuf,
    pub origin: Origin,
    /// `false` if no materialization has completed yet.
    pub applied: bool,
    pub document: Diff,
    pub sources: Vec<SourceDiff>,
    /// The current document, as `update` would apply it.
    pub pending: ConfigDocument,
}

impl StatusReport {
    pub fn changed(&self) -> bool {
        !self.applied || self.document.changed || self.sources.iter().any(SourceDiff::changed)
    }
}

/// Result of `update`.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateReport {
    pub status: StatusReport,
    /// `None` when nothing had changed and nothing was applied.
    pub snapshot: Option<Snapshot>,
}

/// The four user-facing operations over one settings profile.
pub struct Orchestrator {
    settings: Settings,
    backend: Box<dyn BuildBackend>,
    tracked: Option<Vec<PathBuf>>,
}

impl Orchestrator {
    pub fn new(settings: Settings, backend: Box<dyn BuildBackend>) -> Self {
        Self {
            settings,
            backend,
            tracked: None,
        }
    }

    /// Limit source file diffs to these repo-relative paths.
    pub fn with_tracked_files(mut self, tracked: Vec<PathBuf>) -> Self {
        self.tracked = Some(tracked);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Bring the configured registry's working copy up to date.
    pub fn sync_registry(&self) -> Result<RegistryIndex, SyncError> {
        let spec = self.settings.registry()?;
        self.sync_registry_spec(spec)
    }

    fn sync_registry_spec(&self, spec: &str) -> Result<RegistryIndex, SyncError> {
        let remote = RemoteSpec::parse(spec)?;
        if let Some(local) = remote.local_path().filter(|p| p.is_dir()) {
            tracing::debug!("using registry directory {} in place", local.display());
            return Ok(RegistryIndex::new(local));
        }
        let dest = self
            .settings
            .top_dir
            .join(REGISTRY_CACHE_DIR)
            .join(remote.cache_dir_name());
        git::sync("registry", &remote, remote.revision(), &dest)?;
        Ok(RegistryIndex::new(dest))
    }

    // -----------------------------------------------------------------------
    // list
    // -----------------------------------------------------------------------

    /// Every document in the registry, in identifier order. A document that
    /// fails to load is listed with its error as the description.
    pub fn list(&self) -> Result<Vec<ListEntry>, SyncError> {
        let index = self.sync_registry()?;
        Ok(index
            .entries()?
            .into_iter()
            .map(|(identifier, doc)| {
                let description = match doc {
                    Ok(doc) => doc.description.unwrap_or_default(),
                    Err(err) => {
                        tracing::warn!("document '{identifier}' cannot be loaded: {err}");
                        format!("(invalid: {err})")
                    }
                };
                ListEntry {
                    identifier,
                    description,
                }
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // init
    // -----------------------------------------------------------------------

    /// Build directory path for a document identifier.
    pub fn build_dir_for(&self, identifier: &DocumentId) -> PathBuf {
        self.settings.top_dir.join(identifier.build_dir_name())
    }

    /// Materialize a fresh build directory for a registry identifier or a
    /// local `*.conf.json` file.
    pub fn init(
        &self,
        target: &str,
        on_event: &mut dyn FnMut(Event),
    ) -> Result<InitReport, SyncError> {
        let (identifier, origin, document) = self.resolve_init_target(target)?;
        let build_dir = self.build_dir_for(&identifier);
        if build_dir.exists() {
            let existing = snapshot::load_origin(&build_dir)
                .ok()
                .and_then(|o| o.identifier());
            return Err(match existing {
                Some(existing) if existing != identifier => SyncError::BuildDirConflict {
                    path: build_dir,
                    identifier: identifier.0,
                    existing: existing.0,
                },
                _ => SyncError::AlreadyInitialized { path: build_dir },
            });
        }

        tracing::info!("initializing {} from {identifier}", build_dir.display());
        snapshot::save_origin(&build_dir, &origin)?;
        let snapshot = self.materializer().materialize(&build_dir, &document, on_event)?;
        Ok(InitReport {
            identifier,
            build_dir,
            configurations: document
                .configurations
                .iter()
                .map(|c| c.name.clone())
                .collect(),
            snapshot,
        })
    }

    fn resolve_init_target(
        &self,
        target: &str,
    ) -> Result<(DocumentId, Origin, ConfigDocument), SyncError> {
        let path = Path::new(target);
        if target.ends_with(DOCUMENT_SUFFIX) && path.is_file() {
            let file = std::fs::canonicalize(path).map_err(|e| io_err(path, e))?;
            let identifier = document_id_for_file(&file).ok_or_else(|| {
                SyncError::Config(buildsetup_core::ConfigError::NotFound {
                    identifier: target.to_string(),
                    registry: file.clone(),
                })
            })?;
            let document = ConfigDocument::load(&file)?;
            return Ok((identifier, Origin::File { file }, document));
        }

        let registry = self.settings.registry()?.to_string();
        let index = self.sync_registry_spec(&registry)?;
        let identifier = DocumentId::from(target.trim_end_matches(DOCUMENT_SUFFIX));
        let document = index.load(&identifier)?;
        Ok((
            identifier.clone(),
            Origin::Registry {
                registry,
                identifier,
            },
            document,
        ))
    }

    // -----------------------------------------------------------------------
    // status / update
    // -----------------------------------------------------------------------

    /// Find the build directory to operate on: `explicit`, else the one
    /// containing the backend's environment variable path, else the nearest
    /// one above `cwd`.
    pub fn locate_build_dir(
        &self,
        explicit: Option<&Path>,
        cwd: &Path,
    ) -> Result<PathBuf, SyncError> {
        let from_env = std::env::var_os(self.backend.env_var()).map(PathBuf::from);
        locate_build_dir(explicit, from_env.as_deref(), cwd)
    }

    /// The document a build directory should currently be materialized from.
    fn current_document(&self, origin: &Origin) -> Result<(ConfigDocument, String), SyncError> {
        match origin {
            Origin::Registry {
                registry,
                identifier,
            } => {
                let index = self.sync_registry_spec(registry)?;
                let document = index.load(identifier)?;
                Ok((document, format!("{identifier}{DOCUMENT_SUFFIX}")))
            }
            Origin::File { file } => {
                let document = ConfigDocument::load(file)?;
                let label = file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                Ok((document, label))
            }
        }
    }

    /// Compare the last-applied state with the registry and the remotes.
    /// Never modifies `build_dir`.
    pub fn status(&self, build_dir: &Path) -> Result<StatusReport, SyncError> {
        let origin = snapshot::load_origin(build_dir)?;
        let (pending, label) = self.current_document(&origin)?;
        let previous = snapshot::load_snapshot(build_dir)?;

        let document = diff::document_diff(
            previous.as_ref().map(|s| &s.document),
            &pending.raw,
            &label,
        )?;
        let sources = diff::diff_sources(
            &build_dir.join("layers"),
            previous.as_ref(),
            &pending,
            self.tracked.as_deref(),
        )?;

        Ok(StatusReport {
            build_dir: build_dir.to_path_buf(),
            origin,
            applied: previous.is_some(),
            document,
            sources,
            pending,
        })
    }

    /// Materialize `document` into an existing build directory.
    pub fn apply(
        &self,
        build_dir: &Path,
        document: &ConfigDocument,
        on_event: &mut dyn FnMut(Event),
    ) -> Result<Snapshot, SyncError> {
        if !snapshot::is_build_dir(build_dir) {
            return Err(SyncError::NotInitialized {
                path: build_dir.to_path_buf(),
            });
        }
        self.materializer().materialize(build_dir, document, on_event)
    }

    /// `status`, then `apply` if anything changed. `on_status` sees the status
    /// pass before any materialization event.
    pub fn update(
        &self,
        build_dir: &Path,
        on_status: &mut dyn FnMut(&StatusReport),
        on_event: &mut dyn FnMut(Event),
    ) -> Result<UpdateReport, SyncError> {
        let status = self.status(build_dir)?;
        on_status(&status);
        if !status.changed() {
            return Ok(UpdateReport {
                status,
                snapshot: None,
            });
        }
        let snapshot = self.apply(build_dir, &status.pending, on_event)?;
        Ok(UpdateReport {
            status,
            snapshot: Some(snapshot),
        })
    }

    fn materializer(&self) -> Materializer<'_> {
        let materializer = Materializer::new(self.backend.as_ref());
        match &self.tracked {
            Some(tracked) => materializer.with_tracked_files(tracked),
            None => materializer,
        }
    }
}

/// See [`Orchestrator::locate_build_dir`]; `env_path` is the value of the
/// backend's environment variable, if set.
pub fn locate_build_dir(
    explicit: Option<&Path>,
    env_path: Option<&Path>,
    cwd: &Path,
) -> Result<PathBuf, SyncError> {
    if let Some(dir) = explicit {
        let dir = cwd.join(dir);
        return if snapshot::is_build_dir(&dir) {
            Ok(dir)
        } else {
            Err(SyncError::NotInitialized { path: dir })
        };
    }
    env_path
        .and_then(|p| snapshot::find_build_dir(&cwd.join(p)))
        .or_else(|| snapshot::find_build_dir(cwd))
        .ok_or_else(|| SyncError::NotInitialized {
            path: cwd.to_path_buf(),
        })
}

//! # buildsetup-sync
//!
//! Configuration synchronization engine.
//!
//! - [`git`]: clone/fetch/checkout sources at pinned revisions
//! - [`snapshot`]: per build directory origin and last-applied state
//! - [`diff`]: document, source and conf tree diffs
//! - [`backend`]: external build collaborators behind [`BuildBackend`]
//! - [`materialize`]: bring a build directory in line with a document
//! - [`orchestrator`]: `list`, `init`, `status`, `update`

pub mod backend;
pub mod diff;
pub mod error;
pub mod git;
pub mod materialize;
pub mod orchestrator;
pub mod snapshot;

pub use backend::{BitbakeBackend, BuildBackend};
pub use diff::{Diff, FileDiff, SourceChange, SourceDiff};
pub use error::{BackendError, SyncError};
pub use materialize::{Event, Materializer};
pub use orchestrator::{InitReport, ListEntry, Orchestrator, StatusReport, UpdateReport};
pub use snapshot::{Origin, Snapshot, SourceState};

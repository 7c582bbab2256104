//! buildsetup core library: domain types, settings store, registry index, errors.
//!
//! - [`types`]: newtype names
//! - [`remote`]: git remote specs
//! - [`document`]: config documents
//! - [`registry`]: enumerate / load documents in a registry working copy
//! - [`settings`]: layered settings files
//! - [`error`]: [`SettingsError`], [`ConfigError`]

pub mod document;
pub mod error;
pub mod registry;
pub mod remote;
pub mod settings;
pub mod types;

pub use document::{ConfigDocument, Configuration, SourceEntry};
pub use error::{ConfigError, SettingsError};
pub use registry::RegistryIndex;
pub use remote::RemoteSpec;
pub use settings::Settings;
pub use types::{ConfigurationName, DocumentId, SourceName};

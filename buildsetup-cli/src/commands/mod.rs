//! Subcommand implementations.

pub mod init;
pub mod list;
pub mod report;
pub mod settings;
pub mod status;
pub mod update;

use std::path::PathBuf;

use anyhow::{Context, Result};

use buildsetup_core::{settings::DEFAULT_PROFILE, Settings, SettingsError};
use buildsetup_sync::{BitbakeBackend, Orchestrator};

use crate::GlobalArgs;

pub(crate) fn load_settings(global: &GlobalArgs) -> Result<Settings> {
    let settings = Settings::load(global.top_dir.as_deref(), &global.profile)
        .with_context(|| format!("failed to load settings for profile '{}'", global.profile))?;
    tracing::debug!("top dir: {}", settings.top_dir.display());
    Ok(settings)
}

pub(crate) fn orchestrator(global: &GlobalArgs) -> Result<Orchestrator> {
    Ok(Orchestrator::new(
        load_settings(global)?,
        Box::new(BitbakeBackend::default()),
    ))
}

/// Top dir for the settings mutations, which may create the active profile's
/// section: an unknown profile falls back to the default one's top dir.
pub(crate) fn top_dir(global: &GlobalArgs) -> Result<PathBuf> {
    match Settings::load(global.top_dir.as_deref(), &global.profile) {
        Ok(settings) => Ok(settings.top_dir),
        Err(SettingsError::UnknownSection { .. }) => {
            Ok(Settings::load(global.top_dir.as_deref(), DEFAULT_PROFILE)
                .context("failed to load default settings")?
                .top_dir)
        }
        Err(err) => Err(err).context("failed to load settings"),
    }
}

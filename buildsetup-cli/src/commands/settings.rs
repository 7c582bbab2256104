//! `buildsetup reset-settings`, `change-setting` and `show-settings`.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use buildsetup_core::settings;

use crate::GlobalArgs;

/// Arguments for `buildsetup reset-settings`.
#[derive(Args, Debug)]
pub struct ResetSettingsArgs {}

impl ResetSettingsArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let top_dir = super::top_dir(global)?;
        let path = settings::reset_at(&top_dir, &global.profile)
            .with_context(|| format!("failed to reset settings in {}", top_dir.display()))?;
        println!("Settings written to {}", path.display());
        Ok(())
    }
}

/// Arguments for `buildsetup change-setting`.
#[derive(Args, Debug)]
pub struct ChangeSettingArgs {
    /// Settings section (profile), e.g. `default`.
    pub section: String,
    /// Key within the section, e.g. `registry`.
    pub key: String,
    pub value: String,
}

impl ChangeSettingArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let top_dir = super::top_dir(global)?;
        let path = settings::change_at(&top_dir, &self.section, &self.key, &self.value)
            .with_context(|| format!("failed to change setting in {}", top_dir.display()))?;
        println!(
            "Setting '{}' in section '{}' is changed to '{}'",
            self.key, self.section, self.value
        );
        println!("New settings written to {}", path.display());
        Ok(())
    }
}

/// Arguments for `buildsetup show-settings`.
#[derive(Args, Debug)]
pub struct ShowSettingsArgs {}

impl ShowSettingsArgs {
    pub fn run(self, global: &GlobalArgs) -> Result<()> {
        let settings = super::load_settings(global)?;
        println!("{}", format!("[{}]", settings.profile).bold());
        for (key, value) in &settings.values {
            let value = if value.is_empty() { "(unset)" } else { value.as_str() };
            println!("{key} = {value}");
        }
        if settings.loaded_from.is_empty() {
            println!("No settings file found; defaults in effect.");
        } else {
            for path in &settings.loaded_from {
                println!("Read from {}", path.display());
            }
        }
        Ok(())
    }
}

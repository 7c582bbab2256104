//! Settings store.
//!
//! # Storage layout
//!
//! ```text
//! <config_dir>/buildsetup/settings.conf   (global, optional)
//! <top-dir>/buildsetup.conf               (per top dir, written by reset/change)
//! ```
//!
//! Both files are YAML mappings of section (profile) name to a flat mapping
//! of key to string value:
//!
//! ```yaml
//! default:
//!   registry: git:///srv/registry;protocol=file;branch=master
//!   top-dir: /home/me/buildsetup-builds
//! ```
//!
//! The effective top dir is the `--top-dir` override, else the global file's
//! `top-dir` for the active profile, else `<home>/buildsetup-builds`. Values
//! from the top-dir file override global ones key by key.
//!
//! # API pattern
//!
//! As with the rest of the crate, every function touching the user's
//! environment has an `_at` form taking explicit directories (used by tests)
//! and a convenience wrapper resolving them through `dirs`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{settings_io, SettingsError};

pub const DEFAULT_PROFILE: &str = "default";
pub const SETTINGS_FILE_NAME: &str = "buildsetup.conf";
pub const DEFAULT_TOP_DIR_NAME: &str = "buildsetup-builds";
pub const KEY_REGISTRY: &str = "registry";
pub const KEY_TOP_DIR: &str = "top-dir";

/// One profile's key/value pairs.
pub type Section = BTreeMap<String, String>;

/// On-disk shape of a settings file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsFile {
    pub sections: BTreeMap<String, Section>,
}

/// Effective settings for one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub profile: String,
    pub top_dir: PathBuf,
    pub values: Section,
    /// The top-dir settings file; target of `reset`/`change`.
    pub path: PathBuf,
    /// Files that actually contributed values, global first.
    pub loaded_from: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<config_dir>/buildsetup/settings.conf` (pure, no I/O).
pub fn global_settings_path_at(config_dir: &Path) -> PathBuf {
    config_dir.join("buildsetup").join("settings.conf")
}

/// `<top_dir>/buildsetup.conf` (pure, no I/O).
pub fn settings_path(top_dir: &Path) -> PathBuf {
    top_dir.join(SETTINGS_FILE_NAME)
}

// ---------------------------------------------------------------------------
// File load / save
// ---------------------------------------------------------------------------

/// Load a settings file; a missing file is an empty one.
pub fn load_file(path: &Path) -> Result<SettingsFile, SettingsError> {
    if !path.exists() {
        return Ok(SettingsFile::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| settings_io(path, e))?;
    if contents.trim().is_empty() {
        return Ok(SettingsFile::default());
    }
    serde_yaml::from_str(&contents).map_err(|source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Atomically save a settings file: serialize → `.tmp` sibling → rename.
pub fn save_file(path: &Path, file: &SettingsFile) -> Result<(), SettingsError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| settings_io(dir, e))?;
    }
    let yaml = serde_yaml::to_string(file)?;
    let tmp = path.with_extension("conf.tmp");
    std::fs::write(&tmp, yaml).map_err(|e| settings_io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| settings_io(path, e))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Effective settings
// ---------------------------------------------------------------------------

impl Settings {
    /// Resolve settings for `profile` from explicit directories.
    pub fn load_at(
        config_dir: &Path,
        home: &Path,
        top_dir_override: Option<&Path>,
        profile: &str,
    ) -> Result<Self, SettingsError> {
        let global_path = global_settings_path_at(config_dir);
        let global = load_file(&global_path)?;
        let mut loaded_from = Vec::new();

        let mut values = Section::new();
        let mut known = false;
        if let Some(section) = global.sections.get(profile) {
            values.extend(section.clone());
            loaded_from.push(global_path.clone());
            known = true;
        }

        let top_dir = match top_dir_override {
            Some(dir) => dir.to_path_buf(),
            None => values
                .get(KEY_TOP_DIR)
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| home.join(DEFAULT_TOP_DIR_NAME)),
        };
        // Relative top dirs are anchored to the current directory.
        let top_dir = std::path::absolute(&top_dir).map_err(|e| settings_io(&top_dir, e))?;

        let path = settings_path(&top_dir);
        let local = load_file(&path)?;
        if let Some(section) = local.sections.get(profile) {
            values.extend(section.clone());
            loaded_from.push(path.clone());
            known = true;
        }

        if !known && profile != DEFAULT_PROFILE {
            return Err(SettingsError::UnknownSection {
                section: profile.to_string(),
                path,
            });
        }

        // The directory we resolved is authoritative, whatever the files say.
        values.insert(KEY_TOP_DIR.to_string(), top_dir.display().to_string());
        tracing::debug!("settings for '{profile}' resolved from {loaded_from:?}");

        Ok(Self {
            profile: profile.to_string(),
            top_dir,
            values,
            path,
            loaded_from,
        })
    }

    /// `load_at` convenience wrapper.
    pub fn load(top_dir_override: Option<&Path>, profile: &str) -> Result<Self, SettingsError> {
        let home = dirs::home_dir().ok_or(SettingsError::HomeNotFound)?;
        let config_dir = dirs::config_dir().unwrap_or_else(|| home.join(".config"));
        Self::load_at(&config_dir, &home, top_dir_override, profile)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// The registry remote spec; an empty value counts as unset.
    pub fn registry(&self) -> Result<&str, SettingsError> {
        self.get(KEY_REGISTRY)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SettingsError::MissingKey {
                section: self.profile.clone(),
                key: KEY_REGISTRY.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Write fresh defaults for `profile` into `<top_dir>/buildsetup.conf`.
///
/// Other sections of the file are dropped. Returns the file written.
pub fn reset_at(top_dir: &Path, profile: &str) -> Result<PathBuf, SettingsError> {
    let path = settings_path(top_dir);
    let mut section = Section::new();
    section.insert(KEY_REGISTRY.to_string(), String::new());
    section.insert(KEY_TOP_DIR.to_string(), top_dir.display().to_string());

    let mut file = SettingsFile::default();
    file.sections.insert(profile.to_string(), section);
    save_file(&path, &file)?;
    tracing::info!("settings reset: {}", path.display());
    Ok(path)
}

/// Set `section.key = value` in `<top_dir>/buildsetup.conf`, creating the
/// file or section as needed. Returns the file written.
pub fn change_at(
    top_dir: &Path,
    section: &str,
    key: &str,
    value: &str,
) -> Result<PathBuf, SettingsError> {
    let path = settings_path(top_dir);
    let mut file = load_file(&path)?;
    file.sections
        .entry(section.to_string())
        .or_default()
        .insert(key.to_string(), value.to_string());
    save_file(&path, &file)?;
    tracing::info!("setting {section}.{key} changed in {}", path.display());
    Ok(path)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

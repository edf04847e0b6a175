//! Settings file discovery and loading.

use anyhow::{Context, Result};
use shared::settings::AppSettings;
use std::fs;
use std::path::{Path, PathBuf};

/// `settings.json` in the platform config directory
pub fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("com.local", "Local Chat", "LocalChat")
        .map(|proj| proj.config_dir().join("settings.json"))
}

/// Settings from `explicit` or the default location, with environment overrides applied
pub fn load_settings(explicit: Option<&Path>) -> Result<AppSettings> {
    let path = explicit.map(Path::to_path_buf).or_else(config_path);
    let mut settings = match path {
        Some(path) => read_settings_or_default(&path)?,
        None => AppSettings::default(),
    };
    settings.apply_env_overrides();
    Ok(settings)
}

/// Missing file means defaults; an unreadable or malformed one is an error
pub fn read_settings_or_default(path: &Path) -> Result<AppSettings> {
    if !path.exists() {
        tracing::debug!("No settings at {:?}, using defaults", path);
        return Ok(AppSettings::default());
    }
    let bytes = fs::read(path).with_context(|| format!("Failed to read settings {:?}", path))?;
    let settings = serde_json::from_slice::<AppSettings>(&bytes)
        .with_context(|| format!("Malformed settings file {:?}", path))?;
    tracing::info!("Loaded settings from {:?}", path);
    Ok(settings)
}

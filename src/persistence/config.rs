use super::files::{atomic_write, read_file};
use crate::domain::{OrphanPolicy, TaskFilter};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// User settings stored in config.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub orphan_policy: OrphanPolicy,
    /// Filter display name, e.g. "Pending"
    pub default_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            orphan_policy: OrphanPolicy::default(),
            default_filter: TaskFilter::AllTasks.name().to_string(),
        }
    }
}

impl AppConfig {
    pub fn filter(&self) -> TaskFilter {
        TaskFilter::from_name_lenient(&self.default_filter)
    }
}

/// Load config from config.json, defaults if the file doesn't exist
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();

    let Some(content) = read_file(path)? else {
        return Ok(AppConfig::default());
    };
    if content.trim().is_empty() {
        return Ok(AppConfig::default());
    }

    serde_json::from_str(&content).with_context(|| format!("Invalid config file: {}", path.display()))
}

/// Save config to config.json
pub fn save_config<P: AsRef<Path>>(path: P, config: &AppConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    atomic_write(path, &json)?;
    Ok(())
}

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::types::Role;

/// TOML-backed configuration loaded from disk.
/// Secrets (DB URL) stay as env vars.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub organizer: OrganizerIdentity,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// The participant whose organised events get their costs recomputed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OrganizerIdentity {
    pub last_name: String,
    pub first_name: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    pub recompute_interval_secs: u64,
}

fn default_role() -> Role {
    Role::Organisateur
}

impl Default for OrganizerIdentity {
    fn default() -> Self {
        Self {
            last_name: "Tounsi".to_string(),
            first_name: "Ahmed".to_string(),
            role: Role::Organisateur,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            recompute_interval_secs: 60,
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            organizer: OrganizerIdentity::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
    Ok(config)
}

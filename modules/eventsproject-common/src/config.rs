use std::env;
use std::path::{Path, PathBuf};

use url::Url;

use crate::error::{EventsError, Result};
use crate::file_config::{load_config, FileConfig};

const DEFAULT_CONFIG_PATH: &str = "eventsproject.toml";

/// Application configuration loaded from environment variables.
/// Organizer identity and scheduling live in the TOML FileConfig.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub config_path: PathBuf,
    pub file: FileConfig,
}

impl Config {
    /// Load configuration from `.env` and the environment.
    ///
    /// `EVENTSPROJECT_CONFIG` must point at a readable file when set. When it is
    /// unset, `eventsproject.toml` is used if present, otherwise defaults apply.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| EventsError::Config("DATABASE_URL must be set".to_string()))?;
        let config_path = env::var_os("EVENTSPROJECT_CONFIG").map(PathBuf::from);

        let config = Self::load(database_url, config_path)?;
        config.log_redacted();
        Ok(config)
    }

    /// Build a config from a database URL and an optional explicit file path.
    /// An explicit path that cannot be read or parsed is an error.
    pub fn load(database_url: String, config_path: Option<PathBuf>) -> Result<Self> {
        let (config_path, file) = match config_path {
            Some(path) => {
                let file = load_config(&path).map_err(config_error)?;
                (path, file)
            }
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                let file = load_or_default(&path).map_err(config_error)?;
                (path, file)
            }
        };

        Ok(Self {
            database_url,
            config_path,
            file,
        })
    }

    fn log_redacted(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  DATABASE_URL: {}", redact_url(&self.database_url));
        tracing::info!("  config file: {}", self.config_path.display());
        tracing::info!(
            "  organizer: {} {} ({})",
            self.file.organizer.first_name,
            self.file.organizer.last_name,
            self.file.organizer.role
        );
        tracing::info!(
            "  recompute interval: {}s",
            self.file.scheduler.recompute_interval_secs
        );
    }
}

fn config_error(err: anyhow::Error) -> EventsError {
    EventsError::Config(format!("{err:#}"))
}

fn load_or_default(path: &Path) -> anyhow::Result<FileConfig> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(FileConfig::default())
    }
}

/// Hide credentials in a connection URL. Host, path and query are kept.
fn redact_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return "<unparseable url>".to_string();
    };
    if !url.username().is_empty() || url.password().is_some() {
        let _ = url.set_password(None);
        let _ = url.set_username("***");
    }
    url.to_string()
}

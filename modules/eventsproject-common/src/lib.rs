pub mod config;
pub mod error;
pub mod file_config;
pub mod types;

pub use config::Config;
pub use error::{EventsError, Result};
pub use file_config::{load_config, FileConfig, OrganizerIdentity, SchedulerConfig};
pub use types::*;

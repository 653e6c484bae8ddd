mod config;
pub mod database;

pub use config::{Config, TickerConfig, TimerConfig};
pub use database::{CycleRecord, Database, SessionRecord};

use std::path::PathBuf;

use crate::error::ConfigError;

/// Returns the directory holding the database and config file.
///
/// `MEGAWORK_DATA_DIR` wins when set. Otherwise `~/.config/megawork/`, or
/// `~/.config/megawork-dev/` when `MEGAWORK_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("MEGAWORK_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("MEGAWORK_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("megawork-dev")
            } else {
                base_dir.join("megawork")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

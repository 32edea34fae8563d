mod config;
pub mod database;
pub mod memory;
pub mod migrations;

pub use config::{Config, CookConfig, DatabaseConfig, StockConfig};
pub use database::PantryDb;
pub use memory::MemoryPantry;

use std::path::PathBuf;

use crate::error::Result;

/// Returns the data directory.
///
/// `LARDER_DATA_DIR` wins when set. Otherwise `~/.config/larder[-dev]/`,
/// chosen by `LARDER_ENV=dev`.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os("LARDER_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("LARDER_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("larder-dev")
            } else {
                base_dir.join("larder")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

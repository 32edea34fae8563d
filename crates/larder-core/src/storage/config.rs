//! TOML-based application configuration.
//!
//! Stores deployment settings:
//! - Default minimum-stock thresholds per unit
//! - Cook retry bound
//! - SQLite busy timeout
//!
//! Configuration is stored at `<data dir>/config.toml`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::stock::{default_min_stock_by_unit, MinStockTable, DEFAULT_FALLBACK_MIN_STOCK};

/// Sections whose keys are free-form (new keys may be added with `set`).
const MAP_SECTIONS: &[&str] = &["stock.min_stock_by_unit"];

/// Low-stock thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockConfig {
    #[serde(default = "default_min_stock_by_unit")]
    pub min_stock_by_unit: BTreeMap<String, f64>,
    #[serde(default = "default_fallback_min_stock")]
    pub fallback_min_stock: f64,
}

/// Cook transaction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookConfig {
    /// Extra attempts after a commit-time race. 0 disables retrying.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

/// SQLite settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub stock: StockConfig,
    #[serde(default)]
    pub cook: CookConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

fn default_fallback_min_stock() -> f64 {
    DEFAULT_FALLBACK_MIN_STOCK
}
fn default_max_retries() -> u32 {
    1
}
fn default_busy_timeout_ms() -> u64 {
    5000
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            min_stock_by_unit: default_min_stock_by_unit(),
            fallback_min_stock: default_fallback_min_stock(),
        }
    }
}

impl Default for CookConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

fn parse_number(key: &str, value: &str) -> Result<serde_json::Value, ConfigError> {
    let unparsable = || ConfigError::ParseFailed(format!("{key}: cannot parse '{value}' as number"));
    if let Ok(n) = value.parse::<u64>() {
        return Ok(serde_json::Value::Number(n.into()));
    }
    let n = value.parse::<f64>().map_err(|_| unparsable())?;
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .ok_or_else(unparsable)
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) if !leaf.is_empty() => (Some(parent), leaf),
            None if !key.is_empty() => (None, key),
            _ => return Err(unknown()),
        };

        let mut current = root;
        if let Some(parent_path) = parent_path {
            for part in parent_path.split('.') {
                current = current.get_mut(part).ok_or_else(unknown)?;
            }
        }
        let obj = current.as_object_mut().ok_or_else(unknown)?;

        let new_value = match obj.get(leaf) {
            Some(serde_json::Value::Bool(_)) => {
                serde_json::Value::Bool(value.parse::<bool>().map_err(|_| {
                    ConfigError::ParseFailed(format!("{key}: cannot parse '{value}' as bool"))
                })?)
            }
            Some(serde_json::Value::Number(_)) => parse_number(key, value)?,
            Some(serde_json::Value::Object(_)) | Some(serde_json::Value::Array(_)) => {
                serde_json::from_str(value)
                    .map_err(|e| ConfigError::ParseFailed(format!("{key}: {e}")))?
            }
            Some(_) => serde_json::Value::String(value.into()),
            None if parent_path.is_some_and(|p| MAP_SECTIONS.contains(&p)) => {
                parse_number(key, value)?
            }
            None => return Err(unknown()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults if no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        let path = Self::path()?;
        Self::load_from(&path)
    }

    /// Load from an explicit path, writing defaults if the file is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist to the data directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. Does not persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not fit the field.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    /// Thresholds must be finite and non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check = |key: String, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidValue {
                    key,
                    message: format!("{v} is not a valid threshold"),
                })
            }
        };
        for (unit, min) in &self.stock.min_stock_by_unit {
            check(format!("stock.min_stock_by_unit.{unit}"), *min)?;
        }
        check("stock.fallback_min_stock".to_string(), self.stock.fallback_min_stock)
    }

    pub fn min_stock_table(&self) -> MinStockTable {
        MinStockTable {
            by_unit: self.stock.min_stock_by_unit.clone(),
            fallback: self.stock.fallback_min_stock,
        }
    }
}

//! Loading and validation of [`CompositorCoreConfig`].
//!
//! # Usage
//!
//! ```rust,ignore
//! use novade_compositor_core::config::ConfigLoader;
//!
//! match ConfigLoader::load() {
//!     Ok(config) => println!("region engine: {}", config.occlusion.engine),
//!     Err(e) => {
//!         novade_compositor_core::logging::init_minimal_logging();
//!         tracing::error!("Configuration loading failed: {}", e);
//!     }
//! }
//! ```
//!
//! ## Configuration file location
//!
//! [`ConfigLoader::load`] reads the file named by the `NOVADE_COMPOSITOR_CONFIG`
//! environment variable. Without it, the default configuration is used.
//! [`ConfigLoader::load_layered`] merges a system-wide file with a per-user
//! override, table by table.

use super::defaults::MAX_HISTORY_DEPTH;
use super::types::{CompositorCoreConfig, DirtyRegionConfig, LoggingConfig, OcclusionConfig};
use crate::error::{ConfigError, CoreError};
use std::env;
use std::fs;
use std::path::Path;
use toml::Value;
use tracing::debug;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "NOVADE_COMPOSITOR_CONFIG";

/// Static entry points for loading and validating the configuration.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Loads the file named by [`CONFIG_PATH_ENV`], or the defaults if the
    /// variable is unset.
    pub fn load() -> Result<CompositorCoreConfig, CoreError> {
        match env::var_os(CONFIG_PATH_ENV) {
            Some(path) => Self::load_from_path(Path::new(&path)),
            None => {
                debug!("{} not set, using default configuration", CONFIG_PATH_ENV);
                let mut config = CompositorCoreConfig::default();
                Self::validate_config(&mut config)?;
                Ok(config)
            }
        }
    }

    /// Loads and validates one TOML file. An empty file yields the defaults.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ReadError`] if the file cannot be read, including when
    /// it does not exist, [`ConfigError::ParseError`] for malformed TOML or
    /// unknown fields, and [`ConfigError::ValidationError`] for out-of-range values.
    pub fn load_from_path(path: &Path) -> Result<CompositorCoreConfig, CoreError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loading compositor configuration");
        Self::load_from_str(&content)
    }

    /// Parses and validates a TOML document.
    pub fn load_from_str(content: &str) -> Result<CompositorCoreConfig, CoreError> {
        let mut config: CompositorCoreConfig = if content.trim().is_empty() {
            CompositorCoreConfig::default()
        } else {
            toml::from_str(content).map_err(ConfigError::ParseError)?
        };
        Self::validate_config(&mut config)?;
        Ok(config)
    }

    /// Loads a system configuration and overlays a user configuration on top.
    ///
    /// Either file may be missing. Tables are merged recursively; any other
    /// value in the override replaces the base value.
    pub fn load_layered(system_path: &Path, user_path: &Path) -> Result<CompositorCoreConfig, CoreError> {
        let system = Self::read_optional_toml(system_path)?;
        let user = Self::read_optional_toml(user_path)?;
        let mut config: CompositorCoreConfig = match Self::merge_toml_values(system, user) {
            Some(value) => value.try_into().map_err(ConfigError::ParseError)?,
            None => CompositorCoreConfig::default(),
        };
        Self::validate_config(&mut config)?;
        Ok(config)
    }

    fn read_optional_toml(path: &Path) -> Result<Option<Value>, CoreError> {
        match fs::read_to_string(path) {
            Ok(content) if content.trim().is_empty() => Ok(None),
            Ok(content) => Ok(Some(content.parse::<Value>().map_err(ConfigError::ParseError)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ConfigError::ReadError { path: path.to_path_buf(), source }.into()),
        }
    }

    /// Merges two optional TOML values. `override_val` takes precedence.
    fn merge_toml_values(base: Option<Value>, override_val: Option<Value>) -> Option<Value> {
        match (base, override_val) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(Value::Table(mut base_table)), Some(Value::Table(override_table))) => {
                Self::merge_toml_tables(&mut base_table, &override_table);
                Some(Value::Table(base_table))
            }
            (_, Some(o)) => Some(o),
        }
    }

    fn merge_toml_tables(base_table: &mut toml::map::Map<String, Value>, override_table: &toml::map::Map<String, Value>) {
        for (key, override_item) in override_table {
            match (base_table.get_mut(key), override_item) {
                (Some(Value::Table(bt)), Value::Table(ot)) => Self::merge_toml_tables(bt, ot),
                (Some(base_item), _) => *base_item = override_item.clone(),
                (None, _) => {
                    base_table.insert(key.clone(), override_item.clone());
                }
            }
        }
    }

    /// Normalizes case-insensitive values and rejects out-of-range ones.
    pub fn validate_config(config: &mut CompositorCoreConfig) -> Result<(), CoreError> {
        Self::validate_logging_config(&mut config.logging)?;
        Self::validate_dirty_region_config(&config.dirty_region)?;
        Self::validate_occlusion_config(&mut config.occlusion);
        Ok(())
    }

    fn validate_logging_config(logging: &mut LoggingConfig) -> Result<(), CoreError> {
        let level_lower = logging.level.to_lowercase();
        match level_lower.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => logging.level = level_lower,
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: '{}'. Must be one of trace, debug, info, warn, error.",
                    logging.level
                ))
                .into());
            }
        }

        let format_lower = logging.format.to_lowercase();
        match format_lower.as_str() {
            "text" | "json" => logging.format = format_lower,
            _ => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log format: '{}'. Must be one of text, json.",
                    logging.format
                ))
                .into());
            }
        }
        Ok(())
    }

    fn validate_dirty_region_config(dirty: &DirtyRegionConfig) -> Result<(), CoreError> {
        if dirty.history_depth == 0 || dirty.history_depth > MAX_HISTORY_DEPTH {
            return Err(ConfigError::ValidationError(format!(
                "Invalid history_depth: {}. Must be between 1 and {}.",
                dirty.history_depth, MAX_HISTORY_DEPTH
            ))
            .into());
        }
        if dirty.alignment < 0 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid alignment: {}. Must not be negative.",
                dirty.alignment
            ))
            .into());
        }
        Ok(())
    }

    fn validate_occlusion_config(occlusion: &mut OcclusionConfig) {
        occlusion.divider_bar_names = occlusion
            .divider_bar_names
            .iter()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
    }
}

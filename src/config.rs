//! Reader configuration
//!
//! Handles loading and managing configuration from boxer-iso.json

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::disc::{LayoutKind, DEFAULT_PROBE_ORDER};

const CONFIG_FILE_NAME: &str = "boxer-iso.json";

/// Errors that can occur while loading a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),
}

/// Options for opening and browsing images
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ReaderConfig {
    /// Sector layouts to probe, in order
    pub layouts: Vec<LayoutKind>,
    /// Treat disagreeing little/big-endian copies in directory records as errors
    pub strict_endian_check: bool,
    /// Remember failed path lookups
    pub cache_missing_paths: bool,
    /// Include hidden entries when enumerating
    pub show_hidden: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            layouts: DEFAULT_PROBE_ORDER.to_vec(),
            strict_endian_check: false,
            cache_missing_paths: false,
            show_hidden: true,
        }
    }
}

impl ReaderConfig {
    /// Load boxer-iso.json from the current directory or next to the
    /// executable, falling back to defaults
    pub fn load() -> Self {
        // Try to load from current directory first
        match Self::load_from_path(CONFIG_FILE_NAME) {
            Ok(config) => {
                log::info!("Loaded config from ./{}", CONFIG_FILE_NAME);
                return config;
            }
            Err(ConfigError::Json(e)) => {
                log::warn!("Ignoring ./{}: {}", CONFIG_FILE_NAME, e);
            }
            Err(ConfigError::Io(_)) => {}
        }

        // Try to load from executable directory
        if let Ok(exe_path) = std::env::current_exe() {
            if let Some(exe_dir) = exe_path.parent() {
                let config_path = exe_dir.join(CONFIG_FILE_NAME);
                match Self::load_from_path(&config_path) {
                    Ok(config) => {
                        log::info!("Loaded config from {}", config_path.display());
                        return config;
                    }
                    Err(ConfigError::Json(e)) => {
                        log::warn!("Ignoring {}: {}", config_path.display(), e);
                    }
                    Err(ConfigError::Io(_)) => {}
                }
            }
        }

        log::info!("No {} found, using defaults", CONFIG_FILE_NAME);
        Self::default()
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: ReaderConfig = serde_json::from_str(&content)?;
        Ok(config)
    }
}

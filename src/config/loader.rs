//! Configuration loading
//!
//! Layers, lowest to highest priority:
//! 1. Default values (serde `default`)
//! 2. Configuration file (JSON, optional)
//! 3. Environment variables prefixed with `TLS_WALKTHROUGH_`
//!
//! Command line flags are applied on top by the binary.

use std::fs;
use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use log::{debug, info, warn};

use crate::common::{WalkthroughError, Result};
use super::defaults::ENV_PREFIX;
use super::WalkthroughConfig;

/// Trait for loading configuration from different sources
pub trait ConfigLoader: Sized {
    /// Load configuration from a JSON file
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self>;

    /// Load configuration from environment variables only
    fn from_env() -> Result<Self>;

    /// Load defaults, then the file if it exists, then the environment
    fn auto_load(path: Option<&Path>) -> Result<Self>;
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX.trim_end_matches('_'))
        .prefix_separator("_")
        .try_parsing(true)
}

fn deserialize(builder: config::ConfigBuilder<config::builder::DefaultState>) -> Result<WalkthroughConfig> {
    builder
        .build()
        .and_then(|cfg| cfg.try_deserialize::<WalkthroughConfig>())
        .map_err(|e| WalkthroughError::Config(e.to_string()))
}

impl ConfigLoader for WalkthroughConfig {
    fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = fs::read_to_string(path)
            .map_err(|e| WalkthroughError::Config(format!("Failed to read config file {}: {}", path.display(), e)))?;

        serde_json::from_str(&content)
            .map_err(|e| WalkthroughError::Config(format!("Failed to parse JSON config file {}: {}", path.display(), e)))
    }

    fn from_env() -> Result<Self> {
        debug!("Loading configuration from {}* environment variables", ENV_PREFIX);
        deserialize(Config::builder().add_source(env_source()))
    }

    fn auto_load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        match path {
            Some(path) if path.exists() => {
                info!("Loading configuration file {}", path.display());
                builder = builder.add_source(File::from(path).format(FileFormat::Json).required(true));
            }
            Some(path) => {
                warn!("Configuration file not found: {}, using defaults", path.display());
            }
            None => {
                let default_path = Path::new(super::DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    info!("Loading configuration file {}", default_path.display());
                    builder = builder.add_source(File::from(default_path).format(FileFormat::Json).required(false));
                }
            }
        }

        let config = deserialize(builder.add_source(env_source()))?;
        debug!("Configuration loaded: {:?}", config);
        Ok(config)
    }
}

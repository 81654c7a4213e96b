//! Configuration module
//!
//! This module handles application configuration: defaults, loading from
//! files and environment variables, and validation.

mod defaults;
mod loader;
mod validator;

pub use self::loader::ConfigLoader;
pub use self::defaults::{ENV_PREFIX, DEFAULT_CONFIG_FILE, MIN_KEY_BITS};

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::common::WalkthroughError;

/// Client certificate verification mode
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ClientCertMode {
    /// Require client certificate, connection fails if not provided
    Required,
    /// Verify the client certificate if provided but don't require it
    Optional,
    /// Don't ask for client certificates
    None,
}

// Case-insensitive deserialization
impl<'de> Deserialize<'de> for ClientCertMode {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        ClientCertMode::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Default for ClientCertMode {
    fn default() -> Self {
        defaults::client_cert_mode()
    }
}

impl fmt::Display for ClientCertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "required"),
            Self::Optional => write!(f, "optional"),
            Self::None => write!(f, "none"),
        }
    }
}

impl FromStr for ClientCertMode {
    type Err = WalkthroughError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "required" => Ok(Self::Required),
            "optional" => Ok(Self::Optional),
            "none" => Ok(Self::None),
            _ => Err(WalkthroughError::Config(format!(
                "Invalid client certificate mode: {}. Valid values are: required, optional, none",
                s
            ))),
        }
    }
}

/// Which implementation issues certificates
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssuanceBackend {
    /// In-process issuance through the openssl library
    Library,
    /// Shell out to the `openssl` binary
    CommandLine,
}

impl<'de> Deserialize<'de> for IssuanceBackend {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        IssuanceBackend::from_str(&s).map_err(serde::de::Error::custom)
    }
}

impl Default for IssuanceBackend {
    fn default() -> Self {
        defaults::backend()
    }
}

impl fmt::Display for IssuanceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Library => write!(f, "library"),
            Self::CommandLine => write!(f, "command_line"),
        }
    }
}

impl FromStr for IssuanceBackend {
    type Err = WalkthroughError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "library" | "lib" => Ok(Self::Library),
            "command_line" | "command-line" | "cli" => Ok(Self::CommandLine),
            _ => Err(WalkthroughError::Config(format!(
                "Invalid issuance backend: {}. Valid values are: library, command_line",
                s
            ))),
        }
    }
}

/// Walkthrough configuration
///
/// Every field has a default, so a partial JSON file or a handful of
/// environment variables is enough to override what matters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WalkthroughConfig {
    // --- Files ---

    /// Directory receiving keys, CSRs and certificates
    pub cert_dir: PathBuf,

    // --- Network settings ---

    /// Host the HTTPS server binds to
    pub bind_host: String,

    /// Port used when the server is configured without an explicit one
    pub server_port: u16,

    // --- General settings ---

    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,

    /// Certificate issuance backend
    pub backend: IssuanceBackend,

    /// `openssl` binary used by the command-line backend
    pub openssl_bin: PathBuf,

    // --- Certificate profile ---

    /// RSA key size for every generated key
    pub key_bits: u32,

    /// CA certificate validity in days
    pub ca_validity_days: u32,

    /// Server and client certificate validity in days
    pub leaf_validity_days: u32,

    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub ca_common_name: String,
    pub server_common_name: String,
    pub client_common_name: String,

    // --- Server behavior ---

    /// Client certificate verification mode of the HTTPS server
    pub client_cert_mode: ClientCertMode,

    /// `Strict-Transport-Security` max-age; `None` disables the header
    pub hsts_max_age: Option<u64>,

    /// Server-side TLS handshake timeout in seconds
    pub handshake_timeout: u64,

    /// Connection test timeout in seconds
    pub probe_timeout: u64,

    /// Certificates closer to expiry than this are flagged by the checklist
    pub expiry_warning_days: i64,
}

impl Default for WalkthroughConfig {
    fn default() -> Self {
        Self {
            cert_dir: defaults::cert_dir(),
            bind_host: defaults::bind_host(),
            server_port: defaults::server_port(),
            log_level: defaults::log_level(),
            backend: defaults::backend(),
            openssl_bin: defaults::openssl_bin(),
            key_bits: defaults::key_bits(),
            ca_validity_days: defaults::ca_validity_days(),
            leaf_validity_days: defaults::leaf_validity_days(),
            country: defaults::country(),
            state: defaults::state(),
            locality: defaults::locality(),
            organization: defaults::organization(),
            ca_common_name: defaults::ca_common_name(),
            server_common_name: defaults::server_common_name(),
            client_common_name: defaults::client_common_name(),
            client_cert_mode: defaults::client_cert_mode(),
            hsts_max_age: defaults::hsts_max_age(),
            handshake_timeout: defaults::handshake_timeout(),
            probe_timeout: defaults::probe_timeout(),
            expiry_warning_days: defaults::expiry_warning_days(),
        }
    }
}

/// Log the resolved configuration
pub fn log_config(config: &WalkthroughConfig) {
    use log::info;

    if !log::log_enabled!(log::Level::Info) {
        return;
    }

    info!("=== Walkthrough Configuration ===");
    info!("  Certificate directory: {}", config.cert_dir.display());
    info!("  Issuance backend: {}", config.backend);
    if config.backend == IssuanceBackend::CommandLine {
        info!("  OpenSSL binary: {}", config.openssl_bin.display());
    }
    info!("  Key size: {} bits", config.key_bits);
    info!("  Validity: CA {} days, leaf {} days", config.ca_validity_days, config.leaf_validity_days);
    info!("  Server: {}:{}", config.bind_host, config.server_port);
    info!("  Client certificate mode: {}", config.client_cert_mode);
    match config.hsts_max_age {
        Some(age) => info!("  HSTS max-age: {}", age),
        None => info!("  HSTS: disabled"),
    }
    info!("=================================");
}

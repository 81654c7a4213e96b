//! Default configuration values
//!
//! Single source of truth for defaults, shared by serde and `Default`.

use std::path::PathBuf;

use super::{ClientCertMode, IssuanceBackend};

/// Environment variable prefix for all configuration options
pub const ENV_PREFIX: &str = "TLS_WALKTHROUGH_";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "walkthrough.json";

/// Default certificate directory as string
pub const CERT_DIR_STR: &str = "certificates";

/// Default bind host
pub const BIND_HOST_STR: &str = "127.0.0.1";

/// Default HTTPS port
pub const SERVER_PORT: u16 = 8443;

/// Default log level as string
pub const LOG_LEVEL_STR: &str = "info";

/// Smallest RSA modulus accepted anywhere in the walkthrough
pub const MIN_KEY_BITS: u32 = 2048;

pub fn cert_dir() -> PathBuf {
    PathBuf::from(CERT_DIR_STR)
}

pub fn bind_host() -> String {
    BIND_HOST_STR.to_string()
}

pub fn server_port() -> u16 {
    SERVER_PORT
}

pub fn log_level() -> String {
    LOG_LEVEL_STR.to_string()
}

pub fn backend() -> IssuanceBackend {
    IssuanceBackend::Library
}

pub fn openssl_bin() -> PathBuf {
    PathBuf::from("openssl")
}

pub fn key_bits() -> u32 {
    MIN_KEY_BITS
}

pub fn ca_validity_days() -> u32 {
    365
}

pub fn leaf_validity_days() -> u32 {
    90
}

pub fn country() -> String {
    "BR".to_string()
}

pub fn state() -> String {
    "SP".to_string()
}

pub fn locality() -> String {
    "SaoPaulo".to_string()
}

pub fn organization() -> String {
    "TLS Demo".to_string()
}

pub fn ca_common_name() -> String {
    "TLS Demo CA".to_string()
}

pub fn server_common_name() -> String {
    "localhost".to_string()
}

pub fn client_common_name() -> String {
    "client".to_string()
}

pub fn client_cert_mode() -> ClientCertMode {
    ClientCertMode::None
}

/// One year, the usual HSTS preload minimum
pub fn hsts_max_age() -> Option<u64> {
    Some(31_536_000)
}

/// Server-side TLS accept timeout in seconds
pub fn handshake_timeout() -> u64 {
    10
}

/// Connection test timeout in seconds
pub fn probe_timeout() -> u64 {
    5
}

pub fn expiry_warning_days() -> i64 {
    30
}

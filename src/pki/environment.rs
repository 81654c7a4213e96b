//! Environment checks for the OpenSSL library and command-line tool

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;

use log::{debug, warn};
use once_cell::sync::Lazy;
use serde::Serialize;

use crate::config::IssuanceBackend;

/// First OpenSSL release with TLS 1.3 (1.1.1)
const TLS13_MIN_VERSION_NUMBER: i64 = 0x1010_1000;

/// `openssl version` output per binary, probed once per process
static CLI_VERSIONS: Lazy<Mutex<HashMap<PathBuf, Option<String>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Environment issue severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueSeverity {
    /// Informational issue
    Info,

    /// Warning issue
    Warning,

    /// Error issue
    Error,
}

/// OpenSSL library and command-line tool information
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentInfo {
    /// Version string of the linked OpenSSL library
    pub library_version: String,

    /// Whether the linked library can negotiate TLS 1.3
    pub library_supports_tls13: bool,

    /// `openssl version` of the command-line tool, if it runs
    pub cli_version: Option<String>,

    /// OpenSSL-related environment variables
    pub environment_variables: Vec<(String, String)>,

    /// Detected issues
    pub issues: Vec<EnvironmentIssue>,
}

impl EnvironmentInfo {
    /// Whether any issue is severe enough to stop the walkthrough
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|issue| issue.severity == IssueSeverity::Error)
    }
}

/// Environment issue with message, severity and resolution
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentIssue {
    /// Issue message
    pub message: String,

    /// Issue severity
    pub severity: IssueSeverity,

    /// Suggested resolution
    pub resolution: Option<String>,
}

/// Check the OpenSSL library and the `openssl` binary the backend would use
pub fn check_environment(openssl_bin: &Path, backend: IssuanceBackend) -> EnvironmentInfo {
    let library_version = openssl::version::version().to_string();
    let library_supports_tls13 = openssl::version::number() >= TLS13_MIN_VERSION_NUMBER;
    let cli_version = cli_version(openssl_bin);
    let environment_variables = get_environment_variables();

    let issues = detect_issues(
        &library_version,
        library_supports_tls13,
        cli_version.as_deref(),
        openssl_bin,
        backend,
    );

    EnvironmentInfo {
        library_version,
        library_supports_tls13,
        cli_version,
        environment_variables,
        issues,
    }
}

/// Version reported by `<openssl_bin> version`, cached per binary
pub fn cli_version(openssl_bin: &Path) -> Option<String> {
    if let Ok(cache) = CLI_VERSIONS.lock() {
        if let Some(version) = cache.get(openssl_bin) {
            return version.clone();
        }
    }

    let version = match Command::new(openssl_bin).arg("version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
            debug!("Detected OpenSSL command-line version: {}", version);
            Some(version)
        }
        Ok(output) => {
            warn!("{} version exited with {}", openssl_bin.display(), output.status);
            None
        }
        Err(e) => {
            warn!("Failed to run {} version: {}", openssl_bin.display(), e);
            None
        }
    };

    if let Ok(mut cache) = CLI_VERSIONS.lock() {
        cache.insert(openssl_bin.to_path_buf(), version.clone());
    }
    version
}

fn get_environment_variables() -> Vec<(String, String)> {
    let mut variables = Vec::new();

    for var in &["OPENSSL_DIR", "OPENSSL_CONF", "SSL_CERT_FILE", "SSL_CERT_DIR"] {
        if let Ok(value) = env::var(var) {
            variables.push((var.to_string(), value));
        }
    }

    variables
}

fn detect_issues(
    library_version: &str,
    library_supports_tls13: bool,
    cli_version: Option<&str>,
    openssl_bin: &Path,
    backend: IssuanceBackend,
) -> Vec<EnvironmentIssue> {
    let mut issues = Vec::new();

    if !library_supports_tls13 {
        issues.push(EnvironmentIssue {
            message: format!("OpenSSL 1.1.1+ is required for TLS 1.3, but found {}", library_version),
            severity: IssueSeverity::Error,
            resolution: Some("Link against OpenSSL 1.1.1 or later".to_string()),
        });
    }

    if cli_version.is_none() {
        let (severity, message) = match backend {
            IssuanceBackend::CommandLine => (
                IssueSeverity::Error,
                format!("{} is not runnable, but the command-line backend is selected", openssl_bin.display()),
            ),
            IssuanceBackend::Library => (
                IssueSeverity::Warning,
                format!("{} is not runnable; the printed commands cannot be replayed by hand", openssl_bin.display()),
            ),
        };
        issues.push(EnvironmentIssue {
            message,
            severity,
            resolution: Some("Install the openssl command-line tool or set openssl_bin".to_string()),
        });
    }

    issues
}

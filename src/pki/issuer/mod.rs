//! Certificate issuers
//!
//! Two interchangeable strategies produce the same files and the same
//! step trace: [`LibraryIssuer`] does the work in-process through the
//! openssl crate, [`CommandLineIssuer`] shells out to the `openssl` binary.
//! Both report the equivalent command lines so the learner sees what
//! happened either way.

mod command_line;
mod library;

pub use command_line::CommandLineImpl as CommandLineIssuer;
pub use library::LibraryIssuer;

use std::fs;
use std::path::Path;

use log::debug;

use crate::common::{WalkthroughError, Result};
use crate::config::{IssuanceBackend, WalkthroughConfig};
use super::types::{CertificatePaths, CertificateProfile, CertificateRole, IssuanceStep};

/// Certificate issuance strategy
#[cfg_attr(test, mockall::automock)]
pub trait CertificateIssuer: Send + Sync {
    /// Strategy name for logging
    fn name(&self) -> &'static str;

    /// Generate the CA key and self-signed certificate
    fn issue_ca(&self, profile: &CertificateProfile, paths: &CertificatePaths) -> Result<Vec<IssuanceStep>>;

    /// Generate a key and CSR, then sign the CSR with the CA
    fn issue_leaf(
        &self,
        profile: &CertificateProfile,
        paths: &CertificatePaths,
        ca: &CertificatePaths,
    ) -> Result<Vec<IssuanceStep>>;
}

/// Create the issuer selected by the configuration
pub fn create_issuer(backend: IssuanceBackend, config: &WalkthroughConfig) -> Box<dyn CertificateIssuer> {
    debug!("Creating {} certificate issuer", backend);
    match backend {
        IssuanceBackend::Library => Box::new(LibraryIssuer::new()),
        IssuanceBackend::CommandLine => Box::new(CommandLineIssuer::new(&config.openssl_bin)),
    }
}

/// One `openssl` invocation of an issuance plan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCommand {
    pub description: String,
    pub args: Vec<String>,
}

impl PlannedCommand {
    fn new(description: String, args: &[&str]) -> Self {
        Self {
            description,
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    /// Shell-style rendering, quoting arguments that contain spaces
    pub fn command_line(&self, program: &str) -> String {
        let mut parts = vec![program.to_string()];
        parts.extend(self.args.iter().map(|arg| {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                format!("\"{}\"", arg)
            } else {
                arg.clone()
            }
        }));
        parts.join(" ")
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn leaf_part<'a>(part: &'a Option<std::path::PathBuf>, what: &str) -> Result<&'a Path> {
    part.as_deref().ok_or_else(|| {
        WalkthroughError::Certificate(format!("leaf certificate paths are missing the {} file", what))
    })
}

/// Commands issuing the CA: key, then self-signed certificate
pub fn plan_ca(profile: &CertificateProfile, paths: &CertificatePaths) -> Vec<PlannedCommand> {
    let key = path_arg(&paths.key);
    let cert = path_arg(&paths.cert);
    let bits = profile.key_bits.to_string();
    let days = profile.validity_days.to_string();
    let subj = profile.subject.to_subj();

    vec![
        PlannedCommand::new(
            "Generate the CA private key".to_string(),
            &["genrsa", "-out", &key, &bits],
        ),
        PlannedCommand::new(
            "Create the self-signed CA certificate".to_string(),
            &["req", "-new", "-x509", "-days", &days, "-key", &key, "-out", &cert, "-subj", &subj],
        ),
    ]
}

/// Commands issuing a leaf: key, CSR, CA signature
pub fn plan_leaf(
    profile: &CertificateProfile,
    paths: &CertificatePaths,
    ca: &CertificatePaths,
) -> Result<Vec<PlannedCommand>> {
    let label = profile.role.label();
    let key = path_arg(&paths.key);
    let csr = path_arg(leaf_part(&paths.csr, "CSR")?);
    let ext = path_arg(leaf_part(&paths.ext, "extension")?);
    let cert = path_arg(&paths.cert);
    let ca_cert = path_arg(&ca.cert);
    let ca_key = path_arg(&ca.key);
    let bits = profile.key_bits.to_string();
    let days = profile.validity_days.to_string();
    let subj = profile.subject.to_subj();

    Ok(vec![
        PlannedCommand::new(
            format!("Generate the {} private key", label),
            &["genrsa", "-out", &key, &bits],
        ),
        PlannedCommand::new(
            format!("Create the {} certificate signing request", label),
            &["req", "-new", "-key", &key, "-out", &csr, "-subj", &subj],
        ),
        PlannedCommand::new(
            format!("Sign the {} certificate with the CA", label),
            &[
                "x509", "-req", "-in", &csr, "-CA", &ca_cert, "-CAkey", &ca_key,
                "-CAcreateserial", "-out", &cert, "-days", &days, "-extfile", &ext,
            ],
        ),
    ])
}

/// Number a plan's commands as executed steps of `role`
pub(crate) fn into_steps(role: CertificateRole, plan: &[PlannedCommand], program: &str) -> Vec<IssuanceStep> {
    plan.iter()
        .zip(role.first_step()..)
        .map(|(command, step)| IssuanceStep {
            step,
            command: command.command_line(program),
            description: command.description.clone(),
            executed: true,
        })
        .collect()
}

/// Write the `-extfile` of a leaf profile
pub(crate) fn write_extension_file(profile: &CertificateProfile, paths: &CertificatePaths) -> Result<()> {
    if let (Some(contents), Some(path)) = (profile.extension_config(), paths.ext.as_deref()) {
        debug!("Writing extension file {}", path.display());
        fs::write(path, contents)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn server_profile() -> CertificateProfile {
        CertificateProfile::from_config(CertificateRole::Server, &WalkthroughConfig::default())
    }

    #[test]
    fn test_command_line_quotes_subject() {
        let config = WalkthroughConfig::default();
        let profile = CertificateProfile::from_config(CertificateRole::Ca, &config);
        let paths = CertificatePaths::for_role(CertificateRole::Ca, Path::new("certs"));
        let plan = plan_ca(&profile, &paths);

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].command_line("openssl"), "openssl genrsa -out certs/ca-key.pem 2048");
        assert!(plan[1]
            .command_line("openssl")
            .ends_with("-subj \"/C=BR/ST=SP/L=SaoPaulo/O=TLS Demo/CN=TLS Demo CA\""));
    }

    #[test]
    fn test_leaf_plan_is_numbered_from_role() {
        let dir = Path::new("certs");
        let ca = CertificatePaths::for_role(CertificateRole::Ca, dir);
        let paths = CertificatePaths::for_role(CertificateRole::Server, dir);
        let plan = plan_leaf(&server_profile(), &paths, &ca).unwrap();
        let steps = into_steps(CertificateRole::Server, &plan, "openssl");

        let numbers: Vec<u32> = steps.iter().map(|s| s.step).collect();
        assert_eq!(numbers, vec![3, 4, 5]);
        assert!(steps[2].command.contains("-CA certs/ca-cert.pem"));
        assert!(steps[2].command.contains("-extfile certs/server-ext.cnf"));
        assert_eq!(steps[1].description, "Create the server certificate signing request");
        assert!(steps.iter().all(|s| s.executed));
    }

    #[test]
    fn test_leaf_plan_requires_csr_path() {
        let dir = Path::new("certs");
        let ca = CertificatePaths::for_role(CertificateRole::Ca, dir);
        // CA-shaped paths have no CSR
        let result = plan_leaf(&server_profile(), &ca, &ca);
        assert!(result.is_err());
    }
}

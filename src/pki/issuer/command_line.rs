//! Command-line implementation
//!
//! Runs the planned `openssl` invocations one after the other, stopping at
//! the first failure.

use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, warn};

use crate::common::fs::prepare_private_file;
use crate::common::{WalkthroughError, Result};
use crate::pki::types::{CertificatePaths, CertificateProfile, IssuanceStep};
use super::{into_steps, plan_ca, plan_leaf, write_extension_file, CertificateIssuer, PlannedCommand};

/// Issuer shelling out to an `openssl` binary
pub struct CommandLineImpl {
    program: PathBuf,
}

impl CommandLineImpl {
    pub fn new(program: &Path) -> Self {
        Self { program: program.to_path_buf() }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn run(&self, command: &PlannedCommand) -> Result<()> {
        let rendered = command.command_line(&self.program_name());
        debug!("Running {}", rendered);

        match Command::new(&self.program).args(&command.args).output() {
            Ok(output) if output.status.success() => Ok(()),
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                warn!("{} exited with {}", rendered, output.status);
                Err(WalkthroughError::Command { command: rendered, stderr })
            }
            Err(e) => {
                warn!("Failed to run {}: {}", self.program_name(), e);
                Err(WalkthroughError::Command { command: rendered, stderr: e.to_string() })
            }
        }
    }

    fn run_plan(&self, plan: &[PlannedCommand]) -> Result<()> {
        for command in plan {
            self.run(command)?;
        }
        Ok(())
    }
}

impl CertificateIssuer for CommandLineImpl {
    fn name(&self) -> &'static str {
        "command_line"
    }

    fn issue_ca(&self, profile: &CertificateProfile, paths: &CertificatePaths) -> Result<Vec<IssuanceStep>> {
        let plan = plan_ca(profile, paths);
        prepare_private_file(&paths.key)?;
        self.run_plan(&plan)?;
        Ok(into_steps(profile.role, &plan, &self.program_name()))
    }

    fn issue_leaf(
        &self,
        profile: &CertificateProfile,
        paths: &CertificatePaths,
        ca: &CertificatePaths,
    ) -> Result<Vec<IssuanceStep>> {
        if !ca.exists() {
            return Err(WalkthroughError::NotFound(format!(
                "CA files missing: {}",
                ca.cert.display()
            )));
        }

        let plan = plan_leaf(profile, paths, ca)?;
        write_extension_file(profile, paths)?;
        prepare_private_file(&paths.key)?;
        self.run_plan(&plan)?;
        Ok(into_steps(profile.role, &plan, &self.program_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalkthroughConfig;
    use crate::pki::types::CertificateRole;

    #[test]
    fn test_missing_binary_is_a_command_error() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = CommandLineImpl::new(Path::new("/nonexistent/openssl"));
        let profile = CertificateProfile::from_config(CertificateRole::Ca, &WalkthroughConfig::default());
        let paths = CertificatePaths::for_role(CertificateRole::Ca, dir.path());

        match issuer.issue_ca(&profile, &paths) {
            Err(WalkthroughError::Command { command, .. }) => {
                assert!(command.starts_with("/nonexistent/openssl genrsa"));
            }
            other => panic!("expected command error, got {:?}", other),
        }

        // The key file is owner-only before genrsa ever runs
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&paths.key).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn test_leaf_requires_ca_files() {
        let dir = tempfile::tempdir().unwrap();
        let issuer = CommandLineImpl::new(Path::new("openssl"));
        let profile = CertificateProfile::from_config(CertificateRole::Server, &WalkthroughConfig::default());
        let ca = CertificatePaths::for_role(CertificateRole::Ca, dir.path());
        let paths = CertificatePaths::for_role(CertificateRole::Server, dir.path());

        let err = issuer.issue_leaf(&profile, &paths, &ca).unwrap_err();
        assert!(matches!(err, WalkthroughError::NotFound(_)));
    }
}

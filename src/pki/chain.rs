//! Certificate chain store
//!
//! Owns the records of the CA, server and client certificates and the
//! executed issuance steps. The only ordering rule lives here: leaf
//! certificates need an existing CA.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, info, warn};

use crate::common::{ensure_dir, WalkthroughError, Result};
use crate::config::WalkthroughConfig;
use super::inspect::{self, details_from_x509, verify_issued_by};
use super::issuer::CertificateIssuer;
use super::types::{
    CertificatePaths, CertificateProfile, CertificateRole, CertificateStatus, IssuanceStep,
    IssuedCertificate,
};

/// Certificate data of one walkthrough
pub struct CertificateStore {
    dir: PathBuf,
    issuer: Box<dyn CertificateIssuer>,
    config: WalkthroughConfig,
    ca: Option<IssuedCertificate>,
    server: Option<IssuedCertificate>,
    client: Option<IssuedCertificate>,
    steps: Vec<IssuanceStep>,
}

impl CertificateStore {
    /// Create an empty store writing into `cert_dir`
    pub fn new(cert_dir: &Path, issuer: Box<dyn CertificateIssuer>, config: &WalkthroughConfig) -> Self {
        Self {
            dir: cert_dir.to_path_buf(),
            issuer,
            config: config.clone(),
            ca: None,
            server: None,
            client: None,
            steps: Vec::new(),
        }
    }

    /// Rebuild a store from certificates already present in `cert_dir`
    ///
    /// Leaf certificates are only picked up when they were signed by the CA
    /// found next to them. No steps are reconstructed.
    pub fn load_existing(
        cert_dir: &Path,
        issuer: Box<dyn CertificateIssuer>,
        config: &WalkthroughConfig,
    ) -> Result<Self> {
        let mut store = Self::new(cert_dir, issuer, config);

        let ca_paths = store.paths(CertificateRole::Ca);
        if !ca_paths.exists() {
            debug!("No CA in {}, starting from scratch", cert_dir.display());
            return Ok(store);
        }

        let ca_cert = inspect::load_cert(&ca_paths.cert)?;
        store.ca = Some(record_from_disk(CertificateRole::Ca, &ca_paths, &ca_cert)?);

        for role in [CertificateRole::Server, CertificateRole::Client] {
            let paths = store.paths(role);
            if !paths.exists() {
                continue;
            }
            let cert = inspect::load_cert(&paths.cert)?;
            if !verify_issued_by(&cert, &ca_cert)? {
                warn!("Ignoring {}: not issued by the current CA", paths.cert.display());
                continue;
            }
            *store.slot_mut(role) = Some(record_from_disk(role, &paths, &cert)?);
        }

        info!(
            "Loaded existing certificates from {} (server: {}, client: {})",
            cert_dir.display(),
            store.server.is_some(),
            store.client.is_some()
        );
        Ok(store)
    }

    /// Directory receiving the certificate files
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Name of the issuance strategy in use
    pub fn issuer_name(&self) -> &'static str {
        self.issuer.name()
    }

    /// File layout of `role`
    pub fn paths(&self, role: CertificateRole) -> CertificatePaths {
        CertificatePaths::for_role(role, &self.dir)
    }

    pub fn ca(&self) -> Option<&IssuedCertificate> {
        self.ca.as_ref()
    }

    pub fn server(&self) -> Option<&IssuedCertificate> {
        self.server.as_ref()
    }

    pub fn client(&self) -> Option<&IssuedCertificate> {
        self.client.as_ref()
    }

    /// Record of `role`, if issued
    pub fn get(&self, role: CertificateRole) -> Option<&IssuedCertificate> {
        match role {
            CertificateRole::Ca => self.ca(),
            CertificateRole::Server => self.server(),
            CertificateRole::Client => self.client(),
        }
    }

    fn slot_mut(&mut self, role: CertificateRole) -> &mut Option<IssuedCertificate> {
        match role {
            CertificateRole::Ca => &mut self.ca,
            CertificateRole::Server => &mut self.server,
            CertificateRole::Client => &mut self.client,
        }
    }

    /// Executed steps, ordered by step number
    pub fn steps(&self) -> &[IssuanceStep] {
        &self.steps
    }

    /// Snapshot of the certificate step
    pub fn status(&self) -> CertificateStatus {
        CertificateStatus {
            created: self.ca.is_some() && self.server.is_some() && self.client.is_some(),
            ca: self.ca.clone(),
            server: self.server.clone(),
            client: self.client.clone(),
            steps: self.steps.clone(),
        }
    }

    /// Issue the certificate of `role`
    ///
    /// Server and client certificates fail with `Precondition` until the CA
    /// exists. Reissuing the CA drops the leaf records, since their
    /// signatures no longer chain to the new key.
    pub fn generate(&mut self, role: CertificateRole) -> Result<&IssuedCertificate> {
        if role.is_leaf() && self.ca.is_none() {
            return Err(WalkthroughError::Precondition(
                "the CA must be created first".to_string(),
            ));
        }

        ensure_dir(&self.dir)?;
        let profile = CertificateProfile::from_config(role, &self.config);
        let paths = self.paths(role);

        info!("Generating {} certificate with the {} issuer", role.label(), self.issuer.name());
        let steps = match role {
            CertificateRole::Ca => self.issuer.issue_ca(&profile, &paths)?,
            _ => {
                let ca_paths = self.paths(CertificateRole::Ca);
                self.issuer.issue_leaf(&profile, &paths, &ca_paths)?
            }
        };

        let record = record_from_issue(&profile, &paths)?;

        if role == CertificateRole::Ca {
            for leaf in [CertificateRole::Server, CertificateRole::Client] {
                if self.slot_mut(leaf).take().is_some() {
                    warn!("CA regenerated: the {} certificate must be issued again", leaf.label());
                }
                self.steps.retain(|step| !leaf.step_range().contains(&step.step));
            }
        }

        self.steps.retain(|step| !role.step_range().contains(&step.step));
        self.steps.extend(steps);
        self.steps.sort_by_key(|step| step.step);

        debug!("{} certificate serial {}", role.label(), record.serial);
        Ok(&*self.slot_mut(role).insert(record))
    }

    /// PEM text of the CA certificate
    pub fn ca_certificate_pem(&self) -> Result<String> {
        let ca = self.ca.as_ref().ok_or_else(|| {
            WalkthroughError::NotFound("the CA certificate has not been generated".to_string())
        })?;
        Ok(fs::read_to_string(&ca.cert_path)?)
    }

    /// Copy the CA certificate to `dest` (a file, or a directory to copy into)
    pub fn export_ca(&self, dest: &Path) -> Result<PathBuf> {
        let ca = self.ca.as_ref().ok_or_else(|| {
            WalkthroughError::NotFound("the CA certificate has not been generated".to_string())
        })?;

        let target = if dest.is_dir() {
            dest.join("ca-cert.pem")
        } else {
            dest.to_path_buf()
        };
        fs::copy(&ca.cert_path, &target)?;
        info!("Exported CA certificate to {}", target.display());
        Ok(target)
    }
}

fn record_from_issue(profile: &CertificateProfile, paths: &CertificatePaths) -> Result<IssuedCertificate> {
    let cert = inspect::load_cert(&paths.cert)?;
    let details = details_from_x509(&cert)?;

    Ok(IssuedCertificate {
        role: profile.role,
        common_name: profile.subject.common_name.clone(),
        validity_days: profile.validity_days,
        key_bits: details.key_bits,
        algorithm: details.key_algorithm,
        created: Utc::now(),
        not_after: details.not_after,
        serial: details.serial,
        fingerprint: details.fingerprint_sha256,
        key_path: paths.key.clone(),
        cert_path: paths.cert.clone(),
    })
}

fn record_from_disk(
    role: CertificateRole,
    paths: &CertificatePaths,
    cert: &openssl::x509::X509Ref,
) -> Result<IssuedCertificate> {
    let details = details_from_x509(cert)?;
    let validity_days = (details.not_after - details.not_before).num_days().max(0) as u32;

    Ok(IssuedCertificate {
        role,
        common_name: inspect::common_name(cert.subject_name()).unwrap_or_default(),
        validity_days,
        key_bits: details.key_bits,
        algorithm: details.key_algorithm,
        created: details.not_before,
        not_after: details.not_after,
        serial: details.serial,
        fingerprint: details.fingerprint_sha256,
        key_path: paths.key.clone(),
        cert_path: paths.cert.clone(),
    })
}

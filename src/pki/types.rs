//! PKI data types
//!
//! Roles, subject names, issuance profiles and the records kept for every
//! certificate the walkthrough produces.

use chrono::{DateTime, Utc};
use openssl::x509::{X509Name, X509NameBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::common::{WalkthroughError, Result};
use crate::config::WalkthroughConfig;

/// Position of a certificate in the demo chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CertificateRole {
    /// Self-signed certificate authority
    Ca,
    /// Server certificate signed by the CA
    Server,
    /// Client certificate signed by the CA (used for mTLS)
    Client,
}

impl CertificateRole {
    /// All roles in issuance order
    pub const ALL: [CertificateRole; 3] = [Self::Ca, Self::Server, Self::Client];

    /// File name stem (`ca-key.pem`, `server-cert.pem`, ...)
    pub fn stem(&self) -> &'static str {
        match self {
            Self::Ca => "ca",
            Self::Server => "server",
            Self::Client => "client",
        }
    }

    /// Human-readable label used in step descriptions
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ca => "CA",
            Self::Server => "server",
            Self::Client => "client",
        }
    }

    /// Number of the first issuance step of this role
    ///
    /// CA owns steps 1-2, server 3-5, client 6-8.
    pub fn first_step(&self) -> u32 {
        match self {
            Self::Ca => 1,
            Self::Server => 3,
            Self::Client => 6,
        }
    }

    /// Inclusive range of step numbers owned by this role
    pub fn step_range(&self) -> std::ops::RangeInclusive<u32> {
        match self {
            Self::Ca => 1..=2,
            Self::Server => 3..=5,
            Self::Client => 6..=8,
        }
    }

    /// Whether this certificate is signed by the CA
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Self::Ca)
    }
}

impl fmt::Display for CertificateRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}

impl FromStr for CertificateRole {
    type Err = WalkthroughError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ca" => Ok(Self::Ca),
            "server" => Ok(Self::Server),
            "client" => Ok(Self::Client),
            _ => Err(WalkthroughError::Config(format!(
                "Invalid certificate type: {}. Valid values are: ca, server, client",
                s
            ))),
        }
    }
}

/// Distinguished name of a certificate subject
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectName {
    pub country: String,
    pub state: String,
    pub locality: String,
    pub organization: String,
    pub common_name: String,
}

impl SubjectName {
    /// Render in the `openssl req -subj` form: `/C=BR/ST=SP/L=SaoPaulo/O=TLS Demo/CN=localhost`
    pub fn to_subj(&self) -> String {
        format!(
            "/C={}/ST={}/L={}/O={}/CN={}",
            self.country, self.state, self.locality, self.organization, self.common_name
        )
    }

    /// Build the equivalent `X509Name`
    pub fn to_x509_name(&self) -> Result<X509Name> {
        let mut builder = X509NameBuilder::new()?;
        builder.append_entry_by_text("C", &self.country)?;
        builder.append_entry_by_text("ST", &self.state)?;
        builder.append_entry_by_text("L", &self.locality)?;
        builder.append_entry_by_text("O", &self.organization)?;
        builder.append_entry_by_text("CN", &self.common_name)?;
        Ok(builder.build())
    }
}

/// Everything needed to issue one certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateProfile {
    pub role: CertificateRole,
    pub subject: SubjectName,
    pub validity_days: u32,
    pub key_bits: u32,
    /// DNS subjectAltName entries (server only)
    pub san_dns: Vec<String>,
    /// IP subjectAltName entries (server only)
    pub san_ips: Vec<IpAddr>,
}

impl CertificateProfile {
    /// Build the profile of `role` from the configuration
    pub fn from_config(role: CertificateRole, config: &WalkthroughConfig) -> Self {
        let (common_name, validity_days) = match role {
            CertificateRole::Ca => (&config.ca_common_name, config.ca_validity_days),
            CertificateRole::Server => (&config.server_common_name, config.leaf_validity_days),
            CertificateRole::Client => (&config.client_common_name, config.leaf_validity_days),
        };

        let (san_dns, san_ips) = if role == CertificateRole::Server {
            let mut dns = vec![config.server_common_name.clone()];
            if config.server_common_name != "localhost" {
                dns.push("localhost".to_string());
            }
            let ips = vec![
                IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(Ipv6Addr::LOCALHOST),
            ];
            (dns, ips)
        } else {
            (Vec::new(), Vec::new())
        };

        Self {
            role,
            subject: SubjectName {
                country: config.country.clone(),
                state: config.state.clone(),
                locality: config.locality.clone(),
                organization: config.organization.clone(),
                common_name: common_name.clone(),
            },
            validity_days,
            key_bits: config.key_bits,
            san_dns,
            san_ips,
        }
    }

    /// `subjectAltName` value in openssl config syntax, if any
    pub fn san_value(&self) -> Option<String> {
        if self.san_dns.is_empty() && self.san_ips.is_empty() {
            return None;
        }
        let entries: Vec<String> = self.san_dns.iter()
            .map(|dns| format!("DNS:{}", dns))
            .chain(self.san_ips.iter().map(|ip| format!("IP:{}", ip)))
            .collect();
        Some(entries.join(", "))
    }

    /// Extension section for `openssl x509 -req -extfile`
    ///
    /// `None` for the CA, whose extensions come from `req -x509`.
    pub fn extension_config(&self) -> Option<String> {
        let eku = match self.role {
            CertificateRole::Ca => return None,
            CertificateRole::Server => "serverAuth",
            CertificateRole::Client => "clientAuth",
        };

        let mut lines = vec![
            "basicConstraints = CA:FALSE".to_string(),
            "keyUsage = critical, digitalSignature, keyEncipherment".to_string(),
            format!("extendedKeyUsage = {}", eku),
            "subjectKeyIdentifier = hash".to_string(),
            "authorityKeyIdentifier = keyid, issuer".to_string(),
        ];
        if let Some(san) = self.san_value() {
            lines.push(format!("subjectAltName = {}", san));
        }
        lines.push(String::new());
        Some(lines.join("\n"))
    }
}

/// Files produced for one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificatePaths {
    pub key: PathBuf,
    /// Signing request, leaf certificates only
    pub csr: Option<PathBuf>,
    pub cert: PathBuf,
    /// Extension file fed to `openssl x509 -extfile`, leaf certificates only
    pub ext: Option<PathBuf>,
}

impl CertificatePaths {
    /// Standard layout inside `dir`
    pub fn for_role(role: CertificateRole, dir: &Path) -> Self {
        let stem = role.stem();
        let (csr, ext) = if role.is_leaf() {
            (
                Some(dir.join(format!("{}-csr.pem", stem))),
                Some(dir.join(format!("{}-ext.cnf", stem))),
            )
        } else {
            (None, None)
        };

        Self {
            key: dir.join(format!("{}-key.pem", stem)),
            csr,
            cert: dir.join(format!("{}-cert.pem", stem)),
            ext,
        }
    }

    /// Whether the key and certificate both exist on disk
    pub fn exists(&self) -> bool {
        self.key.is_file() && self.cert.is_file()
    }
}

/// Record of an issued certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedCertificate {
    pub role: CertificateRole,
    pub common_name: String,
    pub validity_days: u32,
    pub key_bits: u32,
    pub algorithm: String,
    pub created: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub serial: String,
    pub fingerprint: String,
    pub key_path: PathBuf,
    pub cert_path: PathBuf,
}

impl IssuedCertificate {
    /// Validity as shown to the learner, e.g. "365 days"
    pub fn validity(&self) -> String {
        format!("{} days", self.validity_days)
    }

    /// Key size as shown to the learner, e.g. "2048 bits"
    pub fn key_size(&self) -> String {
        format!("{} bits", self.key_bits)
    }
}

/// One executed issuance step, shown to the learner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuanceStep {
    pub step: u32,
    /// Equivalent `openssl` command line
    pub command: String,
    pub description: String,
    pub executed: bool,
}

/// Snapshot of the certificate step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateStatus {
    /// True once CA, server and client certificates all exist
    pub created: bool,
    pub ca: Option<IssuedCertificate>,
    pub server: Option<IssuedCertificate>,
    pub client: Option<IssuedCertificate>,
    pub steps: Vec<IssuanceStep>,
}

//! Certificate inspection
//!
//! Reads PEM certificates back and extracts what the walkthrough shows:
//! subject, issuer, validity window, fingerprint and key parameters.

use std::path::Path;

use chrono::{DateTime, Utc};
use foreign_types_shared::ForeignTypeRef;
use log::debug;
use openssl::asn1::{Asn1Time, Asn1TimeRef};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::Id;
use openssl::x509::{X509, X509NameRef, X509Ref};
use serde::{Deserialize, Serialize};

use crate::common::{read_file, WalkthroughError, Result};

/// Human-readable summary of a certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateDetails {
    pub subject: String,
    pub issuer: String,
    /// Serial number in upper-case hex
    pub serial: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    /// Whole days until `not_after`, negative once expired
    pub days_remaining: i64,
    pub fingerprint_sha256: String,
    pub key_algorithm: String,
    pub key_bits: u32,
    pub is_ca: bool,
    /// subjectAltName entries rendered as `DNS:...` / `IP:...`
    pub san: Vec<String>,
}

impl CertificateDetails {
    /// Whether the current time is inside the validity window
    pub fn is_currently_valid(&self) -> bool {
        let now = Utc::now();
        self.not_before <= now && now <= self.not_after
    }
}

/// Load a PEM certificate from disk
pub fn load_cert(path: &Path) -> Result<X509> {
    let pem = read_file(path)?;
    X509::from_pem(&pem).map_err(|e| {
        WalkthroughError::Certificate(format!("Failed to parse certificate {}: {}", path.display(), e))
    })
}

/// Inspect a PEM certificate file
pub fn inspect_cert(path: &Path) -> Result<CertificateDetails> {
    debug!("Inspecting certificate {}", path.display());
    details_from_x509(&*load_cert(path)?)
}

/// Inspect an already parsed certificate
pub fn details_from_x509(cert: &X509Ref) -> Result<CertificateDetails> {
    let not_before = asn1_to_datetime(cert.not_before())?;
    let not_after = asn1_to_datetime(cert.not_after())?;
    let days_remaining = (not_after - Utc::now()).num_days();

    let public_key = cert.public_key()?;
    let key_algorithm = match public_key.id() {
        Id::RSA => "RSA",
        Id::EC => "EC",
        Id::ED25519 => "Ed25519",
        Id::DSA => "DSA",
        _ => "unknown",
    }
    .to_string();

    let serial = cert.serial_number().to_bn()?.to_hex_str()?.to_string();

    let is_ca = has_ca_constraint(cert);

    let san = cert
        .subject_alt_names()
        .map(|names| {
            names
                .iter()
                .filter_map(|name| {
                    if let Some(dns) = name.dnsname() {
                        Some(format!("DNS:{}", dns))
                    } else {
                        name.ipaddress().and_then(format_ip).map(|ip| format!("IP:{}", ip))
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(CertificateDetails {
        subject: format_name(cert.subject_name()),
        issuer: format_name(cert.issuer_name()),
        serial,
        not_before,
        not_after,
        days_remaining,
        fingerprint_sha256: fingerprint(cert)?,
        key_algorithm,
        key_bits: public_key.bits(),
        is_ca,
        san,
    })
}

/// basicConstraints present with `CA:TRUE`
fn has_ca_constraint(cert: &X509Ref) -> bool {
    // SAFETY: `cert` is a live X509; the call only fills its cached extension data
    let flags = unsafe { openssl_sys::X509_get_extension_flags(cert.as_ptr()) };
    flags & openssl_sys::EXFLAG_BCONS != 0 && flags & openssl_sys::EXFLAG_CA != 0
}

/// Subject of a PEM certificate file
pub fn get_cert_subject(path: &Path) -> Result<String> {
    Ok(format_name(load_cert(path)?.subject_name()))
}

/// SHA-256 fingerprint of a PEM certificate file
pub fn get_cert_fingerprint(path: &Path) -> Result<String> {
    fingerprint(&*load_cert(path)?)
}

/// Colon-separated upper-case hex SHA-256 digest of the DER encoding
pub fn fingerprint(cert: &X509Ref) -> Result<String> {
    let digest = cert.digest(MessageDigest::sha256())?;
    Ok(digest
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(":"))
}

/// Render a name as `C=BR, ST=SP, ..., CN=localhost` in certificate order
pub fn format_name(name: &X509NameRef) -> String {
    name.entries()
        .map(|entry| {
            let key = entry
                .object()
                .nid()
                .short_name()
                .unwrap_or("?")
                .to_string();
            let value = entry.data().to_string().unwrap_or_else(|_| "?".to_string());
            format!("{}={}", key, value)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Common name of a certificate subject, if present
pub fn common_name(name: &X509NameRef) -> Option<String> {
    name.entries_by_nid(Nid::COMMONNAME)
        .next()
        .and_then(|entry| entry.data().to_string().ok())
}

/// Whether `cert` was issued and signed by `ca`
pub fn verify_issued_by(cert: &X509Ref, ca: &X509Ref) -> Result<bool> {
    if ca.issued(cert) != openssl::x509::X509VerifyResult::OK {
        return Ok(false);
    }
    let ca_key = ca.public_key()?;
    Ok(cert.verify(&ca_key)?)
}

/// Convert an ASN.1 time to a UTC timestamp
pub fn asn1_to_datetime(time: &Asn1TimeRef) -> Result<DateTime<Utc>> {
    let epoch = Asn1Time::from_unix(0)?;
    let diff = epoch.diff(time)?;
    let seconds = i64::from(diff.days) * 86_400 + i64::from(diff.secs);
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        WalkthroughError::Certificate(format!("certificate time out of range: {}", time))
    })
}

fn format_ip(bytes: &[u8]) -> Option<String> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(std::net::Ipv4Addr::from(octets).to_string())
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(std::net::Ipv6Addr::from(octets).to_string())
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalkthroughConfig;
    use crate::pki::issuer::{CertificateIssuer, LibraryIssuer};
    use crate::pki::types::{CertificatePaths, CertificateProfile, CertificateRole};

    #[test]
    fn test_inspect_issued_chain() {
        let dir = tempfile::tempdir().unwrap();
        let config = WalkthroughConfig::default();
        let issuer = LibraryIssuer::new();

        let ca = CertificatePaths::for_role(CertificateRole::Ca, dir.path());
        issuer
            .issue_ca(&CertificateProfile::from_config(CertificateRole::Ca, &config), &ca)
            .unwrap();
        let server = CertificatePaths::for_role(CertificateRole::Server, dir.path());
        issuer
            .issue_leaf(&CertificateProfile::from_config(CertificateRole::Server, &config), &server, &ca)
            .unwrap();

        let ca_details = inspect_cert(&ca.cert).unwrap();
        assert!(ca_details.is_ca);
        assert_eq!(ca_details.subject, ca_details.issuer);
        assert!(ca_details.subject.ends_with("CN=TLS Demo CA"));
        assert!((363..=365).contains(&ca_details.days_remaining));

        let details = inspect_cert(&server.cert).unwrap();
        assert!(!details.is_ca);
        assert_eq!(details.issuer, ca_details.subject);
        assert_eq!(details.key_algorithm, "RSA");
        assert_eq!(details.key_bits, 2048);
        assert!(details.san.contains(&"DNS:localhost".to_string()));
        assert!(details.san.contains(&"IP:127.0.0.1".to_string()));
        assert!(details.is_currently_valid());

        let fp = get_cert_fingerprint(&server.cert).unwrap();
        assert_eq!(fp.len(), 32 * 3 - 1);
        assert_eq!(fp, details.fingerprint_sha256);

        let leaf = load_cert(&server.cert).unwrap();
        let root = load_cert(&ca.cert).unwrap();
        assert!(verify_issued_by(&leaf, &root).unwrap());
        assert!(!verify_issued_by(&root, &leaf).unwrap());
        assert_eq!(common_name(leaf.subject_name()).as_deref(), Some("localhost"));
    }

    #[test]
    fn test_ca_flag_ignores_names() {
        let dir = tempfile::tempdir().unwrap();
        let config = WalkthroughConfig {
            client_common_name: "CA:TRUE".to_string(),
            organization: "CA:TRUE Labs".to_string(),
            ..Default::default()
        };
        let issuer = LibraryIssuer::new();

        let ca = CertificatePaths::for_role(CertificateRole::Ca, dir.path());
        issuer
            .issue_ca(&CertificateProfile::from_config(CertificateRole::Ca, &config), &ca)
            .unwrap();
        let client = CertificatePaths::for_role(CertificateRole::Client, dir.path());
        issuer
            .issue_leaf(&CertificateProfile::from_config(CertificateRole::Client, &config), &client, &ca)
            .unwrap();

        let details = inspect_cert(&client.cert).unwrap();
        assert!(details.subject.ends_with("CN=CA:TRUE"));
        assert!(details.issuer.contains("O=CA:TRUE Labs"));
        assert!(!details.is_ca);
        assert!(inspect_cert(&ca.cert).unwrap().is_ca);
    }

    #[test]
    fn test_missing_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            inspect_cert(&dir.path().join("missing.pem")),
            Err(WalkthroughError::NotFound(_))
        ));

        let bogus = dir.path().join("bogus.pem");
        std::fs::write(&bogus, "not a certificate").unwrap();
        assert!(matches!(inspect_cert(&bogus), Err(WalkthroughError::Certificate(_))));
    }

    #[test]
    fn test_epoch_conversion() {
        let time = Asn1Time::from_unix(86_400 + 60).unwrap();
        let converted = asn1_to_datetime(&time).unwrap();
        assert_eq!(converted.timestamp(), 86_460);
    }
}

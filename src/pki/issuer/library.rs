//! In-process issuance through the openssl crate

use std::fs;

use log::{debug, info};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkey::{PKey, Private};
use openssl::rsa::Rsa;
use openssl::x509::extension::{
    AuthorityKeyIdentifier, BasicConstraints, ExtendedKeyUsage, KeyUsage,
    SubjectAlternativeName, SubjectKeyIdentifier,
};
use openssl::x509::{X509, X509Req, X509ReqBuilder};

use crate::common::fs::write_private;
use crate::common::{read_file, WalkthroughError, Result};
use crate::pki::types::{CertificatePaths, CertificateProfile, CertificateRole, IssuanceStep};
use super::{into_steps, plan_ca, plan_leaf, write_extension_file, CertificateIssuer};

/// Issuer backed by the linked OpenSSL library
///
/// Produces the same files as the command-line sequence and reports that
/// sequence as its steps.
#[derive(Debug, Default, Clone)]
pub struct LibraryIssuer;

impl LibraryIssuer {
    pub fn new() -> Self {
        Self
    }
}

fn generate_key(bits: u32) -> Result<PKey<Private>> {
    debug!("Generating {}-bit RSA key", bits);
    let rsa = Rsa::generate(bits)?;
    Ok(PKey::from_rsa(rsa)?)
}

fn random_serial() -> Result<openssl::asn1::Asn1Integer> {
    let mut serial = BigNum::new()?;
    serial.rand(159, MsbOption::MAYBE_ZERO, false)?;
    Ok(serial.to_asn1_integer()?)
}

fn build_request(profile: &CertificateProfile, key: &PKey<Private>) -> Result<X509Req> {
    let mut builder = X509ReqBuilder::new()?;
    builder.set_version(0)?;
    builder.set_subject_name(&*profile.subject.to_x509_name()?)?;
    builder.set_pubkey(key)?;
    builder.sign(key, MessageDigest::sha256())?;
    Ok(builder.build())
}

fn load_ca(ca: &CertificatePaths) -> Result<(X509, PKey<Private>)> {
    let cert = X509::from_pem(&read_file(&ca.cert)?)?;
    let key = PKey::private_key_from_pem(&read_file(&ca.key)?)?;
    Ok((cert, key))
}

impl CertificateIssuer for LibraryIssuer {
    fn name(&self) -> &'static str {
        "library"
    }

    fn issue_ca(&self, profile: &CertificateProfile, paths: &CertificatePaths) -> Result<Vec<IssuanceStep>> {
        let plan = plan_ca(profile, paths);

        let key = generate_key(profile.key_bits)?;
        write_private(&paths.key, &key.private_key_to_pem_pkcs8()?)?;

        let name = profile.subject.to_x509_name()?;
        let mut builder = X509::builder()?;
        // version 3
        builder.set_version(2)?;
        builder.set_serial_number(&*random_serial()?)?;
        builder.set_subject_name(&name)?;
        builder.set_issuer_name(&name)?;
        builder.set_not_before(&*Asn1Time::days_from_now(0)?)?;
        builder.set_not_after(&*Asn1Time::days_from_now(profile.validity_days)?)?;
        builder.set_pubkey(&key)?;

        builder.append_extension(BasicConstraints::new().critical().ca().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .key_cert_sign()
                .crl_sign()
                .digital_signature()
                .build()?,
        )?;
        let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(None, None))?;
        builder.append_extension(ski)?;

        builder.sign(&key, MessageDigest::sha256())?;
        let cert = builder.build();
        fs::write(&paths.cert, cert.to_pem()?)?;

        info!("Issued CA certificate {}", paths.cert.display());
        Ok(into_steps(CertificateRole::Ca, &plan, "openssl"))
    }

    fn issue_leaf(
        &self,
        profile: &CertificateProfile,
        paths: &CertificatePaths,
        ca: &CertificatePaths,
    ) -> Result<Vec<IssuanceStep>> {
        let plan = plan_leaf(profile, paths, ca)?;
        let (ca_cert, ca_key) = load_ca(ca)?;

        let key = generate_key(profile.key_bits)?;
        write_private(&paths.key, &key.private_key_to_pem_pkcs8()?)?;

        let request = build_request(profile, &key)?;
        if let Some(csr) = paths.csr.as_deref() {
            fs::write(csr, request.to_pem()?)?;
        }
        write_extension_file(profile, paths)?;

        let request_key = request.public_key()?;
        if !request.verify(&request_key)? {
            return Err(WalkthroughError::Certificate(format!(
                "{} signing request has an invalid signature",
                profile.role.label()
            )));
        }

        let mut builder = X509::builder()?;
        builder.set_version(2)?;
        builder.set_serial_number(&*random_serial()?)?;
        builder.set_subject_name(request.subject_name())?;
        builder.set_issuer_name(ca_cert.subject_name())?;
        builder.set_not_before(&*Asn1Time::days_from_now(0)?)?;
        builder.set_not_after(&*Asn1Time::days_from_now(profile.validity_days)?)?;
        builder.set_pubkey(&request_key)?;

        builder.append_extension(BasicConstraints::new().build()?)?;
        builder.append_extension(
            KeyUsage::new()
                .critical()
                .digital_signature()
                .key_encipherment()
                .build()?,
        )?;

        let mut eku = ExtendedKeyUsage::new();
        match profile.role {
            CertificateRole::Client => eku.client_auth(),
            _ => eku.server_auth(),
        };
        builder.append_extension(eku.build()?)?;

        let ski = SubjectKeyIdentifier::new().build(&builder.x509v3_context(Some(&ca_cert), None))?;
        builder.append_extension(ski)?;
        let aki = AuthorityKeyIdentifier::new()
            .keyid(false)
            .issuer(false)
            .build(&builder.x509v3_context(Some(&ca_cert), None))?;
        builder.append_extension(aki)?;

        if !profile.san_dns.is_empty() || !profile.san_ips.is_empty() {
            let mut san = SubjectAlternativeName::new();
            for dns in &profile.san_dns {
                san.dns(dns);
            }
            for ip in &profile.san_ips {
                san.ip(&ip.to_string());
            }
            let san = san.build(&builder.x509v3_context(Some(&ca_cert), None))?;
            builder.append_extension(san)?;
        }

        builder.sign(&ca_key, MessageDigest::sha256())?;
        let cert = builder.build();
        fs::write(&paths.cert, cert.to_pem()?)?;

        info!("Issued {} certificate {}", profile.role.label(), paths.cert.display());
        Ok(into_steps(profile.role, &plan, "openssl"))
    }
}

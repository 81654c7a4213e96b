//! Negotiated session parameters

use openssl::ssl::SslRef;
use openssl::x509::X509VerifyResult;
use serde::Serialize;

use crate::pki::inspect::format_name;

/// What the TLS library negotiated for one connection
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    /// e.g. `TLSv1.3`
    pub protocol: String,
    /// OpenSSL cipher suite name
    pub cipher: String,
    /// Secret bits of the cipher
    pub cipher_bits: i32,
    /// A peer certificate was presented and verified
    pub authorized: bool,
    /// Subject of the peer certificate, if any
    pub peer_subject: Option<String>,
}

impl SessionInfo {
    pub fn from_ssl(ssl: &SslRef) -> Self {
        let (cipher, cipher_bits) = ssl
            .current_cipher()
            .map(|c| (c.name().to_string(), c.bits().secret))
            .unwrap_or_else(|| ("unknown".to_string(), 0));

        let peer = ssl.peer_certificate();
        let authorized = peer.is_some() && ssl.verify_result() == X509VerifyResult::OK;

        Self {
            protocol: ssl.version_str().to_string(),
            cipher,
            cipher_bits,
            authorized,
            peer_subject: peer.map(|cert| format_name(cert.subject_name())),
        }
    }
}

//! Cipher suite breakdown
//!
//! Splits an OpenSSL cipher suite name into its key exchange,
//! authentication, bulk encryption and MAC parts.

use serde::{Deserialize, Serialize};

/// Substrings marking a suite as weak
const WEAK_PATTERNS: &[&str] = &[
    "RC4", "3DES", "DES-CBC", "MD5", "ANULL", "ENULL", "EXPORT", "NULL", "ADH", "AECDH",
];

const KEY_EXCHANGES: &[&str] = &["ECDHE", "DHE", "ECDH", "DH", "ADH", "AECDH", "PSK"];
const AUTHENTICATIONS: &[&str] = &["RSA", "ECDSA", "DSS", "PSK"];

const UNKNOWN: &str = "unknown";

/// Parts of a negotiated cipher suite
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherBreakdown {
    pub key_exchange: String,
    pub authentication: String,
    pub encryption: String,
    pub mac: String,
}

impl CipherBreakdown {
    fn unknown() -> Self {
        Self {
            key_exchange: UNKNOWN.to_string(),
            authentication: UNKNOWN.to_string(),
            encryption: UNKNOWN.to_string(),
            mac: UNKNOWN.to_string(),
        }
    }

    /// Break down `name` as negotiated under `protocol`
    ///
    /// TLS 1.3 suite names carry neither key exchange nor authentication:
    /// the key exchange is always ephemeral and `auth_hint` (the algorithm
    /// of the peer certificate key) fills in the authentication.
    pub fn from_suite(name: &str, protocol: &str, auth_hint: Option<&str>) -> Self {
        if let Some(rest) = name.strip_prefix("TLS_") {
            return Self::from_tls13(rest, auth_hint);
        }
        if protocol == "TLSv1.3" || !name.contains('-') {
            return Self::unknown();
        }
        Self::from_openssl_name(name)
    }

    fn from_tls13(rest: &str, auth_hint: Option<&str>) -> Self {
        let Some((cipher, mac)) = rest.rsplit_once('_') else {
            return Self::unknown();
        };
        Self {
            key_exchange: "ECDHE".to_string(),
            authentication: auth_hint.unwrap_or(UNKNOWN).to_string(),
            encryption: cipher.replace('_', "-"),
            mac: mac.to_string(),
        }
    }

    fn from_openssl_name(name: &str) -> Self {
        let mut parts: Vec<&str> = name.split('-').collect();

        let key_exchange = if KEY_EXCHANGES.contains(&parts[0]) {
            parts.remove(0).to_string()
        } else {
            // Legacy suites without a prefix use RSA key transport
            "RSA".to_string()
        };

        let authentication = match parts.first() {
            Some(part) if AUTHENTICATIONS.contains(part) && parts.len() > 1 => parts.remove(0).to_string(),
            _ if key_exchange == "RSA" => "RSA".to_string(),
            _ => UNKNOWN.to_string(),
        };

        let mac = match parts.last() {
            Some(last) if last.starts_with("SHA") || *last == "MD5" => {
                let mac = last.to_string();
                parts.pop();
                mac
            }
            _ => "AEAD".to_string(),
        };

        if parts.is_empty() {
            return Self { key_exchange, authentication, encryption: UNKNOWN.to_string(), mac };
        }

        let mut encryption: Vec<String> = parts.iter().map(|part| split_key_size(part)).collect();
        let is_mode = |part: &str| matches!(part, "GCM" | "CCM" | "CCM8" | "POLY1305" | "CBC" | "CBC3");
        if !parts.iter().any(|part| is_mode(part)) && !parts[0].starts_with("CHACHA20") {
            encryption.push("CBC".to_string());
        }

        Self {
            key_exchange,
            authentication,
            encryption: encryption.join("-"),
            mac,
        }
    }

    /// Authenticated encryption (GCM, CCM or ChaCha20-Poly1305)
    pub fn is_aead(&self) -> bool {
        ["GCM", "CCM", "POLY1305"].iter().any(|mode| self.encryption.contains(mode))
    }

    /// Ephemeral key exchange
    pub fn has_forward_secrecy(&self) -> bool {
        matches!(self.key_exchange.as_str(), "ECDHE" | "DHE")
    }
}

/// Whether a suite name contains a known weak component
pub fn is_weak_cipher(name: &str) -> bool {
    let upper = name.to_uppercase();
    WEAK_PATTERNS.iter().any(|pattern| upper.contains(pattern))
}

// AES256 -> AES-256
fn split_key_size(part: &str) -> String {
    for family in ["AES", "CAMELLIA", "ARIA"] {
        if let Some(bits) = part.strip_prefix(family) {
            if !bits.is_empty() && bits.chars().all(|c| c.is_ascii_digit()) {
                return format!("{}-{}", family, bits);
            }
        }
    }
    part.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls13_suite() {
        let b = CipherBreakdown::from_suite("TLS_AES_256_GCM_SHA384", "TLSv1.3", Some("RSA"));
        assert_eq!(b.key_exchange, "ECDHE");
        assert_eq!(b.authentication, "RSA");
        assert_eq!(b.encryption, "AES-256-GCM");
        assert_eq!(b.mac, "SHA384");
        assert!(b.is_aead());
        assert!(b.has_forward_secrecy());

        let b = CipherBreakdown::from_suite("TLS_CHACHA20_POLY1305_SHA256", "TLSv1.3", None);
        assert_eq!(b.encryption, "CHACHA20-POLY1305");
        assert_eq!(b.authentication, "unknown");
    }

    #[test]
    fn test_tls12_suites() {
        let b = CipherBreakdown::from_suite("ECDHE-RSA-AES256-GCM-SHA384", "TLSv1.2", None);
        assert_eq!(
            b,
            CipherBreakdown {
                key_exchange: "ECDHE".to_string(),
                authentication: "RSA".to_string(),
                encryption: "AES-256-GCM".to_string(),
                mac: "SHA384".to_string(),
            }
        );

        let b = CipherBreakdown::from_suite("ECDHE-ECDSA-CHACHA20-POLY1305", "TLSv1.2", None);
        assert_eq!(b.authentication, "ECDSA");
        assert_eq!(b.encryption, "CHACHA20-POLY1305");
        assert_eq!(b.mac, "AEAD");

        let b = CipherBreakdown::from_suite("AES128-SHA", "TLSv1.2", None);
        assert_eq!(b.key_exchange, "RSA");
        assert_eq!(b.encryption, "AES-128-CBC");
        assert!(!b.is_aead());
        assert!(!b.has_forward_secrecy());
    }

    #[test]
    fn test_unknown_shapes() {
        assert_eq!(CipherBreakdown::from_suite("mystery", "TLSv1.2", None), CipherBreakdown::unknown());
        assert_eq!(CipherBreakdown::from_suite("TLS_", "TLSv1.3", None).encryption, "unknown");
    }

    #[test]
    fn test_weak_patterns() {
        assert!(is_weak_cipher("RC4-MD5"));
        assert!(is_weak_cipher("DES-CBC3-SHA"));
        assert!(is_weak_cipher("ECDHE-RSA-NULL-SHA"));
        assert!(!is_weak_cipher("TLS_AES_128_GCM_SHA256"));
        assert!(!is_weak_cipher("ECDHE-RSA-AES256-GCM-SHA384"));
    }
}

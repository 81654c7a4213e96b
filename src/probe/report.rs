//! Connection test report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Negotiated handshake parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeInfo {
    pub protocol: String,
    pub cipher: String,
    pub key_exchange: String,
    pub authentication: String,
    pub encryption: String,
    pub mac: String,
    pub cipher_bits: i32,
}

/// Certificate presented by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerCertificate {
    pub subject: String,
    pub issuer: String,
    /// Current time is inside the validity window
    pub valid: bool,
    /// Chain verified against the configured CA
    pub authorized: bool,
    /// e.g. "89 days"
    pub expires_in: String,
    pub days_remaining: i64,
    pub fingerprint: String,
}

/// Timings in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Performance {
    pub handshake_time_ms: u64,
    pub total_time_ms: u64,
}

/// Outcome of one connection test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    /// The server answered with a 2xx status
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub handshake: HandshakeInfo,
    pub certificate: PeerCertificate,
    pub performance: Performance,
    pub response_status: u16,
    pub response_data: serde_json::Value,
}

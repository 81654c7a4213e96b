//! Security checklist
//!
//! Five maintenance items a learner reviews after the connection test.
//! Items can be ticked by hand or decided from the measured state.

use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::{WalkthroughError, Result};
use crate::config::MIN_KEY_BITS;
use crate::pki::IssuedCertificate;
use crate::probe::{is_weak_cipher, CipherBreakdown};

pub const ITEM_EXPIRATION: u32 = 1;
pub const ITEM_PROTOCOLS: u32 = 2;
pub const ITEM_CIPHERS: u32 = 3;
pub const ITEM_KEYS: u32 = 4;
pub const ITEM_HSTS: u32 = 5;

/// Protocol versions considered current
const ACCEPTED_PROTOCOLS: &[&str] = &["TLSv1.2", "TLSv1.3"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecklistStatus {
    Pending,
    Completed,
}

impl fmt::Display for ChecklistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

impl FromStr for ChecklistStatus {
    type Err = WalkthroughError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "completed" | "done" => Ok(Self::Completed),
            _ => Err(WalkthroughError::Config(format!(
                "Invalid checklist status: {}. Valid values are: pending, completed",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: u32,
    pub category: String,
    pub item: String,
    pub status: ChecklistStatus,
    pub description: String,
}

impl ChecklistItem {
    fn new(id: u32, category: &str, item: &str, status: ChecklistStatus, description: &str) -> Self {
        Self {
            id,
            category: category.to_string(),
            item: item.to_string(),
            status,
            description: description.to_string(),
        }
    }
}

/// Measured state the checklist can be decided from
///
/// `None` fields are not known yet; their items keep the current status.
#[derive(Debug, Clone, Default)]
pub struct AssessmentInput {
    pub certificates: Vec<IssuedCertificate>,
    pub expiry_warning_days: i64,
    pub negotiated_protocol: Option<String>,
    pub negotiated_cipher: Option<String>,
    /// Whether the running server sends HSTS, `None` while it is stopped
    pub hsts_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityChecklist {
    items: Vec<ChecklistItem>,
}

impl Default for SecurityChecklist {
    fn default() -> Self {
        use ChecklistStatus::{Completed, Pending};

        Self {
            items: vec![
                ChecklistItem::new(
                    ITEM_EXPIRATION,
                    "Certificates",
                    "Check expiration dates",
                    Pending,
                    "Certificates must be renewed before they expire",
                ),
                ChecklistItem::new(
                    ITEM_PROTOCOLS,
                    "Protocols",
                    "Disable old protocols (SSLv3, TLSv1.0)",
                    Pending,
                    "Use TLS 1.2 or later only",
                ),
                ChecklistItem::new(
                    ITEM_CIPHERS,
                    "Ciphers",
                    "Configure secure cipher suites",
                    Pending,
                    "Avoid weak ciphers and prefer AEAD",
                ),
                ChecklistItem::new(
                    ITEM_KEYS,
                    "Keys",
                    "Use keys of at least 2048 bits",
                    Completed,
                    "RSA keys shorter than 2048 bits are insecure",
                ),
                ChecklistItem::new(
                    ITEM_HSTS,
                    "HSTS",
                    "Enable HTTP Strict Transport Security",
                    Pending,
                    "Force HTTPS on every access",
                ),
            ],
        }
    }
}

impl SecurityChecklist {
    pub fn items(&self) -> &[ChecklistItem] {
        &self.items
    }

    pub fn get(&self, id: u32) -> Option<&ChecklistItem> {
        self.items.iter().find(|item| item.id == id)
    }

    /// Set the status of item `id`
    pub fn update(&mut self, id: u32, status: ChecklistStatus) -> Result<&ChecklistItem> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| WalkthroughError::NotFound(format!("checklist item {}", id)))?;

        item.status = status;
        info!("Item {} marked as {}", id, status);
        Ok(&*item)
    }

    /// Number of completed items
    pub fn completed(&self) -> usize {
        self.items
            .iter()
            .filter(|item| item.status == ChecklistStatus::Completed)
            .count()
    }

    /// Decide items from measured state, returning the ids that were decided
    pub fn assess(&mut self, input: &AssessmentInput) -> Vec<u32> {
        let now = Utc::now();
        let mut decisions: Vec<(u32, bool)> = Vec::new();

        if !input.certificates.is_empty() {
            let fresh = input
                .certificates
                .iter()
                .all(|cert| (cert.not_after - now).num_days() > input.expiry_warning_days);
            decisions.push((ITEM_EXPIRATION, fresh));

            let strong = input.certificates.iter().all(|cert| cert.key_bits >= MIN_KEY_BITS);
            decisions.push((ITEM_KEYS, strong));
        }

        if let Some(protocol) = &input.negotiated_protocol {
            decisions.push((ITEM_PROTOCOLS, ACCEPTED_PROTOCOLS.contains(&protocol.as_str())));
        }

        if let Some(cipher) = &input.negotiated_cipher {
            let protocol = input.negotiated_protocol.as_deref().unwrap_or_default();
            let breakdown = CipherBreakdown::from_suite(cipher, protocol, None);
            let strong = breakdown.is_aead() && breakdown.has_forward_secrecy() && !is_weak_cipher(cipher);
            decisions.push((ITEM_CIPHERS, strong));
        }

        if let Some(active) = input.hsts_active {
            decisions.push((ITEM_HSTS, active));
        }

        let mut decided = Vec::with_capacity(decisions.len());
        for (id, passed) in decisions {
            let status = if passed { ChecklistStatus::Completed } else { ChecklistStatus::Pending };
            if let Some(item) = self.items.iter_mut().find(|item| item.id == id) {
                debug!("Assessed item {} ({}): {}", id, item.item, status);
                item.status = status;
                decided.push(id);
            }
        }
        decided.sort_unstable();
        decided
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pki::CertificateRole;
    use chrono::Duration;
    use std::path::PathBuf;

    fn cert(days_left: i64, key_bits: u32) -> IssuedCertificate {
        IssuedCertificate {
            role: CertificateRole::Server,
            common_name: "localhost".to_string(),
            validity_days: 90,
            key_bits,
            algorithm: "RSA".to_string(),
            created: Utc::now(),
            not_after: Utc::now() + Duration::days(days_left),
            serial: "01".to_string(),
            fingerprint: "AA".to_string(),
            key_path: PathBuf::from("server-key.pem"),
            cert_path: PathBuf::from("server-cert.pem"),
        }
    }

    #[test]
    fn test_default_items() {
        let checklist = SecurityChecklist::default();
        assert_eq!(checklist.items().len(), 5);
        assert_eq!(checklist.get(ITEM_KEYS).unwrap().status, ChecklistStatus::Completed);
        assert_eq!(checklist.completed(), 1);
        assert_eq!(checklist.get(ITEM_PROTOCOLS).unwrap().category, "Protocols");
    }

    #[test]
    fn test_update() {
        let mut checklist = SecurityChecklist::default();
        let item = checklist.update(ITEM_HSTS, ChecklistStatus::Completed).unwrap();
        assert_eq!(item.status, ChecklistStatus::Completed);

        assert!(matches!(
            checklist.update(42, ChecklistStatus::Completed),
            Err(WalkthroughError::NotFound(_))
        ));
        assert_eq!("DONE".parse::<ChecklistStatus>().unwrap(), ChecklistStatus::Completed);
    }

    #[test]
    fn test_assess_keeps_undecided_items() {
        let mut checklist = SecurityChecklist::default();
        checklist.update(ITEM_HSTS, ChecklistStatus::Completed).unwrap();

        let decided = checklist.assess(&AssessmentInput::default());
        assert!(decided.is_empty());
        assert_eq!(checklist.get(ITEM_HSTS).unwrap().status, ChecklistStatus::Completed);
        assert_eq!(checklist.get(ITEM_KEYS).unwrap().status, ChecklistStatus::Completed);
    }

    #[test]
    fn test_assess_from_measurements() {
        let mut checklist = SecurityChecklist::default();
        let input = AssessmentInput {
            certificates: vec![cert(365, 2048), cert(90, 4096)],
            expiry_warning_days: 30,
            negotiated_protocol: Some("TLSv1.3".to_string()),
            negotiated_cipher: Some("TLS_AES_256_GCM_SHA384".to_string()),
            hsts_active: Some(true),
        };
        assert_eq!(checklist.assess(&input), vec![1, 2, 3, 4, 5]);
        assert_eq!(checklist.completed(), 5);

        let input = AssessmentInput {
            certificates: vec![cert(10, 2048)],
            expiry_warning_days: 30,
            negotiated_protocol: Some("TLSv1".to_string()),
            negotiated_cipher: Some("AES128-SHA".to_string()),
            hsts_active: Some(false),
        };
        checklist.assess(&input);
        assert_eq!(checklist.get(ITEM_EXPIRATION).unwrap().status, ChecklistStatus::Pending);
        assert_eq!(checklist.get(ITEM_PROTOCOLS).unwrap().status, ChecklistStatus::Pending);
        assert_eq!(checklist.get(ITEM_CIPHERS).unwrap().status, ChecklistStatus::Pending);
        assert_eq!(checklist.get(ITEM_KEYS).unwrap().status, ChecklistStatus::Completed);
        assert_eq!(checklist.get(ITEM_HSTS).unwrap().status, ChecklistStatus::Pending);
    }

    #[test]
    fn test_ciphers_need_forward_secrecy() {
        let mut checklist = SecurityChecklist::default();
        let mut input = AssessmentInput {
            negotiated_protocol: Some("TLSv1.2".to_string()),
            negotiated_cipher: Some("AES256-GCM-SHA384".to_string()),
            ..Default::default()
        };
        assert_eq!(checklist.assess(&input), vec![ITEM_PROTOCOLS, ITEM_CIPHERS]);
        assert_eq!(checklist.get(ITEM_CIPHERS).unwrap().status, ChecklistStatus::Pending);

        input.negotiated_cipher = Some("ECDHE-RSA-AES256-GCM-SHA384".to_string());
        checklist.assess(&input);
        assert_eq!(checklist.get(ITEM_CIPHERS).unwrap().status, ChecklistStatus::Completed);
    }
}

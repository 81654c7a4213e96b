//! Configuration validation

use log::warn;

use crate::common::{WalkthroughError, Result};
use super::defaults::MIN_KEY_BITS;
use super::WalkthroughConfig;

impl WalkthroughConfig {
    /// Validate the configuration
    ///
    /// Port 0 is accepted and means "any free port".
    pub fn validate(&self) -> Result<()> {
        if self.key_bits < MIN_KEY_BITS {
            return Err(WalkthroughError::Config(format!(
                "key_bits must be at least {}, got {}",
                MIN_KEY_BITS, self.key_bits
            )));
        }

        if self.ca_validity_days == 0 || self.leaf_validity_days == 0 {
            return Err(WalkthroughError::Config(
                "certificate validity must be at least one day".to_string(),
            ));
        }

        if self.leaf_validity_days > self.ca_validity_days {
            return Err(WalkthroughError::Config(format!(
                "leaf_validity_days ({}) cannot exceed ca_validity_days ({})",
                self.leaf_validity_days, self.ca_validity_days
            )));
        }

        if self.handshake_timeout == 0 || self.probe_timeout == 0 {
            return Err(WalkthroughError::Config("timeouts must be greater than zero".to_string()));
        }

        for (name, value) in [
            ("ca_common_name", &self.ca_common_name),
            ("server_common_name", &self.server_common_name),
            ("client_common_name", &self.client_common_name),
            ("organization", &self.organization),
            ("state", &self.state),
            ("locality", &self.locality),
        ] {
            if value.trim().is_empty() {
                return Err(WalkthroughError::Config(format!("{} must not be empty", name)));
            }
            // '/' would break the `-subj` argument of the command-line backend
            if value.contains('/') {
                return Err(WalkthroughError::Config(format!("{} must not contain '/'", name)));
            }
        }

        if self.country.len() != 2 || !self.country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(WalkthroughError::Config(format!(
                "country must be a two-letter code, got '{}'",
                self.country
            )));
        }

        if self.bind_host.trim().is_empty() {
            return Err(WalkthroughError::Config("bind_host must not be empty".to_string()));
        }

        if self.hsts_max_age == Some(0) {
            warn!("hsts_max_age is 0: browsers will forget the HSTS policy immediately");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(WalkthroughConfig::default().validate().is_ok());
    }

    #[test]
    fn test_ephemeral_port_is_valid() {
        let config = WalkthroughConfig { server_port: 0, ..Default::default() };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_weak_keys() {
        let config = WalkthroughConfig { key_bits: 1024, ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("2048"));
    }

    #[test]
    fn test_rejects_leaf_outliving_ca() {
        let config = WalkthroughConfig {
            ca_validity_days: 30,
            leaf_validity_days: 90,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_subject_parts() {
        let config = WalkthroughConfig { country: "BRA".to_string(), ..Default::default() };
        assert!(config.validate().is_err());

        let config = WalkthroughConfig { organization: "A/B".to_string(), ..Default::default() };
        assert!(config.validate().is_err());

        let config = WalkthroughConfig { server_common_name: "  ".to_string(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_slash_in_state_and_locality() {
        let config = WalkthroughConfig { state: "Sao/Paulo".to_string(), ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("state must not contain '/'"));

        let config = WalkthroughConfig { locality: "Sao/Paulo".to_string(), ..Default::default() };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("locality must not contain '/'"));

        let config = WalkthroughConfig { locality: String::new(), ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_timeouts() {
        let config = WalkthroughConfig { probe_timeout: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }
}

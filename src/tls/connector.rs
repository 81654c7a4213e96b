//! TLS connector creation for clients of the test server

use log::debug;
use openssl::pkey::PKey;
use openssl::ssl::{SslConnector, SslMethod, SslOptions, SslVerifyMode};
use openssl::x509::X509;
use std::path::PathBuf;

use crate::common::{read_file, Result};

/// Client-side TLS settings
#[derive(Debug, Clone, Default)]
pub struct ConnectorOptions {
    /// CA certificate to trust
    pub ca_cert: Option<PathBuf>,
    /// Certificate and key presented for mutual TLS
    pub client_identity: Option<(PathBuf, PathBuf)>,
    /// Abort the handshake when the peer does not verify
    ///
    /// With `false` the handshake always completes and the verification
    /// outcome stays readable through `SslRef::verify_result`.
    pub verify_peer: bool,
}

/// Create a client connector
pub fn create_tls_connector(options: &ConnectorOptions) -> Result<SslConnector> {
    let mut builder = SslConnector::builder(SslMethod::tls_client())?;

    if let Some((cert_path, key_path)) = &options.client_identity {
        let cert = X509::from_pem(&read_file(cert_path)?)?;
        let key = PKey::private_key_from_pem(&read_file(key_path)?)?;

        builder.set_certificate(&cert)?;
        builder.set_private_key(&key)?;
        builder.check_private_key()?;
        debug!("Presenting client certificate {}", cert_path.display());
    }

    if let Some(ca_path) = &options.ca_cert {
        builder.set_ca_file(ca_path)?;
    }

    builder.set_options(
        SslOptions::NO_SSLV2 |
        SslOptions::NO_SSLV3 |
        SslOptions::NO_TLSV1 |
        SslOptions::NO_TLSV1_1 |
        SslOptions::NO_COMPRESSION
    );

    if !options.verify_peer {
        builder.set_verify(SslVerifyMode::NONE);
    }

    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_default_connector() {
        assert!(create_tls_connector(&ConnectorOptions::default()).is_ok());
    }

    #[test]
    fn test_missing_identity_fails() {
        let options = ConnectorOptions {
            client_identity: Some((Path::new("nope-cert.pem").into(), Path::new("nope-key.pem").into())),
            ..Default::default()
        };
        assert!(create_tls_connector(&options).is_err());
    }
}

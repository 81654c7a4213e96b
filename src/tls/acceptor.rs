//! TLS acceptor creation for the HTTPS test server

use log::{debug, info};
use openssl::ssl::{SslAcceptor, SslFiletype, SslMethod, SslVerifyMode};
use openssl::x509::X509Name;
use std::path::Path;

use crate::common::{check_file_exists, Result};
use crate::config::ClientCertMode;

/// Create the server-side TLS acceptor
///
/// Uses the Mozilla intermediate profile (TLS 1.2 minimum, AEAD suites
/// first). The CA is only loaded when client certificates are requested.
///
/// # Example
///
/// ```no_run
/// # use std::path::Path;
/// # use tls_walkthrough::tls::create_tls_acceptor;
/// # use tls_walkthrough::config::ClientCertMode;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let acceptor = create_tls_acceptor(
///     Path::new("certificates/server-cert.pem"),
///     Path::new("certificates/server-key.pem"),
///     Path::new("certificates/ca-cert.pem"),
///     &ClientCertMode::Required
/// )?;
/// # Ok(())
/// # }
/// ```
pub fn create_tls_acceptor(
    cert_path: &Path,
    key_path: &Path,
    ca_cert_path: &Path,
    client_cert_mode: &ClientCertMode,
) -> Result<SslAcceptor> {
    check_file_exists(cert_path)?;
    check_file_exists(key_path)?;

    let mut acceptor = SslAcceptor::mozilla_intermediate_v5(SslMethod::tls())?;

    acceptor.set_certificate_file(cert_path, SslFiletype::PEM)?;
    acceptor.set_private_key_file(key_path, SslFiletype::PEM)?;
    acceptor.check_private_key()?;
    debug!("Loaded server certificate {}", cert_path.display());

    if *client_cert_mode != ClientCertMode::None {
        check_file_exists(ca_cert_path)?;
        acceptor.set_ca_file(ca_cert_path)?;
        acceptor.set_client_ca_list(X509Name::load_client_ca_file(ca_cert_path)?);
    }

    match client_cert_mode {
        ClientCertMode::Required => {
            info!("Client certificates required (will be verified)");
            acceptor.set_verify(SslVerifyMode::PEER | SslVerifyMode::FAIL_IF_NO_PEER_CERT);
        }
        ClientCertMode::Optional => {
            info!("Client certificates optional (will be verified if provided)");
            acceptor.set_verify(SslVerifyMode::PEER);
        }
        ClientCertMode::None => {
            info!("Client certificates not requested");
            acceptor.set_verify(SslVerifyMode::NONE);
        }
    }

    Ok(acceptor.build())
}

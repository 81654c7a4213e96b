//! TLS Walkthrough: hands-on TLS and PKI, one step at a time
//!
//! This library drives real OpenSSL work through the five steps of a TLS
//! tutorial: issue a certificate chain, configure and start an HTTPS
//! server, configure a client, test the connection, and review a security
//! checklist.
//!
//! # Main Features
//!
//! - CA, server and client certificates issued in-process or through the `openssl` binary
//! - The equivalent `openssl` command line recorded for every issuance step
//! - An HTTPS test server with optional mutual TLS
//! - A connection test reporting the negotiated protocol, cipher and chain status
//!
//! # Example
//!
//! ```no_run
//! use tls_walkthrough::{Walkthrough, Result};
//! use tls_walkthrough::config::WalkthroughConfig;
//! use tls_walkthrough::pki::CertificateRole;
//! use tls_walkthrough::walkthrough::ClientOptions;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut walkthrough = Walkthrough::new(WalkthroughConfig::default())?;
//!
//!     for role in CertificateRole::ALL {
//!         walkthrough.generate_certificate(role)?;
//!     }
//!
//!     walkthrough.configure_server(None)?;
//!     walkthrough.start_server().await?;
//!     walkthrough.configure_client(ClientOptions::default())?;
//!
//!     let report = walkthrough.test_connection().await?;
//!     println!("{} with {}", report.handshake.protocol, report.handshake.cipher);
//!
//!     walkthrough.stop_server().await?;
//!     Ok(())
//! }
//! ```

// Public modules
pub mod common;
pub mod config;
pub mod pki;
pub mod probe;
pub mod security;
pub mod server;
pub mod tls;
pub mod walkthrough;

// Re-export commonly used structures and functions for convenience
pub use common::{parse_socket_addr, Result, WalkthroughError};
pub use tls::create_tls_acceptor;
pub use walkthrough::Walkthrough;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

//! PKI module
//!
//! Certificate chain issuance for the walkthrough: a self-signed CA, then
//! server and client certificates signed by it.

pub mod chain;
pub mod environment;
pub mod inspect;
pub mod issuer;
pub mod types;

pub use chain::CertificateStore;
pub use environment::{check_environment, EnvironmentInfo, EnvironmentIssue, IssueSeverity};
pub use inspect::{get_cert_fingerprint, get_cert_subject, inspect_cert, CertificateDetails};
pub use issuer::{create_issuer, CertificateIssuer, CommandLineIssuer, LibraryIssuer};
pub use types::{
    CertificatePaths, CertificateProfile, CertificateRole, CertificateStatus, IssuanceStep,
    IssuedCertificate, SubjectName,
};

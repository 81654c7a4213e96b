//! End-to-end walkthrough tests
//!
//! Every step in order against a real server on a free port.

use std::path::Path;

use tls_walkthrough::config::{ClientCertMode, WalkthroughConfig};
use tls_walkthrough::pki::CertificateRole;
use tls_walkthrough::security::ChecklistStatus;
use tls_walkthrough::walkthrough::{ClientOptions, ServerStatus};
use tls_walkthrough::{Walkthrough, WalkthroughError};

fn config(dir: &Path, client_cert_mode: ClientCertMode) -> WalkthroughConfig {
    WalkthroughConfig {
        cert_dir: dir.to_path_buf(),
        server_port: 0,
        client_cert_mode,
        ..Default::default()
    }
}

async fn ready(config: WalkthroughConfig) -> Walkthrough {
    let mut walkthrough = Walkthrough::new(config).unwrap();
    for role in CertificateRole::ALL {
        walkthrough.generate_certificate(role).unwrap();
    }
    walkthrough.configure_server(None).unwrap();
    walkthrough.start_server().await.unwrap();
    walkthrough
}

#[tokio::test]
async fn test_full_walkthrough() {
    let dir = tempfile::tempdir().unwrap();
    let mut walkthrough = ready(config(dir.path(), ClientCertMode::None)).await;

    let status = walkthrough.certificate_status();
    assert!(status.created);
    assert_eq!(status.steps.len(), 8);

    assert_eq!(walkthrough.server_status().status, ServerStatus::Running);
    assert_ne!(walkthrough.server_status().port, 0);
    assert!(walkthrough.server_url().unwrap().starts_with("https://localhost:"));

    walkthrough.configure_client(ClientOptions::default()).unwrap();
    let report = walkthrough.test_connection().await.unwrap();

    assert!(report.success);
    assert!(report.handshake.protocol == "TLSv1.2" || report.handshake.protocol == "TLSv1.3");
    assert!(report.certificate.authorized);
    assert!(report.certificate.valid);
    assert!(report.certificate.subject.ends_with("CN=localhost"));
    assert_eq!(report.response_status, 200);
    assert_eq!(report.response_data["secure"], true);
    assert!(report.performance.handshake_time_ms <= report.performance.total_time_ms);
    assert!(walkthrough.client_status().connection_tested);

    walkthrough.assess_security();
    let checklist = walkthrough.checklist();
    assert_eq!(checklist.completed(), 5);
    assert!(checklist.items().iter().all(|item| item.status == ChecklistStatus::Completed));

    assert!(walkthrough.stop_server().await.unwrap());
    assert_eq!(walkthrough.server_status().status, ServerStatus::Stopped);
    assert!(walkthrough.server_status().configured);
    assert!(walkthrough.server_url().is_none());
}

#[tokio::test]
async fn test_mutual_tls() {
    let dir = tempfile::tempdir().unwrap();
    let mut walkthrough = ready(config(dir.path(), ClientCertMode::Required)).await;

    // No client certificate: the server refuses the session and nothing is recorded
    walkthrough.configure_client(ClientOptions { present_client_certificate: false }).unwrap();
    assert!(walkthrough.test_connection().await.is_err());
    assert!(!walkthrough.client_status().connection_tested);
    assert!(walkthrough.client_status().last_test.is_none());

    walkthrough.configure_client(ClientOptions { present_client_certificate: true }).unwrap();
    let report = walkthrough.test_connection().await.unwrap();
    assert!(report.success);
    assert!(report.certificate.authorized);

    // A later failure keeps the previous result
    walkthrough.configure_client(ClientOptions { present_client_certificate: false }).unwrap();
    assert!(walkthrough.test_connection().await.is_err());
    assert!(walkthrough.client_status().connection_tested);
    assert_eq!(walkthrough.client_status().last_test.as_ref(), Some(&report));

    walkthrough.stop_server().await.unwrap();
}

#[tokio::test]
async fn test_ca_reissue_invalidates_server_and_client() {
    let dir = tempfile::tempdir().unwrap();
    let mut walkthrough = ready(config(dir.path(), ClientCertMode::Required)).await;
    walkthrough.configure_client(ClientOptions { present_client_certificate: true }).unwrap();

    let err = walkthrough.generate_certificate(CertificateRole::Ca).unwrap_err();
    assert!(matches!(err, WalkthroughError::Precondition(_)));
    assert!(walkthrough.certificate_status().created);

    walkthrough.stop_server().await.unwrap();
    walkthrough.generate_certificate(CertificateRole::Ca).unwrap();

    let status = walkthrough.certificate_status();
    assert!(status.server.is_none());
    assert!(status.client.is_none());
    assert!(!walkthrough.server_status().configured);
    assert!(!walkthrough.client_status().present_client_certificate);
    assert!(matches!(walkthrough.start_server().await, Err(WalkthroughError::Precondition(_))));
    assert!(matches!(walkthrough.test_connection().await, Err(WalkthroughError::Precondition(_))));

    // Reissued leaves chain to the new CA again
    walkthrough.generate_certificate(CertificateRole::Server).unwrap();
    walkthrough.generate_certificate(CertificateRole::Client).unwrap();
    walkthrough.configure_server(Some(0)).unwrap();
    walkthrough.start_server().await.unwrap();
    walkthrough.configure_client(ClientOptions { present_client_certificate: true }).unwrap();
    let report = walkthrough.test_connection().await.unwrap();
    assert!(report.success);
    assert!(report.certificate.authorized);

    walkthrough.stop_server().await.unwrap();
}

#[tokio::test]
async fn test_server_lifecycle_rules() {
    let dir = tempfile::tempdir().unwrap();
    let mut walkthrough = ready(config(dir.path(), ClientCertMode::None)).await;

    assert!(matches!(walkthrough.start_server().await, Err(WalkthroughError::Precondition(_))));
    assert!(matches!(walkthrough.configure_server(Some(0)), Err(WalkthroughError::Precondition(_))));

    walkthrough.stop_server().await.unwrap();
    assert!(!walkthrough.stop_server().await.unwrap());

    // Restart after a stop
    walkthrough.configure_server(Some(0)).unwrap();
    walkthrough.start_server().await.unwrap();
    walkthrough.stop_server().await.unwrap();
}

#[tokio::test]
async fn test_resume_and_export() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut walkthrough = Walkthrough::new(config(dir.path(), ClientCertMode::None)).unwrap();
        walkthrough.generate_certificate(CertificateRole::Ca).unwrap();
        walkthrough.generate_certificate(CertificateRole::Server).unwrap();
    }

    let walkthrough = Walkthrough::resume(config(dir.path(), ClientCertMode::None)).unwrap();
    let status = walkthrough.certificate_status();
    assert!(status.ca.is_some());
    assert!(status.server.is_some());
    assert!(status.client.is_none());
    assert!(!status.created);

    let export_dir = tempfile::tempdir().unwrap();
    let exported = walkthrough.export_ca(export_dir.path()).unwrap();
    assert_eq!(exported, export_dir.path().join("ca-cert.pem"));
    assert_eq!(
        std::fs::read_to_string(&exported).unwrap(),
        walkthrough.ca_certificate_pem().unwrap()
    );
}

//! TLS Walkthrough Command Line Tool
//!
//! This binary is the command-line interface for the TLS walkthrough.

use clap::{Parser, Subcommand};
use log::{info, warn};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use tls_walkthrough::common::{init_logger, Result};
use tls_walkthrough::config::{log_config, ClientCertMode, ConfigLoader, IssuanceBackend, WalkthroughConfig};
use tls_walkthrough::pki::{get_cert_fingerprint, get_cert_subject, inspect_cert, CertificateRole};
use tls_walkthrough::probe::{ConnectionProbe, ProbeOptions};
use tls_walkthrough::security::{all_install_instructions, install_instructions, Platform, SecurityChecklist};
use tls_walkthrough::walkthrough::ClientOptions;
use tls_walkthrough::{Walkthrough, APP_NAME, VERSION};

/// TLS Walkthrough: issue a certificate chain, serve HTTPS and test the handshake
#[derive(Parser, Debug)]
#[clap(author, version = VERSION, about, long_about = None)]
struct Args {
    /// Load configuration from a JSON file
    #[clap(long, global = true)]
    config_file: Option<PathBuf>,

    /// Log level (overrides the configuration)
    #[clap(long, global = true)]
    log_level: Option<String>,

    /// Directory for keys and certificates (overrides the configuration)
    #[clap(long, global = true)]
    cert_dir: Option<PathBuf>,

    /// Issuance backend: library or command_line
    #[clap(long, global = true)]
    backend: Option<IssuanceBackend>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every step in one process and print the final state
    Run {
        /// Server port (0 picks a free port)
        #[clap(long)]
        port: Option<u16>,

        /// Require and present a client certificate (mutual TLS)
        #[clap(long)]
        mtls: bool,

        /// Keep the server running until Ctrl+C
        #[clap(long)]
        keep_running: bool,
    },

    /// Issue one certificate (ca, server or client)
    Generate {
        role: CertificateRole,
    },

    /// Show the certificates found in the certificate directory
    Status,

    /// Show the details of a PEM certificate
    Inspect {
        pem: PathBuf,
    },

    /// Serve HTTPS with the existing server certificate until Ctrl+C
    Serve {
        #[clap(long)]
        port: Option<u16>,
    },

    /// Test a TLS connection against any HTTPS server
    Probe {
        #[clap(long, default_value = "localhost")]
        host: String,

        #[clap(long, default_value_t = 8443)]
        port: u16,

        /// CA certificate used to decide whether the chain verifies
        #[clap(long)]
        ca: Option<PathBuf>,

        /// Client certificate for mutual TLS
        #[clap(long, requires = "key")]
        cert: Option<PathBuf>,

        /// Client private key for mutual TLS
        #[clap(long, requires = "cert")]
        key: Option<PathBuf>,

        #[clap(long, default_value = "/api/secure-test")]
        path: String,
    },

    /// Print the security checklist
    Checklist,

    /// Print CA installation instructions
    Instructions {
        platform: Option<Platform>,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = WalkthroughConfig::auto_load(args.config_file.as_deref())?;
    if let Some(log_level) = &args.log_level {
        config.log_level = log_level.clone();
    }
    if let Some(cert_dir) = &args.cert_dir {
        config.cert_dir = cert_dir.clone();
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }

    init_logger(&config.log_level);
    info!("Starting {} v{}", APP_NAME, VERSION);

    config.validate()?;
    log_config(&config);

    match args.command {
        Commands::Run { port, mtls, keep_running } => run(config, port, mtls, keep_running).await,
        Commands::Generate { role } => generate(config, role),
        Commands::Status => {
            let walkthrough = Walkthrough::resume(config)?;
            print_json(&walkthrough.certificate_status())
        }
        Commands::Inspect { pem } => print_json(&inspect_cert(&pem)?),
        Commands::Serve { port } => serve(config, port).await,
        Commands::Probe { host, port, ca, cert, key, path } => {
            let options = ProbeOptions {
                ca_cert: ca,
                client_identity: cert.zip(key),
                timeout: Duration::from_secs(config.probe_timeout),
                path,
            };
            let report = ConnectionProbe::new(host, port, options).run().await?;
            print_json(&report)
        }
        Commands::Checklist => print_json(&SecurityChecklist::default().items()),
        Commands::Instructions { platform: Some(platform) } => {
            for step in install_instructions(platform, config.server_port) {
                println!("{}", step);
            }
            Ok(())
        }
        Commands::Instructions { platform: None } => print_json(&all_install_instructions(config.server_port)),
    }
}

async fn run(mut config: WalkthroughConfig, port: Option<u16>, mtls: bool, keep_running: bool) -> Result<()> {
    if mtls {
        config.client_cert_mode = ClientCertMode::Required;
    }

    let mut walkthrough = Walkthrough::new(config)?;

    info!("Step 1: generating certificates");
    for role in CertificateRole::ALL {
        let issued = walkthrough.generate_certificate(role)?;
        info!("Issued {} certificate for {} ({})", role, issued.common_name, issued.validity());
    }
    for step in walkthrough.certificate_status().steps {
        info!("  [{}] {}: {}", step.step, step.description, step.command);
    }

    info!("Step 2: configuring and starting the server");
    walkthrough.configure_server(port)?;
    let addr = walkthrough.start_server().await?;

    info!("Step 3: configuring the client");
    walkthrough.configure_client(ClientOptions { present_client_certificate: mtls })?;

    info!("Step 4: testing the connection");
    let result = walkthrough.test_connection().await;
    if let Err(e) = &result {
        warn!("Connection test failed: {}", e);
    }

    info!("Step 5: reviewing security");
    walkthrough.assess_security();
    print_json(&walkthrough.summary())?;

    if keep_running && result.is_ok() {
        info!("Server listening on {}, press Ctrl+C to stop", addr);
        if let Some(url) = walkthrough.server_url() {
            info!("Open {} in a browser", url);
        }
        tokio::signal::ctrl_c().await?;
    }

    walkthrough.stop_server().await?;
    result.map(|_| ())
}

fn generate(config: WalkthroughConfig, role: CertificateRole) -> Result<()> {
    let mut walkthrough = Walkthrough::resume(config)?;
    let issued = walkthrough.generate_certificate(role)?.clone();

    for step in walkthrough.certificate_status().steps {
        if role.step_range().contains(&step.step) {
            println!("$ {}", step.command);
            println!("  {}", step.description);
        }
    }

    match get_cert_subject(&issued.cert_path) {
        Ok(subject) => info!("Certificate subject: {}", subject),
        Err(e) => warn!("Unable to get certificate subject: {}", e),
    }
    match get_cert_fingerprint(&issued.cert_path) {
        Ok(fingerprint) => info!("Certificate fingerprint: {}", fingerprint),
        Err(e) => warn!("Unable to get certificate fingerprint: {}", e),
    }

    print_json(&issued)
}

async fn serve(config: WalkthroughConfig, port: Option<u16>) -> Result<()> {
    let mut walkthrough = Walkthrough::resume(config)?;
    walkthrough.configure_server(port)?;
    let addr = walkthrough.start_server().await?;

    info!("Client certificate mode: {}", walkthrough.config().client_cert_mode);
    info!("HTTPS server ready on {}, press Ctrl+C to stop", addr);
    tokio::signal::ctrl_c().await?;

    walkthrough.stop_server().await?;
    Ok(())
}

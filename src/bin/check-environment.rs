//! Tool to check the OpenSSL library and command-line tool used by the walkthrough

use std::path::PathBuf;
use std::process::exit;

use tls_walkthrough::config::{ConfigLoader, WalkthroughConfig};
use tls_walkthrough::pki::{check_environment, IssueSeverity};

fn main() {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    println!("=== TLS Walkthrough Environment Check ===\n");

    let config = match WalkthroughConfig::auto_load(None) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            exit(1);
        }
    };

    let openssl_bin = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| config.openssl_bin.clone());

    let env_info = check_environment(&openssl_bin, config.backend);

    println!("OpenSSL library: {}", env_info.library_version);
    println!("TLS 1.3 available: {}", if env_info.library_supports_tls13 { "Yes" } else { "No" });
    println!(
        "OpenSSL command-line tool ({}): {}",
        openssl_bin.display(),
        env_info.cli_version.as_deref().unwrap_or("not found")
    );
    println!("Issuance backend: {}", config.backend);

    if !env_info.environment_variables.is_empty() {
        println!("\nEnvironment variables:");
        for (name, value) in &env_info.environment_variables {
            println!("  {}={}", name, value);
        }
    }

    if env_info.issues.is_empty() {
        println!("\nNo issues found. Environment is ready for the walkthrough.");
        return;
    }

    println!("\nEnvironment issues:");
    for issue in &env_info.issues {
        let prefix = match issue.severity {
            IssueSeverity::Info => "INFO",
            IssueSeverity::Warning => "WARNING",
            IssueSeverity::Error => "ERROR",
        };
        println!("  [{:7}] {}", prefix, issue.message);
        if let Some(resolution) = &issue.resolution {
            println!("            -> {}", resolution);
        }
    }

    if env_info.has_errors() {
        println!("\nCritical issues were found. Please resolve them before running the walkthrough.");
        exit(1);
    }
}

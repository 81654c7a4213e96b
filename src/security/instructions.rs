//! CA installation instructions per platform

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::common::WalkthroughError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Windows,
    Macos,
    Linux,
    Browser,
}

impl Platform {
    pub const ALL: [Platform; 4] = [Self::Windows, Self::Macos, Self::Linux, Self::Browser];
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Windows => "windows",
            Self::Macos => "macos",
            Self::Linux => "linux",
            Self::Browser => "browser",
        };
        f.write_str(name)
    }
}

impl FromStr for Platform {
    type Err = WalkthroughError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "windows" | "win" => Ok(Self::Windows),
            "macos" | "mac" | "osx" => Ok(Self::Macos),
            "linux" => Ok(Self::Linux),
            "browser" => Ok(Self::Browser),
            _ => Err(WalkthroughError::Config(format!(
                "Invalid platform: {}. Valid values are: windows, macos, linux, browser",
                s
            ))),
        }
    }
}

/// Numbered steps to trust the CA on `platform`
///
/// `port` is the HTTPS server port quoted by the browser steps.
pub fn install_instructions(platform: Platform, port: u16) -> Vec<String> {
    let steps: Vec<String> = match platform {
        Platform::Windows => vec![
            "Export the CA certificate (ca-cert.pem)".to_string(),
            "Double-click the exported file".to_string(),
            "Click 'Install Certificate'".to_string(),
            "Select 'Current User' or 'Local Machine'".to_string(),
            "Choose 'Place all certificates in the following store'".to_string(),
            "Click 'Browse' and select 'Trusted Root Certification Authorities'".to_string(),
            "Click 'Finish'".to_string(),
        ],
        Platform::Macos => vec![
            "Export the CA certificate (ca-cert.pem)".to_string(),
            "Double-click the exported file to open Keychain Access".to_string(),
            "Drag the certificate into 'System' or 'login'".to_string(),
            "Double-click the installed certificate".to_string(),
            "Expand 'Trust'".to_string(),
            "Set 'When using this certificate' to 'Always Trust'".to_string(),
            "Close the window and enter your password when prompted".to_string(),
        ],
        Platform::Linux => vec![
            "Export the CA certificate (ca-cert.pem)".to_string(),
            "Copy it to /usr/local/share/ca-certificates/: sudo cp ca-cert.pem /usr/local/share/ca-certificates/ca-cert.crt".to_string(),
            "Run: sudo update-ca-certificates".to_string(),
            "For Firefox: Preferences > Privacy & Security > Certificates > View Certificates > Authorities > Import".to_string(),
        ],
        Platform::Browser => vec![
            format!("Open https://localhost:{}", port),
            "Click 'Advanced'".to_string(),
            "Click 'Proceed to localhost (unsafe)'".to_string(),
            "For Chrome: click the padlock > Certificate > Details > Copy to file".to_string(),
            "For Firefox: click the padlock > Connection not secure > More information > View certificate".to_string(),
        ],
    };

    steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect()
}

/// Instructions for one platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallInstructions {
    pub platform: Platform,
    pub steps: Vec<String>,
}

/// Instructions for every platform
pub fn all_install_instructions(port: u16) -> Vec<InstallInstructions> {
    Platform::ALL
        .iter()
        .map(|&platform| InstallInstructions {
            platform,
            steps: install_instructions(platform, port),
        })
        .collect()
}

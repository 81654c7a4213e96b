//! Server and client step state

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::probe::ProbeReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Stopped,
    Configured,
    Running,
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Configured => write!(f, "configured"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Step 2 state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerState {
    pub configured: bool,
    /// Configured port, replaced by the bound port once running
    pub port: u16,
    pub status: ServerStatus,
}

impl ServerState {
    pub fn new(port: u16) -> Self {
        Self {
            configured: false,
            port,
            status: ServerStatus::Stopped,
        }
    }
}

/// Step 3 input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientOptions {
    /// Present the client certificate (mutual TLS)
    pub present_client_certificate: bool,
}

/// Step 3 and 4 state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientState {
    pub configured: bool,
    pub connection_tested: bool,
    pub last_test: Option<ProbeReport>,
    pub present_client_certificate: bool,
}

//! Network utility functions

use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use super::error::{WalkthroughError, Result};

/// Parse a socket address
///
/// Tries literal parsing first, then name resolution (`localhost:8443`).
pub fn parse_socket_addr(addr: &str) -> Result<SocketAddr> {
    if let Ok(socket_addr) = SocketAddr::from_str(addr) {
        return Ok(socket_addr);
    }

    match addr.to_socket_addrs() {
        Ok(mut addrs) => addrs.next().ok_or_else(|| {
            WalkthroughError::Config(format!("Failed to parse address: {}", addr))
        }),
        Err(e) => Err(WalkthroughError::Config(format!("Failed to parse address {}: {}", addr, e))),
    }
}

//! TLS handling module
//!
//! Acceptor and connector construction, plus the session details both
//! sides report after a handshake.

mod acceptor;
mod connector;
mod session;

pub use acceptor::create_tls_acceptor;
pub use connector::{create_tls_connector, ConnectorOptions};
pub use session::SessionInfo;

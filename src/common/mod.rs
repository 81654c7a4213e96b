//! Common module
//!
//! Shared error type, logging setup and small filesystem/network helpers.

pub mod error;
pub mod fs;
pub mod log;
pub mod net;

// Re-export commonly used types and functions
pub use error::{WalkthroughError, Result};
pub use fs::{check_file_exists, read_file, ensure_dir};
pub use log::init_logger;
pub use net::parse_socket_addr;

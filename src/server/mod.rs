//! HTTPS test server module

pub mod handler;
pub mod routes;
mod server;

pub use server::{SecureServer, ServerHandle, ServerOptions};

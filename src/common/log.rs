//! Logging helpers
//!
//! Thin wrapper around `env_logger` so binaries and tests share one setup.

/// Initialize the logger
///
/// `RUST_LOG` takes precedence over `level` when it is set.
///
/// # Parameters
///
/// * `level` - Default log level
pub fn init_logger(level: &str) {
    let env = env_logger::Env::default()
        .filter_or("RUST_LOG", level);

    // try_init: a second call (tests, repeated CLI setup) must not panic
    let _ = env_logger::Builder::from_env(env).try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logger_twice() {
        init_logger("debug");
        init_logger("info");
    }
}

//! Test suite for the Lavalink node picker
//! This module contains the end-to-end scenarios and their shared utilities

pub mod common;
pub mod integration;

/// Common test setup and utilities
pub mod test_utils {
    use tracing_subscriber::EnvFilter;

    /// Routes the picker's logs into the test output. `RUST_LOG` overrides the
    /// default of `lavapick=debug`. Safe to call from every test.
    pub fn init() {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("lavapick=debug,warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}

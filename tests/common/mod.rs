//! Common test utilities, fixtures, and mocks
//! This module contains shared functionality used across the integration scenarios

pub mod fixtures;
pub mod mocks;

use lavapick::lavalink::NodeDescriptor;
use std::path::PathBuf;

/// Get the path to test fixtures directory
pub fn fixtures_path() -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("common");
    path.push("fixtures");
    path
}

/// Builds a plain-text node descriptor named after its host
pub fn node(host: &str, port: u16) -> NodeDescriptor {
    NodeDescriptor {
        name: host.to_string(),
        host: host.to_string(),
        port,
        password: format!("{}-pw", host),
        secure: false,
        region: None,
        version: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_path() {
        let path = fixtures_path();
        assert!(path.ends_with("tests/common/fixtures"));
        assert!(path.join(fixtures::SERVER_LIST_FILE).exists());
    }
}

//! Test fixtures for the Lavalink node picker
//! This module contains sample data used in tests

/// File name of the sample server list under `tests/common/fixtures`
pub const SERVER_LIST_FILE: &str = "servers.txt";

/// Sample bot env file with keys the picker must leave alone
pub const SAMPLE_ENV: &str = "\
# Rusty music bot
PREFIX=!
DISCORD_TOKEN=MTIzNDU2Nzg5.abc.def
OWNER_ID=123456789
HOST=old.lava.example
PORT=2333
PASSWORD=old-password
SECURE=false
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_data() {
        assert!(SAMPLE_ENV.contains("PREFIX=!"));
        assert!(SERVER_LIST_FILE.ends_with(".txt"));
    }
}

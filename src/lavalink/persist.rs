//! Reads and rewrites the bot's `.env` file.
//!
//! The picker owns the Lavalink connection keys and nothing else. Every other
//! key keeps its value text exactly as written, and comments travel with the
//! key below them, so the file can be rewritten on every run without drifting.
//! Canonical keys are always written first, in [`CANONICAL_ORDER`].

use regex::Regex;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use super::{ProbeResult, SelectionError, SelectionResult};

pub const HOST_KEY: &str = "HOST";
pub const PORT_KEY: &str = "PORT";
pub const PASSWORD_KEY: &str = "PASSWORD";
pub const SECURE_KEY: &str = "SECURE";

/// Keys written at the top of the file, in this order. The bot identity keys
/// are only moved; the connection keys are overwritten by [`apply`].
pub const CANONICAL_ORDER: [&str; 6] = [
    "DISCORD_TOKEN",
    "CLIENT_ID",
    HOST_KEY,
    PORT_KEY,
    PASSWORD_KEY,
    SECURE_KEY,
];

static LINE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(export\s+)?([A-Za-z_][A-Za-z0-9_.]*)\s*=\s*(.*?)\s*$").unwrap()
});

#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    key: String,
    exported: bool,
    /// Value exactly as written in the file, quotes included.
    raw: String,
    /// Comment, blank and unrecognised lines directly above the key.
    leading: Vec<String>,
}

/// An env-style key/value store that round-trips its source text.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistedConfig {
    entries: Vec<Entry>,
    trailing: Vec<String>,
}

impl PersistedConfig {
    /// Parses `KEY=value` lines. When a key repeats, the first definition wins,
    /// matching how dotenv loaders treat the file.
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        let mut pending = Vec::new();

        for (number, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                pending.push(line.to_string());
                continue;
            }

            let Some(caps) = LINE_REGEX.captures(line) else {
                warn!("Keeping unrecognised line {} of config as-is", number + 1);
                pending.push(line.to_string());
                continue;
            };

            let key = caps[2].to_string();
            if config.position(&key).is_some() {
                warn!("Dropping duplicate definition of {} on line {}", key, number + 1);
                continue;
            }

            config.entries.push(Entry {
                key,
                exported: caps.get(1).is_some(),
                raw: caps[3].to_string(),
                leading: std::mem::take(&mut pending),
            });
        }

        config.trailing = pending;
        config
    }

    /// Loads the store at `path`. A missing or unreadable file yields an empty
    /// store rather than an error.
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => {
                let config = Self::parse(&text);
                debug!("Loaded {} key(s) from {}", config.len(), path.display());
                config
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No config at {}, starting from an empty one", path.display());
                Self::default()
            }
            Err(e) => {
                warn!(
                    "Could not read {} ({}); it will be replaced by a fresh config",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|entry| entry.key == key)
    }

    /// The unquoted value of `key`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.position(key)
            .map(|index| unquote(&self.entries[index].raw))
    }

    /// Sets `key`, quoting the value if needed. An existing key keeps its place
    /// and the comments above it.
    pub fn set(&mut self, key: &str, value: &str) {
        let raw = quote(value);
        match self.position(key) {
            Some(index) => self.entries[index].raw = raw,
            None => self.entries.push(Entry {
                key: key.to_string(),
                exported: false,
                raw,
                leading: Vec::new(),
            }),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `(HOST, PORT)` the bot is currently configured with, if both are set.
    pub fn current_node(&self) -> Option<(String, u16)> {
        let host = self.get(HOST_KEY)?;
        let port = self.get(PORT_KEY)?.parse().ok()?;
        Some((host, port))
    }

    /// Serializes the store: canonical keys first, in declared order, then every
    /// other key in its original order.
    pub fn render(&self) -> String {
        let canonical = CANONICAL_ORDER
            .iter()
            .filter_map(|key| self.position(key))
            .map(|index| &self.entries[index]);
        let others = self
            .entries
            .iter()
            .filter(|entry| !CANONICAL_ORDER.contains(&entry.key.as_str()));

        let mut out = String::new();
        for entry in canonical.chain(others) {
            for line in &entry.leading {
                out.push_str(line);
                out.push('\n');
            }
            if entry.exported {
                out.push_str("export ");
            }
            out.push_str(&entry.key);
            out.push('=');
            out.push_str(&entry.raw);
            out.push('\n');
        }
        for line in &self.trailing {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Returns a copy of `existing` pointing the bot at `chosen`. Only the
/// connection keys change.
pub fn apply(existing: &PersistedConfig, chosen: &ProbeResult) -> PersistedConfig {
    let node = &chosen.node;
    let mut config = existing.clone();
    config.set(HOST_KEY, &node.host);
    config.set(PORT_KEY, &node.port.to_string());
    config.set(PASSWORD_KEY, &node.password);
    config.set(SECURE_KEY, if node.secure { "true" } else { "false" });
    config
}

/// Replaces `destination` with the rendered config.
///
/// The new content goes to a temporary file next to the destination, which is
/// then renamed over it; on failure the previous file is left as it was.
pub async fn write(config: &PersistedConfig, destination: &Path) -> SelectionResult<()> {
    let contents = config.render();
    let target: PathBuf = destination.to_path_buf();

    let outcome = tokio::task::spawn_blocking(move || replace_file(&target, contents.as_bytes()))
        .await
        .unwrap_or_else(|e| Err(io::Error::other(e)));

    match outcome {
        Ok(()) => {
            info!("Wrote {} key(s) to {}", config.len(), destination.display());
            Ok(())
        }
        Err(source) => Err(SelectionError::Persist {
            path: destination.to_path_buf(),
            source,
        }),
    }
}

fn replace_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    if let Ok(metadata) = std::fs::metadata(path) {
        file.as_file().set_permissions(metadata.permissions())?;
    }
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Quotes `value` so a dotenv loader reads it back unchanged.
fn quote(value: &str) -> String {
    let plain = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "_-.,:/@+%~".contains(c));
    if plain {
        return value.to_string();
    }
    if !value.contains('\'') && !value.contains('\\') && !value.contains('\n') {
        return format!("'{}'", value);
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '$' => quoted.push_str("\\$"),
            '\n' => quoted.push_str("\\n"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Reverses [`quote`] and strips inline comments from unquoted values.
fn unquote(raw: &str) -> String {
    if raw.len() >= 2 && raw.starts_with('\'') && raw.ends_with('\'') {
        return raw[1..raw.len() - 1].to_string();
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let mut value = String::with_capacity(raw.len());
        let mut chars = raw[1..raw.len() - 1].chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                value.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => value.push('\n'),
                Some(escaped) => value.push(escaped),
                None => value.push('\\'),
            }
        }
        return value;
    }
    match raw.find(" #") {
        Some(index) => raw[..index].trim_end().to_string(),
        None => raw.to_string(),
    }
}

//! Core data types shared by the selection pipeline: candidate nodes and the
//! outcome of probing them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Display name used when a server list entry doesn't carry one.
pub const DEFAULT_NODE_NAME: &str = "Unknown";

/// A candidate Lavalink node taken from a server list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NodeDescriptor {
    /// Display label.
    pub name: String,
    /// Hostname or IP address.
    pub host: String,
    /// TCP port, never 0.
    pub port: u16,
    /// Value sent in the `Authorization` header.
    pub password: String,
    /// Whether the node is reached over TLS.
    pub secure: bool,
    /// Free-text region label.
    pub region: Option<String>,
    /// Free-text version label as advertised by the list.
    pub version: Option<String>,
}

/// A loosely typed value pulled out of a server list fragment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawValue {
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl RawValue {
    fn as_text(&self) -> Option<String> {
        match self {
            RawValue::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            RawValue::Integer(i) => Some(i.to_string()),
            _ => None,
        }
    }

    fn as_port(&self) -> Option<u16> {
        let port = match self {
            RawValue::Integer(i) => u16::try_from(*i).ok()?,
            RawValue::Text(s) => s.trim().parse::<u16>().ok()?,
            RawValue::Bool(_) => return None,
        };
        (port != 0).then_some(port)
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            RawValue::Bool(b) => Some(*b),
            RawValue::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            RawValue::Integer(_) => None,
        }
    }
}

/// Why a fragment could not become a [`NodeDescriptor`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidDescriptor {
    MissingHost,
    MissingPort,
    MissingPassword,
    MissingSecure,
}

impl fmt::Display for InvalidDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let field = match self {
            InvalidDescriptor::MissingHost => "host",
            InvalidDescriptor::MissingPort => "port",
            InvalidDescriptor::MissingPassword => "password",
            InvalidDescriptor::MissingSecure => "secure",
        };
        write!(f, "missing or invalid `{}`", field)
    }
}

impl NodeDescriptor {
    /// Builds a descriptor from extracted fields, enforcing that `host`, `port`,
    /// `password` and `secure` are present and well-typed.
    pub fn from_fields(fields: &HashMap<String, RawValue>) -> Result<Self, InvalidDescriptor> {
        let text = |key: &str| fields.get(key).and_then(RawValue::as_text);

        let host = text("host").ok_or(InvalidDescriptor::MissingHost)?;
        let port = fields
            .get("port")
            .and_then(RawValue::as_port)
            .ok_or(InvalidDescriptor::MissingPort)?;
        let password = fields
            .get("password")
            .and_then(|v| match v {
                // An empty password is still a password.
                RawValue::Text(s) => Some(s.clone()),
                other => other.as_text(),
            })
            .ok_or(InvalidDescriptor::MissingPassword)?;
        let secure = fields
            .get("secure")
            .and_then(RawValue::as_bool)
            .ok_or(InvalidDescriptor::MissingSecure)?;

        Ok(Self {
            name: text("name").unwrap_or_else(|| DEFAULT_NODE_NAME.to_string()),
            host,
            port,
            password,
            secure,
            region: text("region"),
            version: text("version"),
        })
    }

    /// `https` for secure nodes, `http` otherwise.
    pub fn scheme(&self) -> &'static str {
        if self.secure { "https" } else { "http" }
    }

    /// `host:port`, used for de-duplication and display.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Classification of a failed probe. `None` only ever accompanies a reachable result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    None,
    Timeout,
    ConnectionRefused,
    DnsFailure,
    ProtocolError,
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorKind::None => "ok",
            ErrorKind::Timeout => "timed out",
            ErrorKind::ConnectionRefused => "connection refused",
            ErrorKind::DnsFailure => "DNS lookup failed",
            ErrorKind::ProtocolError => "protocol error",
            ErrorKind::Unknown => "unknown error",
        };
        f.write_str(text)
    }
}

/// CPU section of the Lavalink `/v4/stats` payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuStats {
    pub cores: u32,
    pub system_load: f64,
    pub lavalink_load: f64,
}

/// The parts of the Lavalink `/v4/stats` payload we care about.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeStats {
    pub players: u32,
    pub playing_players: u32,
    /// Milliseconds since the node started.
    pub uptime: u64,
    #[serde(default)]
    pub cpu: Option<CpuStats>,
}

/// Outcome of probing a single node. Built only through [`ProbeResult::reachable`]
/// and [`ProbeResult::unreachable`], so a latency is present iff the node answered.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProbeResult {
    pub node: NodeDescriptor,
    latency_ms: Option<f64>,
    error_kind: ErrorKind,
    sampled_at: DateTime<Utc>,
    reported_version: Option<String>,
    stats: Option<NodeStats>,
}

impl ProbeResult {
    pub fn reachable(
        node: NodeDescriptor,
        latency_ms: f64,
        reported_version: Option<String>,
        stats: Option<NodeStats>,
    ) -> Self {
        Self {
            node,
            latency_ms: Some(latency_ms),
            error_kind: ErrorKind::None,
            sampled_at: Utc::now(),
            reported_version,
            stats,
        }
    }

    pub fn unreachable(node: NodeDescriptor, error_kind: ErrorKind) -> Self {
        // A failure always carries a reason.
        let error_kind = match error_kind {
            ErrorKind::None => ErrorKind::Unknown,
            kind => kind,
        };
        Self {
            node,
            latency_ms: None,
            error_kind,
            sampled_at: Utc::now(),
            reported_version: None,
            stats: None,
        }
    }

    pub fn is_reachable(&self) -> bool {
        self.latency_ms.is_some()
    }

    pub fn latency_ms(&self) -> Option<f64> {
        self.latency_ms
    }

    pub fn error_kind(&self) -> ErrorKind {
        self.error_kind
    }

    pub fn sampled_at(&self) -> DateTime<Utc> {
        self.sampled_at
    }

    /// Version string returned by the node's `/version` endpoint.
    pub fn reported_version(&self) -> Option<&str> {
        self.reported_version.as_deref()
    }

    pub fn stats(&self) -> Option<&NodeStats> {
        self.stats.as_ref()
    }
}

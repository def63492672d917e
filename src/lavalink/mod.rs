//! Lavalink node selection: read a list of candidate nodes, probe them, rank the
//! reachable ones by latency and persist the chosen node for the bot to pick up.

/// Env-style config store the bot reads its Lavalink connection from.
pub mod persist;
/// Automatic and interactive selection flows.
pub mod policy;
/// Single-node latency measurement (TCP connect or HTTP status endpoints).
pub mod probe;
/// Reachable-only latency ranking.
pub mod ranker;
/// Plain-text summaries of a scan.
pub mod report;
/// Bounded-concurrency probing of every candidate.
pub mod scheduler;
/// Tolerant parsing of loosely formatted server lists.
pub mod server_list;

mod node;

pub use node::{
    CpuStats, DEFAULT_NODE_NAME, ErrorKind, InvalidDescriptor, NodeDescriptor, NodeStats,
    ProbeResult, RawValue,
};

use std::path::PathBuf;
use thiserror::Error;

/// Errors that end a selection run. Per-node probe failures are not errors;
/// they are recorded in the node's [`ProbeResult`].
#[derive(Error, Debug)]
pub enum SelectionError {
    #[error("Server list unavailable: {0}")]
    SourceUnavailable(String),

    #[error("No valid Lavalink nodes found in the server list")]
    NoCandidates,

    #[error("None of the {0} candidate nodes responded")]
    NoReachableNodes(usize),

    #[error("Failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Input closed before a node was chosen")]
    PromptClosed,

    #[error("Prompt I/O failure: {0}")]
    Prompt(std::io::Error),
}

/// Result type for selection operations
pub type SelectionResult<T> = Result<T, SelectionError>;

//! Picks the fastest reachable Lavalink node for the music bot and writes its
//! connection settings into the bot's `.env` file.

/// Scan settings and their defaults.
pub mod config;
/// Node discovery, probing, ranking, selection and persistence.
pub mod lavalink;
/// Helpers around the pipeline, such as restarting the bot.
pub mod utils;

pub type Error = Box<dyn std::error::Error + Send + Sync>;

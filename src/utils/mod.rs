//! This module aggregates utility submodules used around the selection pipeline.

/// Utilities for restarting the bot through its process manager.
pub mod process_manager;

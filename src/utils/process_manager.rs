//! Restarts the bot after its Lavalink settings changed.
//! The bot is expected to run under PM2; another binary with a compatible
//! `restart <app>` interface can be configured instead.

use std::process::ExitStatus;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// Process manager binary used when none is configured.
pub const DEFAULT_PROGRAM: &str = "pm2";

/// Errors that can occur while restarting the bot.
#[derive(Error, Debug)]
pub enum RestartError {
    /// The process manager could not be started at all.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The process manager ran but reported failure.
    #[error("`{command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },
}

/// Handle on the process manager supervising the bot.
#[derive(Clone, Debug)]
pub struct ProcessManager {
    program: String,
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl ProcessManager {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs `<program> restart <app>` and waits for it to finish.
    pub async fn restart(&self, app: &str) -> Result<(), RestartError> {
        let command = format!("{} restart {}", self.program, app);
        debug!("Running `{}`", command);

        let output = Command::new(&self.program)
            .arg("restart")
            .arg(app)
            .output()
            .await
            .map_err(|source| RestartError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(RestartError::Failed {
                command,
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        info!("Restarted {} via {}", app, self.program);
        Ok(())
    }
}

//! Tuning knobs for a scan, with the defaults the picker ships with.

use clap::ValueEnum;
use std::time::Duration;

/// Probes launched together before waiting for the whole batch.
pub const DEFAULT_BATCH_SIZE: usize = 5;
/// Hard limit for a single probe sample.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);
pub const DEFAULT_SAMPLES: u32 = 1;
/// Pause between consecutive samples of the same node.
pub const DEFAULT_SAMPLE_PAUSE: Duration = Duration::from_millis(250);
/// Number of choices offered in interactive mode.
pub const DEFAULT_TOP: usize = 5;

/// How a node's reachability is measured.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ProbeStrategy {
    /// Time a raw TCP connect to `host:port`.
    Tcp,
    /// Time an authorized `GET /version`, then read `/v4/stats`.
    #[default]
    Http,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanSettings {
    pub batch_size: usize,
    pub timeout: Duration,
    pub samples: u32,
    pub sample_pause: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            timeout: DEFAULT_TIMEOUT,
            samples: DEFAULT_SAMPLES,
            sample_pause: DEFAULT_SAMPLE_PAUSE,
        }
    }
}

impl ScanSettings {
    /// Worst-case wall time of a scan over `nodes` candidates, counting the
    /// stats fetch that follows a node's samples. Saturates at `Duration::MAX`.
    pub fn worst_case(&self, nodes: usize) -> Duration {
        let batches = u32::try_from(nodes.div_ceil(self.batch_size.max(1))).unwrap_or(u32::MAX);
        let samples = self.samples.max(1);
        self.timeout
            .saturating_mul(samples.saturating_add(1))
            .saturating_add(self.sample_pause.saturating_mul(samples - 1))
            .saturating_mul(batches)
    }
}

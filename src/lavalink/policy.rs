//! Turns a list of candidates into exactly one chosen node, either by taking
//! the fastest one or by asking the operator.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use super::probe::NodeProbe;
use super::ranker::{RankedSelection, rank};
use super::report::format_choices;
use super::scheduler::probe_all;
use super::{NodeDescriptor, ProbeResult, SelectionError, SelectionResult};
use crate::config::{DEFAULT_TOP, ScanSettings};

/// How the final node is picked from a scan.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SelectionMode {
    /// Take the fastest reachable node.
    #[default]
    Automatic,
    /// Offer the `top` fastest nodes and let the operator pick.
    Interactive { top: usize },
}

impl SelectionMode {
    pub fn interactive() -> Self {
        SelectionMode::Interactive { top: DEFAULT_TOP }
    }
}

/// Every probe result of a run, plus their ranking.
#[derive(Clone, Debug)]
pub struct Scan {
    pub results: Vec<ProbeResult>,
    pub ranked: RankedSelection,
}

/// Probes and ranks `nodes`. An empty candidate list is an error, distinct from
/// a list where every node turns out to be down.
pub async fn scan(
    nodes: &[NodeDescriptor],
    probe: &dyn NodeProbe,
    settings: &ScanSettings,
) -> SelectionResult<Scan> {
    if nodes.is_empty() {
        return Err(SelectionError::NoCandidates);
    }

    info!(
        "Probing {} node(s) in batches of {} (up to {:?})",
        nodes.len(),
        settings.batch_size.max(1),
        settings.worst_case(nodes.len())
    );
    let results = probe_all(nodes, probe, settings).await;
    let ranked = rank(&results);
    info!("{} of {} node(s) reachable", ranked.len(), results.len());

    Ok(Scan { results, ranked })
}

impl Scan {
    /// The fastest reachable node.
    pub fn select_automatic(&self) -> SelectionResult<ProbeResult> {
        self.ranked
            .best()
            .cloned()
            .ok_or(SelectionError::NoReachableNodes(self.results.len()))
    }

    /// Shows the `top` fastest nodes on `output` and reads a 1-based choice from
    /// `input`. An empty line picks the fastest; anything else that isn't a
    /// listed number asks again.
    pub async fn select_interactive<R, W>(
        &self,
        top: usize,
        input: &mut R,
        output: &mut W,
    ) -> SelectionResult<ProbeResult>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let choices = self.ranked.top_k(top.max(1));
        if choices.is_empty() {
            return Err(SelectionError::NoReachableNodes(self.results.len()));
        }

        write_prompt(output, &format_choices(choices)).await?;
        loop {
            write_prompt(
                output,
                &format!("\nChoose a node [1-{}] (Enter for 1): ", choices.len()),
            )
            .await?;

            let mut line = String::new();
            let read = input
                .read_line(&mut line)
                .await
                .map_err(SelectionError::Prompt)?;
            if read == 0 {
                return Err(SelectionError::PromptClosed);
            }

            match parse_choice(line.trim(), choices.len()) {
                Some(index) => return Ok(choices[index].clone()),
                None => {
                    warn!("Rejected node choice {:?}", line.trim());
                    write_prompt(
                        output,
                        &format!("Please enter a number between 1 and {}.", choices.len()),
                    )
                    .await?;
                }
            }
        }
    }

    /// Picks a node according to `mode`. `input`/`output` are only used in
    /// interactive mode.
    pub async fn select<R, W>(
        &self,
        mode: SelectionMode,
        input: &mut R,
        output: &mut W,
    ) -> SelectionResult<ProbeResult>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let chosen = match mode {
            SelectionMode::Automatic => self.select_automatic()?,
            SelectionMode::Interactive { top } => {
                self.select_interactive(top, input, output).await?
            }
        };
        info!(
            "Selected {} ({}) at {:.2} ms",
            chosen.node.name,
            chosen.node.address(),
            chosen.latency_ms().unwrap_or_default()
        );
        Ok(chosen)
    }
}

/// Maps operator input to a 0-based index into `count` choices.
fn parse_choice(input: &str, count: usize) -> Option<usize> {
    if input.is_empty() {
        return Some(0);
    }
    let choice: usize = input.parse().ok()?;
    (1..=count).contains(&choice).then(|| choice - 1)
}

async fn write_prompt<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> SelectionResult<()> {
    output
        .write_all(text.as_bytes())
        .await
        .map_err(SelectionError::Prompt)?;
    output.flush().await.map_err(SelectionError::Prompt)
}

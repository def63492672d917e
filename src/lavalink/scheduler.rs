use futures::future::join_all;
use tracing::debug;

use super::probe::{NodeProbe, measure};
use super::{NodeDescriptor, ProbeResult};
use crate::config::ScanSettings;

/// Probes every node, `settings.batch_size` at a time.
///
/// Each batch runs concurrently and must finish completely before the next one
/// starts. Failures are recorded in the results, so the output always has one
/// entry per input node, in input order.
pub async fn probe_all(
    nodes: &[NodeDescriptor],
    probe: &dyn NodeProbe,
    settings: &ScanSettings,
) -> Vec<ProbeResult> {
    let batch_size = settings.batch_size.max(1);
    let batches = nodes.len().div_ceil(batch_size);
    let mut results = Vec::with_capacity(nodes.len());

    for (index, batch) in nodes.chunks(batch_size).enumerate() {
        debug!(
            "Probing batch {}/{} ({} node(s))",
            index + 1,
            batches,
            batch.len()
        );
        let batch_results = batch.iter().map(|node| measure(probe, node, settings));
        results.extend(join_all(batch_results).await);
    }

    results
}

use super::ProbeResult;

/// Reachable probe results, lowest latency first. May be empty when every
/// node is down.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RankedSelection(Vec<ProbeResult>);

impl RankedSelection {
    /// The fastest reachable node, if any.
    pub fn best(&self) -> Option<&ProbeResult> {
        self.0.first()
    }

    /// The first `k` entries, or all of them if there are fewer.
    pub fn top_k(&self, k: usize) -> &[ProbeResult] {
        &self.0[..k.min(self.0.len())]
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ProbeResult> {
        self.0.iter()
    }

    pub fn into_vec(self) -> Vec<ProbeResult> {
        self.0
    }
}

/// Drops unreachable results and sorts the rest by latency.
///
/// The sort is stable, so nodes with equal latency keep their input order.
pub fn rank(results: &[ProbeResult]) -> RankedSelection {
    let mut reachable: Vec<ProbeResult> = results
        .iter()
        .filter(|result| result.is_reachable())
        .cloned()
        .collect();
    reachable.sort_by(|a, b| {
        let a = a.latency_ms().unwrap_or(f64::INFINITY);
        let b = b.latency_ms().unwrap_or(f64::INFINITY);
        a.total_cmp(&b)
    });
    RankedSelection(reachable)
}

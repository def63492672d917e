//! Mock implementations for external dependencies
//! This module contains mock probes used for testing

use async_trait::async_trait;
use mockall::mock;
use std::collections::HashMap;

use lavapick::lavalink::probe::{NodeProbe, Sample};
use lavapick::lavalink::{ErrorKind, NodeDescriptor, NodeStats};

mock! {
    // Probe whose outcomes are scripted per test
    pub Probe {}

    #[async_trait]
    impl NodeProbe for Probe {
        async fn sample(&self, node: &NodeDescriptor) -> Result<Sample, ErrorKind>;
        async fn stats(&self, node: &NodeDescriptor) -> Option<NodeStats>;
    }
}

/// Creates a mock probe that answers from a `host -> outcome` table.
/// Hosts missing from the table time out.
pub fn scripted_probe(outcomes: &[(&str, Result<f64, ErrorKind>)]) -> MockProbe {
    let table: HashMap<String, Result<f64, ErrorKind>> = outcomes
        .iter()
        .map(|(host, outcome)| (host.to_string(), *outcome))
        .collect();

    let mut probe = MockProbe::new();
    probe.expect_sample().returning(move |node| {
        table
            .get(&node.host)
            .copied()
            .unwrap_or(Err(ErrorKind::Timeout))
            .map(Sample::latency)
    });
    probe.expect_stats().returning(|_| None);
    probe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::node;

    #[tokio::test]
    async fn test_scripted_probe() {
        let probe = scripted_probe(&[("a", Ok(12.0)), ("b", Err(ErrorKind::ConnectionRefused))]);

        assert_eq!(probe.sample(&node("a", 1)).await, Ok(Sample::latency(12.0)));
        assert_eq!(
            probe.sample(&node("b", 1)).await,
            Err(ErrorKind::ConnectionRefused)
        );
        assert_eq!(probe.sample(&node("c", 1)).await, Err(ErrorKind::Timeout));
    }
}

//! Human-readable output for a scan.

use super::{NodeDescriptor, ProbeResult};

/// One line per probed node, in probe order, with a header counting the
/// reachable ones. The node matching `current` (`host`, `port`) is marked.
pub fn format_summary(results: &[ProbeResult], current: Option<(&str, u16)>) -> String {
    let reachable = results.iter().filter(|r| r.is_reachable()).count();
    let mut formatted = format!(
        "Probed {} node(s), {} reachable\n\n",
        results.len(),
        reachable
    );

    for result in results {
        let status = match result.latency_ms() {
            Some(ms) => format!("[ OK ] {:>9.2} ms", ms),
            None => format!("[FAIL] {}", result.error_kind()),
        };
        formatted.push_str(&format!("{}  {}", status, describe(&result.node)));

        if let Some(stats) = result.stats() {
            formatted.push_str(&format!(
                ", {} player(s), {} playing",
                stats.players, stats.playing_players
            ));
        }
        if let Some(version) = result.reported_version() {
            formatted.push_str(&format!(", v{}", version.trim_start_matches('v')));
        }
        if is_current(&result.node, current) {
            formatted.push_str("  <- current");
        }
        formatted.push('\n');
    }

    formatted
}

/// Numbered list of choices for the interactive prompt, starting at 1.
pub fn format_choices(choices: &[ProbeResult]) -> String {
    let mut formatted = String::from("Fastest reachable nodes:\n\n");
    for (i, choice) in choices.iter().enumerate() {
        formatted.push_str(&format!(
            "{}. {:.2} ms  {}\n",
            i + 1,
            choice.latency_ms().unwrap_or_default(),
            describe(&choice.node)
        ));
    }
    formatted
}

fn describe(node: &NodeDescriptor) -> String {
    let mut text = format!(
        "{} ({}{})",
        node.name,
        node.address(),
        if node.secure { ", ssl" } else { "" }
    );
    if let Some(region) = &node.region {
        text.push_str(&format!(" [{}]", region));
    }
    text
}

fn is_current(node: &NodeDescriptor, current: Option<(&str, u16)>) -> bool {
    current.is_some_and(|(host, port)| node.host.eq_ignore_ascii_case(host) && node.port == port)
}

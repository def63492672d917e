use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use reqwest::Client;
use std::time::Duration;
use tokio::net::TcpListener;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use lavapick::config::{ProbeStrategy, ScanSettings};
use lavapick::lavalink::persist::{self, PersistedConfig};
use lavapick::lavalink::policy::{SelectionMode, scan};
use lavapick::lavalink::probe::{build_probe, probe_client};
use lavapick::lavalink::{ErrorKind, SelectionError, server_list};

use crate::common::fixtures::{SAMPLE_ENV, SERVER_LIST_FILE};
use crate::common::mocks::scripted_probe;
use crate::common::{fixtures_path, node};
use crate::test_utils;

fn settings() -> ScanSettings {
    ScanSettings {
        batch_size: 5,
        timeout: Duration::from_millis(2000),
        samples: 1,
        sample_pause: Duration::from_millis(10),
    }
}

#[tokio::test]
async fn test_fixture_server_list() {
    test_utils::init();
    let source = fixtures_path().join(SERVER_LIST_FILE);

    let nodes = server_list::load(source.to_str().unwrap(), &Client::new())
        .await
        .unwrap();

    let names: Vec<_> = nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["Serenetia", "Jirayu", "Unknown"]);
    assert_eq!(nodes[0].password, "https://dsc.gg/ajidevserver");
    assert_eq!(nodes[0].region.as_deref(), Some("Singapore"));
    assert!(nodes[0].secure);
    assert_eq!(nodes[1].port, 13592);
    assert!(!nodes[1].secure);
    assert_eq!(nodes[2].port, 80);
    assert_eq!(nodes[2].version.as_deref(), Some("v3"));
}

#[tokio::test]
async fn test_empty_source_has_no_candidates() {
    test_utils::init();
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("servers.txt");
    std::fs::write(&source, "").unwrap();

    let nodes = server_list::load(source.to_str().unwrap(), &Client::new())
        .await
        .unwrap();
    assert!(nodes.is_empty());

    let probe = scripted_probe(&[]);
    let result = scan(&nodes, &probe, &settings()).await;
    assert_matches!(result, Err(SelectionError::NoCandidates));
}

#[tokio::test]
async fn test_all_nodes_down() {
    test_utils::init();
    let nodes = vec![node("a", 1), node("b", 2), node("c", 3)];
    let probe = scripted_probe(&[
        ("a", Err(ErrorKind::Timeout)),
        ("b", Err(ErrorKind::Timeout)),
        ("c", Err(ErrorKind::Timeout)),
    ]);

    let scan = scan(&nodes, &probe, &settings()).await.unwrap();

    assert_eq!(scan.results.len(), 3);
    assert!(scan.ranked.is_empty());
    assert_matches!(scan.select_automatic(), Err(SelectionError::NoReachableNodes(3)));
}

#[tokio::test]
async fn test_typical_success_updates_env_file() {
    test_utils::init();
    let dir = tempfile::tempdir().unwrap();
    let env_file = dir.path().join(".env");
    std::fs::write(&env_file, SAMPLE_ENV).unwrap();

    let nodes = vec![
        node("down.example", 2333),
        node("fast.example", 443),
        node("slow.example", 80),
    ];
    let probe = scripted_probe(&[
        ("down.example", Err(ErrorKind::Timeout)),
        ("fast.example", Ok(80.0)),
        ("slow.example", Ok(120.0)),
    ]);

    let scan = scan(&nodes, &probe, &settings()).await.unwrap();
    let ranked: Vec<_> = scan.ranked.iter().map(|r| r.latency_ms().unwrap()).collect();
    assert_eq!(ranked, vec![80.0, 120.0]);

    let chosen = scan.select_automatic().unwrap();
    assert_eq!(chosen.node.host, "fast.example");

    let existing = PersistedConfig::load(&env_file).await;
    persist::write(&persist::apply(&existing, &chosen), &env_file)
        .await
        .unwrap();
    let first = std::fs::read_to_string(&env_file).unwrap();

    let expected = "\
DISCORD_TOKEN=MTIzNDU2Nzg5.abc.def
HOST=fast.example
PORT=443
PASSWORD=fast.example-pw
SECURE=false
# Rusty music bot
PREFIX=!
OWNER_ID=123456789
";
    assert_eq!(first, expected);

    // A second run with the same pick changes nothing.
    let reloaded = PersistedConfig::load(&env_file).await;
    persist::write(&persist::apply(&reloaded, &chosen), &env_file)
        .await
        .unwrap();
    assert_eq!(std::fs::read_to_string(&env_file).unwrap(), first);
}

#[tokio::test]
async fn test_interactive_out_of_range_reprompts() {
    test_utils::init();
    let nodes: Vec<_> = (1..=6).map(|i| node(&format!("n{}", i), 2333)).collect();
    let outcomes: Vec<_> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.host.as_str(), Ok(10.0 * (i + 1) as f64)))
        .collect();
    let probe = scripted_probe(&outcomes);
    let scan = scan(&nodes, &probe, &settings()).await.unwrap();

    let mut input = "9\n\n".as_bytes();
    let mut output = Vec::new();
    let chosen = scan
        .select(SelectionMode::interactive(), &mut input, &mut output)
        .await
        .unwrap();

    assert_eq!(chosen.node.host, "n1");
    let shown = String::from_utf8(output).unwrap();
    assert_eq!(shown.matches("Choose a node [1-5]").count(), 2);
}

#[tokio::test]
async fn test_http_strategy_end_to_end() {
    test_utils::init();

    let fast = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(ResponseTemplate::new(200).set_body_string("4.0.8"))
        .mount(&fast)
        .await;

    let slow = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("4.0.7")
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&slow)
        .await;

    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed_port = closed.local_addr().unwrap().port();
    drop(closed);

    let address = |server: &MockServer| server.address().port();
    let list = format!(
        r#"
        {{ name: "Slow", host: "127.0.0.1", port: {}, password: "pw", secure: false }}
        {{ name: "Closed", host: "127.0.0.1", port: {}, password: "pw", secure: false }}
        {{ name: "Fast", host: "127.0.0.1", port: {}, password: "pw", secure: false }}
        "#,
        address(&slow),
        closed_port,
        address(&fast)
    );

    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("servers.txt");
    std::fs::write(&source, list).unwrap();
    let env_file = dir.path().join(".env");

    let client = Client::new();
    let nodes = server_list::load(source.to_str().unwrap(), &client)
        .await
        .unwrap();
    let probe = build_probe(ProbeStrategy::Http, probe_client().unwrap());
    let scan = scan(&nodes, probe.as_ref(), &settings()).await.unwrap();

    let reachable: Vec<_> = scan.results.iter().map(|r| r.is_reachable()).collect();
    assert_eq!(reachable, vec![true, false, true]);
    assert_eq!(scan.results[1].error_kind(), ErrorKind::ConnectionRefused);

    let chosen = scan.select_automatic().unwrap();
    assert_eq!(chosen.node.name, "Fast");
    assert_eq!(chosen.reported_version(), Some("4.0.8"));

    persist::write(
        &persist::apply(&PersistedConfig::load(&env_file).await, &chosen),
        &env_file,
    )
    .await
    .unwrap();
    let written = PersistedConfig::load(&env_file).await;
    assert_eq!(
        written.current_node(),
        Some(("127.0.0.1".to_string(), fast.address().port()))
    );
    assert_eq!(written.get("PASSWORD").as_deref(), Some("pw"));
    assert_eq!(written.get("SECURE").as_deref(), Some("false"));
}

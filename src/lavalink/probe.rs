//! Measures how quickly a single Lavalink node answers.
//!
//! A [`NodeProbe`] takes one sample; [`measure`] wraps it with the timeout and
//! multi-sample averaging so every strategy behaves the same way. Node stats
//! are fetched afterwards under their own timeout and never affect
//! reachability.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Url};
use std::error::Error as StdError;
use std::io;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::{TcpStream, lookup_host};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::{ErrorKind, NodeDescriptor, NodeStats, ProbeResult};
use crate::config::{ProbeStrategy, ScanSettings};

/// One successful measurement of a node.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    pub latency_ms: f64,
    pub reported_version: Option<String>,
}

impl Sample {
    pub fn latency(latency_ms: f64) -> Self {
        Self {
            latency_ms,
            reported_version: None,
        }
    }
}

/// A way of taking one latency sample from a node.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NodeProbe: Send + Sync {
    async fn sample(&self, node: &NodeDescriptor) -> Result<Sample, ErrorKind>;

    /// Runtime stats of a node that already answered. Best effort.
    async fn stats(&self, _node: &NodeDescriptor) -> Option<NodeStats> {
        None
    }
}

/// HTTP client for [`HttpProbe`]. Idle connections are never kept, so every
/// sample pays for its own connect and TLS handshake, the same way a
/// [`TcpProbe`] sample pays for its connect.
pub fn probe_client() -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(concat!("lavapick/", env!("CARGO_PKG_VERSION")))
        .pool_max_idle_per_host(0)
        .build()
}

/// Builds the probe for the requested strategy.
pub fn build_probe(strategy: ProbeStrategy, client: Client) -> Box<dyn NodeProbe> {
    match strategy {
        ProbeStrategy::Tcp => Box::new(TcpProbe),
        ProbeStrategy::Http => Box::new(HttpProbe::new(client)),
    }
}

/// Probes `node` according to `settings`.
///
/// Every sample is bounded by `settings.timeout`. With more than one sample,
/// failed samples are discarded and the mean of the rest is reported; if none
/// succeed, the node is unreachable with the last failure's kind. Stats of a
/// reachable node get one more `settings.timeout` of their own.
pub async fn measure(
    probe: &dyn NodeProbe,
    node: &NodeDescriptor,
    settings: &ScanSettings,
) -> ProbeResult {
    let samples = settings.samples.max(1);
    let mut latencies = Vec::with_capacity(samples as usize);
    let mut last_success: Option<Sample> = None;
    let mut last_error = ErrorKind::Unknown;

    for attempt in 0..samples {
        if attempt > 0 {
            sleep(settings.sample_pause).await;
        }

        match timeout(settings.timeout, probe.sample(node)).await {
            Ok(Ok(sample)) => {
                debug!(
                    "{} sample {}/{}: {:.2} ms",
                    node.address(),
                    attempt + 1,
                    samples,
                    sample.latency_ms
                );
                latencies.push(sample.latency_ms);
                last_success = Some(sample);
            }
            Ok(Err(kind)) => {
                debug!("{} sample {}/{} failed: {}", node.address(), attempt + 1, samples, kind);
                last_error = kind;
            }
            Err(_) => {
                debug!(
                    "{} sample {}/{} timed out after {:?}",
                    node.address(),
                    attempt + 1,
                    samples,
                    settings.timeout
                );
                last_error = ErrorKind::Timeout;
            }
        }
    }

    match last_success {
        Some(sample) => {
            let mean = latencies.iter().sum::<f64>() / latencies.len() as f64;
            let stats = match timeout(settings.timeout, probe.stats(node)).await {
                Ok(stats) => stats,
                Err(_) => {
                    debug!("{} stats timed out after {:?}", node.address(), settings.timeout);
                    None
                }
            };
            ProbeResult::reachable(node.clone(), round_ms(mean), sample.reported_version, stats)
        }
        None => ProbeResult::unreachable(node.clone(), last_error),
    }
}

fn round_ms(ms: f64) -> f64 {
    (ms * 100.0).round() / 100.0
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Times a plain TCP connect. Name resolution happens before the clock starts.
pub struct TcpProbe;

#[async_trait]
impl NodeProbe for TcpProbe {
    async fn sample(&self, node: &NodeDescriptor) -> Result<Sample, ErrorKind> {
        let addrs: Vec<SocketAddr> = lookup_host((node.host.as_str(), node.port))
            .await
            .map_err(|e| {
                debug!("Failed to resolve {}: {}", node.host, e);
                ErrorKind::DnsFailure
            })?
            .collect();
        if addrs.is_empty() {
            return Err(ErrorKind::DnsFailure);
        }

        connect_any(&addrs).await.map(Sample::latency)
    }
}

/// Connects to each address in turn and times the first connect that succeeds.
async fn connect_any(addrs: &[SocketAddr]) -> Result<f64, ErrorKind> {
    let mut last_error = ErrorKind::Unknown;
    for addr in addrs {
        let start = Instant::now();
        match TcpStream::connect(addr).await {
            Ok(_stream) => return Ok(elapsed_ms(start)),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_error = classify_io(&e);
            }
        }
    }
    Err(last_error)
}

/// Times an authorized `GET /version` and collects `/v4/stats` on success.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NodeProbe for HttpProbe {
    async fn sample(&self, node: &NodeDescriptor) -> Result<Sample, ErrorKind> {
        let version_url = base_url(node)?
            .join("version")
            .map_err(|_| ErrorKind::ProtocolError)?;

        let start = Instant::now();
        let response = self
            .client
            .get(version_url)
            .header(AUTHORIZATION, &node.password)
            .send()
            .await
            .map_err(|e| classify_reqwest(&e))?;
        let latency_ms = elapsed_ms(start);

        let status = response.status();
        if !status.is_success() {
            debug!("{} answered /version with {}", node.address(), status);
            return Err(ErrorKind::ProtocolError);
        }

        let reported_version = response
            .text()
            .await
            .ok()
            .map(|body| body.trim().to_string())
            .filter(|body| !body.is_empty());

        Ok(Sample {
            latency_ms,
            reported_version,
        })
    }

    async fn stats(&self, node: &NodeDescriptor) -> Option<NodeStats> {
        let url = base_url(node).ok()?.join("v4/stats").ok()?;
        let result = async {
            self.client
                .get(url)
                .header(AUTHORIZATION, &node.password)
                .send()
                .await?
                .error_for_status()?
                .json::<NodeStats>()
                .await
        }
        .await;

        match result {
            Ok(stats) => Some(stats),
            Err(e) => {
                debug!("No stats from {}: {}", node.address(), e);
                None
            }
        }
    }
}

/// `{scheme}://{host}:{port}/` for a node.
fn base_url(node: &NodeDescriptor) -> Result<Url, ErrorKind> {
    let host = if node.host.contains(':') && !node.host.starts_with('[') {
        format!("[{}]", node.host)
    } else {
        node.host.clone()
    };
    Url::parse(&format!("{}://{}:{}/", node.scheme(), host, node.port)).map_err(|e| {
        warn!("Invalid address for node {}: {}", node.name, e);
        ErrorKind::ProtocolError
    })
}

fn classify_io(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::ConnectionRefused => ErrorKind::ConnectionRefused,
        io::ErrorKind::TimedOut => ErrorKind::Timeout,
        _ => ErrorKind::Unknown,
    }
}

/// Maps a reqwest failure onto an [`ErrorKind`] by walking its source chain.
fn classify_reqwest(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        return ErrorKind::Timeout;
    }

    let mut source = err.source();
    while let Some(inner) = source {
        if let Some(io_err) = inner.downcast_ref::<io::Error>() {
            match classify_io(io_err) {
                ErrorKind::Unknown => {}
                kind => return kind,
            }
        }
        let text = inner.to_string().to_ascii_lowercase();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return ErrorKind::DnsFailure;
        }
        if text.contains("certificate") || text.contains("tls") || text.contains("handshake") {
            return ErrorKind::ProtocolError;
        }
        source = inner.source();
    }

    if err.is_status() || err.is_decode() || err.is_body() || err.is_builder() || err.is_redirect()
    {
        ErrorKind::ProtocolError
    } else {
        ErrorKind::Unknown
    }
}

use clap::Parser;
use dotenv::dotenv;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::io::BufReader;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use lavapick::Error;
use lavapick::config::{self, ProbeStrategy, ScanSettings};
use lavapick::lavalink::persist::{self, PersistedConfig};
use lavapick::lavalink::policy::{self, SelectionMode};
use lavapick::lavalink::probe::{build_probe, probe_client};
use lavapick::lavalink::report::{format_choices, format_summary};
use lavapick::lavalink::{SelectionError, server_list};
use lavapick::utils::process_manager::{self, ProcessManager};

/// Probe a list of Lavalink nodes and point the music bot at the fastest one
#[derive(Parser, Debug)]
#[command(name = "lavapick", version, about)]
struct Cli {
    /// Server list to read nodes from (file path or http(s) URL)
    #[arg(long, env = "LAVALINK_SERVERS", default_value = "lavalink-servers.txt")]
    servers: String,

    /// The bot's env file to update
    #[arg(long, env = "LAVAPICK_ENV_FILE", default_value = ".env")]
    env_file: PathBuf,

    /// Pick from the fastest nodes interactively instead of taking the best one
    #[arg(short, long)]
    choose: bool,

    /// Probe and select, but don't write the env file or restart the bot
    #[arg(long)]
    dry_run: bool,

    /// Only print the ranking; never writes anything
    #[arg(long, conflicts_with = "choose")]
    compare: bool,

    /// How to measure node latency
    #[arg(long, value_enum, env = "LAVAPICK_STRATEGY", default_value_t = ProbeStrategy::Http)]
    strategy: ProbeStrategy,

    /// Per-sample timeout in milliseconds
    #[arg(long, default_value_t = config::DEFAULT_TIMEOUT.as_millis() as u64)]
    timeout_ms: u64,

    /// Samples per node; failed samples are discarded and the rest averaged
    #[arg(long, default_value_t = config::DEFAULT_SAMPLES)]
    samples: u32,

    /// Nodes probed concurrently per batch
    #[arg(long, default_value_t = config::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Number of nodes offered with --choose
    #[arg(long, default_value_t = config::DEFAULT_TOP)]
    top: usize,

    /// PM2 app to restart after the env file was written
    #[arg(long, env = "LAVAPICK_RESTART")]
    restart: Option<String>,

    /// Process manager binary used for --restart
    #[arg(long, env = "LAVAPICK_PM2", default_value = process_manager::DEFAULT_PROGRAM)]
    pm2_bin: String,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load the environment first so it can supply flag defaults
    let env_loaded = dotenv();
    let cli = Cli::parse();

    let default_filter = match cli.verbose {
        0 => "lavapick=info,warn",
        1 => "lavapick=debug,warn",
        _ => "lavapick=trace,info",
    };
    let filter = if cli.verbose == 0 {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
    } else {
        EnvFilter::new(default_filter)
    };
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose > 0)
        .with_line_number(cli.verbose > 1)
        .with_file(cli.verbose > 1)
        .init();

    if let Ok(path) = env_loaded {
        debug!("Loaded environment from {}", path.display());
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Error> {
    let settings = ScanSettings {
        batch_size: cli.batch_size,
        timeout: Duration::from_millis(cli.timeout_ms),
        samples: cli.samples,
        ..ScanSettings::default()
    };

    let http = reqwest::Client::builder()
        .user_agent(concat!("lavapick/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let nodes = server_list::load(&cli.servers, &http).await?;
    let probe = build_probe(cli.strategy, probe_client()?);
    let scan = policy::scan(&nodes, probe.as_ref(), &settings).await?;

    let existing = PersistedConfig::load(&cli.env_file).await;
    let current = existing.current_node();
    println!(
        "{}",
        format_summary(
            &scan.results,
            current.as_ref().map(|(host, port)| (host.as_str(), *port))
        )
    );

    if cli.compare {
        if scan.ranked.is_empty() {
            return Err(SelectionError::NoReachableNodes(scan.results.len()).into());
        }
        let ranking: Vec<_> = scan.ranked.iter().cloned().collect();
        println!("{}", format_choices(&ranking));
        return Ok(());
    }

    let mode = if cli.choose {
        SelectionMode::Interactive { top: cli.top }
    } else {
        SelectionMode::Automatic
    };
    let mut input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();
    let chosen = scan.select(mode, &mut input, &mut output).await?;

    if cli.dry_run {
        info!(
            "Dry run: {} would now point at {} ({})",
            cli.env_file.display(),
            chosen.node.address(),
            chosen.node.name
        );
        return Ok(());
    }

    let updated = persist::apply(&existing, &chosen);
    persist::write(&updated, &cli.env_file).await?;

    if let Some(app) = cli.restart.as_deref() {
        ProcessManager::new(cli.pm2_bin.as_str()).restart(app).await?;
    }

    Ok(())
}

//! sockpool CLI
//!
//! Talks to a container daemon over its local socket through the pool.
//!
//! ```text
//!   sockpool probe ──┐
//!   sockpool get ────┼──▶ Client ──▶ Pool ──▶ Connection ──▶ daemon socket
//!                    │                 ▲
//!                    │                 └── IdleReaper (optional)
//!   sockpool check-config ──▶ config loader + validation
//! ```
//!
//! `probe` reproduces the idle-timeout failure: it warms the pool with
//! concurrent requests, waits longer than the daemon's idle timeout, and
//! sends one more request. Exit code 1 means a request failed or came back
//! with a non-2xx status.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};

use sockpool::config::{lint_config, load_config, validate_config, ConfigError, DEFAULT_ENDPOINT};
use sockpool::lifecycle::{join_task, wait_for_ctrl_c, Shutdown};
use sockpool::observability::{init_logging, metrics};
use sockpool::probe::{run_idle_probe, ProbePlan};
use sockpool::{Client, SockpoolConfig};

#[derive(Parser)]
#[command(name = "sockpool")]
#[command(about = "Pooled HTTP client for container daemon sockets", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Daemon endpoint (unix:///path, tcp://host:port). Falls back to
    /// DOCKER_URI, then DOCKER_HOST.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Maximum live connections.
    #[arg(long, global = true)]
    max_connections: Option<usize>,

    /// Validate idle connections inactive at least this long.
    #[arg(long, global = true)]
    validate_after_ms: Option<u64>,

    /// Evict idle connections inactive at least this long.
    #[arg(long, global = true)]
    keep_alive_ms: Option<u64>,

    /// Retry stale-connection failures of idempotent requests once.
    #[arg(long, global = true)]
    retry_stale: bool,

    /// Emit JSON logs.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the idle-timeout scenario and print a JSON report
    Probe {
        #[arg(long, default_value_t = 10)]
        requests: usize,
        #[arg(long, default_value_t = 11_000)]
        delay_ms: u64,
        #[arg(long, default_value = "/version")]
        path: String,
    },
    /// Send one GET and print status and body
    Get { path: String },
    /// Load and validate the configuration
    CheckConfig,
}

impl Cli {
    /// File configuration with command-line overrides applied.
    fn resolve_config(&self) -> Result<SockpoolConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => SockpoolConfig::default(),
        };

        let from_env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        if let Some(endpoint) = pick_endpoint(
            self.endpoint.clone(),
            from_env("DOCKER_URI"),
            from_env("DOCKER_HOST"),
        ) {
            config.client.endpoint = endpoint;
        }
        if self.max_connections.is_some() {
            config.pool.max_connections = self.max_connections;
        }
        if self.validate_after_ms.is_some() {
            config.pool.validate_after_inactivity_ms = self.validate_after_ms;
        }
        if self.keep_alive_ms.is_some() {
            config.pool.keep_alive_timeout_ms = self.keep_alive_ms;
        }
        if self.retry_stale {
            config.retries.enabled = true;
        }
        if self.json_logs {
            config.observability.json_logs = true;
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

/// Endpoint override: the flag, then DOCKER_URI, then DOCKER_HOST.
fn pick_endpoint(
    flag: Option<String>,
    docker_uri: Option<String>,
    docker_host: Option<String>,
) -> Option<String> {
    flag.or(docker_uri).or(docker_host)
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    init_logging(&config.observability);
    tracing::info!(
        endpoint = %config.client.endpoint,
        default_endpoint = config.client.endpoint == DEFAULT_ENDPOINT,
        max_connections = ?config.pool.max_connections,
        validate_after_inactivity_ms = ?config.pool.validate_after_inactivity_ms,
        keep_alive_timeout_ms = ?config.pool.keep_alive_timeout_ms,
        retries = config.retries.enabled,
        "sockpool v{} starting",
        env!("CARGO_PKG_VERSION")
    );
    for warning in lint_config(&config) {
        tracing::warn!("{warning}");
    }

    if let Commands::CheckConfig = cli.command {
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(ExitCode::SUCCESS);
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let client = Client::new(&config)?;
    let shutdown = Shutdown::new();
    let reaper = config
        .pool
        .reap_interval()
        .map(|interval| client.spawn_reaper(interval, shutdown.subscribe()));

    let code = tokio::select! {
        code = run(&client, cli.command) => code?,
        _ = wait_for_ctrl_c() => ExitCode::from(130),
    };

    shutdown.trigger();
    if let Some(reaper) = reaper {
        join_task("idle reaper", reaper).await;
    }
    client.close();
    tracing::info!("Shutdown complete");
    Ok(code)
}

async fn run(client: &Client, command: Commands) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match command {
        Commands::Probe {
            requests,
            delay_ms,
            path,
        } => {
            let plan = ProbePlan {
                requests,
                delay: Duration::from_millis(delay_ms),
                path,
            };
            let report = run_idle_probe(client, &plan).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.succeeded() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::Get { path } => {
            let response = client.get(&path).await?;
            let status = response.status();
            let body = response.text().await?;
            eprintln!("{status}");
            println!("{body}");
            Ok(if status.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Commands::CheckConfig => Ok(ExitCode::SUCCESS),
    }
}

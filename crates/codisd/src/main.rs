//! codisd: the Codis exporter daemon.
//!
//! Polls one or more Codis dashboards on every scrape and serves what they
//! report about the cluster in the Prometheus text format.
//!
//! # Usage
//!
//! ```text
//! codisd --codis.addr http://dashboard:18080/topom --listen-address 0.0.0.0:9199
//! codisd --config /etc/codisd.toml
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::EnvFilter;

use codis_core::ExporterConfig;
use codis_metrics::CodisCollector;

const DEFAULT_FILTER: &str = "info,codisd=debug,codis=debug";

#[derive(Parser, Debug)]
#[command(name = "codisd", about = "Prometheus exporter for Codis clusters")]
struct Cli {
    /// TOML configuration file. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Codis dashboard stats URI. Repeat or comma-separate for several.
    #[arg(long = "codis.addr", value_delimiter = ',')]
    codis_addr: Vec<String>,

    /// Prefix for every exported metric name.
    #[arg(long)]
    namespace: Option<String>,

    /// Address to serve metrics on.
    #[arg(long)]
    listen_address: Option<SocketAddr>,

    /// Path under which metrics are exposed.
    #[arg(long)]
    metrics_path: Option<String>,

    /// Per-request timeout against a dashboard, e.g. "10s" or "500ms".
    #[arg(long)]
    request_timeout: Option<String>,

    #[arg(long, value_enum, default_value = "text")]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = resolve_config(cli)?;
    run(config).await
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

/// Defaults, then the config file, then command-line flags.
fn resolve_config(cli: Cli) -> anyhow::Result<ExporterConfig> {
    let mut config = match &cli.config {
        Some(path) => ExporterConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ExporterConfig::default(),
    };

    let endpoints: Vec<String> = cli
        .codis_addr
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect();
    if !endpoints.is_empty() {
        config.endpoints = endpoints;
    }
    if let Some(namespace) = cli.namespace {
        config.namespace = namespace;
    }
    if let Some(addr) = cli.listen_address {
        config.listen_address = addr;
    }
    if let Some(path) = cli.metrics_path {
        config.metrics_path = path;
    }
    if let Some(timeout) = cli.request_timeout {
        config.request_timeout = timeout;
    }

    config.validate()?;
    Ok(config)
}

async fn run(config: ExporterConfig) -> anyhow::Result<()> {
    info!(
        endpoints = ?config.endpoints,
        namespace = %config.namespace,
        metrics_path = %config.metrics_path,
        request_timeout = %config.request_timeout,
        "starting codis exporter"
    );

    let collector = Arc::new(CodisCollector::from_config(&config)?);
    let router = codis_api::build_router(collector, &config.metrics_path);

    let listener = tokio::net::TcpListener::bind(config.listen_address)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_address))?;
    info!(addr = %config.listen_address, "metrics server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                // Without a signal handler the server runs until killed.
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("codis exporter stopped");
    Ok(())
}

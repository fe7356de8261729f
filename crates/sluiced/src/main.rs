//! Sluice Daemon (sluiced)
//!
//! Serves a directory tree over the sluice file-transfer protocol.
//!
//! # Usage
//!
//! ```bash
//! # Serve the current directory on port 2121
//! sluiced
//!
//! # Custom port and root
//! sluiced 7021 --root /srv/files
//!
//! # Tolerate slow peers and limit concurrent sessions
//! sluiced --read-timeout-ms 5000 --max-sessions 16
//!
//! # With configuration file and Prometheus endpoint
//! sluiced --config /etc/sluice/sluice.toml --metrics-port 9121
//! ```

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use sluice_core::Workspace;
use sluice_protocol::ScanMode;
use sluice_transport::{Metrics, MetricsServer, TcpServer};

use crate::config::{FileConfig, Overrides, Settings};

/// Sluice Daemon - minimal single-stream file-transfer server
#[derive(Parser, Debug)]
#[command(name = "sluiced")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TCP port to listen on [default: 2121]
    #[arg(env = "SLUICE_PORT")]
    port: Option<u16>,

    /// Bind address [default: 0.0.0.0]
    #[arg(long, env = "SLUICE_BIND")]
    bind: Option<String>,

    /// Directory every session starts in [default: current directory]
    #[arg(long, env = "SLUICE_ROOT")]
    root: Option<PathBuf>,

    /// Deadline for each payload read in milliseconds [default: 1000]
    #[arg(long, env = "SLUICE_READ_TIMEOUT_MS")]
    read_timeout_ms: Option<u64>,

    /// Sentinel scan: "rolling" or "per-chunk" [default: rolling]
    #[arg(long, env = "SLUICE_SCAN_MODE")]
    scan_mode: Option<ScanMode>,

    /// Maximum concurrent sessions (0 = unlimited)
    #[arg(long, env = "SLUICE_MAX_SESSIONS")]
    max_sessions: Option<usize>,

    /// Configuration file path
    #[arg(short, long, env = "SLUICE_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long, env = "SLUICE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Serve Prometheus metrics on this port
    #[arg(long, env = "SLUICE_METRICS_PORT")]
    metrics_port: Option<u16>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            port: self.port,
            bind: self.bind.clone(),
            root: self.root.clone(),
            read_timeout_ms: self.read_timeout_ms,
            scan_mode: self.scan_mode,
            max_sessions: self.max_sessions,
            log_level: self.log_level.clone(),
            metrics_port: self.metrics_port,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(args.overrides(), file)?;

    // Initialize logging
    let level = match settings.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    print_banner();

    // A bad root is a startup failure, not a per-session one
    let root = Workspace::new(&settings.server.root)
        .with_context(|| format!("Cannot serve {}", settings.server.root.display()))?;

    info!(
        addr = %settings.server.addr,
        root = %root.cwd().display(),
        read_timeout_ms = settings.server.session.read_timeout.as_millis() as u64,
        scan_mode = %settings.server.session.scan_mode,
        max_sessions = settings.server.max_sessions.unwrap_or(0),
        "Starting sluice daemon"
    );

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .with_context(|| format!("Failed to bind {}", settings.server.addr))?;
    info!(addr = %listener.local_addr()?, "Listening");

    let mut server = TcpServer::new(settings.server);

    if let Some(addr) = settings.metrics_addr {
        let metrics = Arc::new(Metrics::new().context("Failed to register metrics")?);
        server = server.with_metrics(metrics.clone());

        let metrics_server = MetricsServer::new(metrics, addr);
        tokio::spawn(async move {
            if let Err(e) = metrics_server.run().await {
                tracing::error!(error = %e, "Metrics server error");
            }
        });
    }

    tokio::select! {
        result = server.serve(listener) => {
            result.map_err(|e| anyhow::anyhow!(e)).context("Server stopped")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutting down...");
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  ┌─┐┬  ┬ ┬┬┌─┐┌─┐
  └─┐│  │ ││├┤ ├┤
  └─┘┴─┘└─┘┴└─┘└─┘
  Single-stream file transfer
  Version {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}

//! Prometheus metrics for sluice
//!
//! Exposed in Prometheus text format over a minimal HTTP endpoint.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{error, info};

/// Sluice metrics collector
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // Session metrics
    pub sessions_total: IntCounter,
    pub sessions_active: IntGauge,
    pub session_errors: IntCounterVec,

    // Command metrics
    pub commands_total: IntCounterVec,
    pub command_failures: IntCounterVec,
    pub command_duration_seconds: HistogramVec,

    // Payload metrics
    pub bytes_received: IntCounter,
    pub bytes_sent: IntCounter,
}

impl Metrics {
    /// Create a collector with every metric registered
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let sessions_total = IntCounter::new("sluice_sessions_total", "Total sessions accepted")?;
        let sessions_active = IntGauge::new("sluice_sessions_active", "Sessions currently open")?;
        let session_errors = IntCounterVec::new(
            Opts::new("sluice_session_errors_total", "Sessions ended by an error"),
            &["kind"],
        )?;

        let commands_total = IntCounterVec::new(
            Opts::new("sluice_commands_total", "Commands processed"),
            &["command"],
        )?;
        let command_failures = IntCounterVec::new(
            Opts::new("sluice_command_failures_total", "Commands answered with a failure reply"),
            &["command"],
        )?;
        let command_duration_seconds = HistogramVec::new(
            HistogramOpts::new("sluice_command_duration_seconds", "Command processing duration")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["command"],
        )?;

        let bytes_received = IntCounter::new(
            "sluice_bytes_received_total",
            "Payload bytes received from clients",
        )?;
        let bytes_sent = IntCounter::new("sluice_bytes_sent_total", "Payload bytes sent to clients")?;

        registry.register(Box::new(sessions_total.clone()))?;
        registry.register(Box::new(sessions_active.clone()))?;
        registry.register(Box::new(session_errors.clone()))?;
        registry.register(Box::new(commands_total.clone()))?;
        registry.register(Box::new(command_failures.clone()))?;
        registry.register(Box::new(command_duration_seconds.clone()))?;
        registry.register(Box::new(bytes_received.clone()))?;
        registry.register(Box::new(bytes_sent.clone()))?;

        Ok(Self {
            registry,
            sessions_total,
            sessions_active,
            session_errors,
            commands_total,
            command_failures,
            command_duration_seconds,
            bytes_received,
            bytes_sent,
        })
    }

    pub fn record_session_start(&self) {
        self.sessions_total.inc();
        self.sessions_active.inc();
    }

    /// `error` is the label of the error that ended the session, if any
    pub fn record_session_end(&self, error: Option<&str>) {
        self.sessions_active.dec();
        if let Some(kind) = error {
            self.session_errors.with_label_values(&[kind]).inc();
        }
    }

    pub fn record_command(&self, command: &str, duration_secs: f64) {
        self.commands_total.with_label_values(&[command]).inc();
        self.command_duration_seconds
            .with_label_values(&[command])
            .observe(duration_secs);
    }

    pub fn record_failure(&self, command: &str) {
        self.command_failures.with_label_values(&[command]).inc();
    }

    pub fn record_bytes(&self, received: u64, sent: u64) {
        self.bytes_received.inc_by(received);
        self.bytes_sent.inc_by(sent);
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            error!(error = %e, "Failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

/// HTTP server for the metrics endpoint
pub struct MetricsServer {
    metrics: Arc<Metrics>,
    addr: SocketAddr,
}

impl MetricsServer {
    pub fn new(metrics: Arc<Metrics>, addr: SocketAddr) -> Self {
        Self { metrics, addr }
    }

    /// Run the metrics HTTP server
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "Metrics server listening on http://{}/metrics", self.addr);

        loop {
            match listener.accept().await {
                Ok((mut stream, _)) => {
                    let metrics = self.metrics.clone();

                    tokio::spawn(async move {
                        let mut buf = [0u8; 1024];
                        let n = match stream.read(&mut buf).await {
                            Ok(n) if n > 0 => n,
                            _ => return,
                        };
                        let request = String::from_utf8_lossy(&buf[..n]);
                        let response = route(&request, &metrics);
                        let _ = stream.write_all(response.as_bytes()).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept metrics connection");
                }
            }
        }
    }
}

fn route(request: &str, metrics: &Metrics) -> String {
    if request.starts_with("GET /metrics") || request.starts_with("GET / ") {
        let body = metrics.export();
        format!(
            "HTTP/1.1 200 OK\r\n\
             Content-Type: text/plain; version=0.0.4; charset=utf-8\r\n\
             Content-Length: {}\r\n\
             \r\n\
             {}",
            body.len(),
            body
        )
    } else if request.starts_with("GET /health") {
        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\n\r\nOK".to_string()
    } else {
        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n".to_string()
    }
}

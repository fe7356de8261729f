//! Sluice Transport Layer
//!
//! Drives the protocol over a byte stream:
//! - Chunked reads with a per-read deadline
//! - File transfer and directory listing payloads
//! - Command dispatch and the per-connection session loop
//! - The client side of every command
//! - Prometheus metrics (optional feature)

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod listing;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod stream;
pub mod tcp;
pub mod transfer;

pub use client::Client;
pub use config::{ClientConfig, ServerConfig, SessionConfig, DEFAULT_PORT};
pub use error::{ClientError, ClientResult, SessionError, SessionResult};
pub use handler::{Flow, SessionHandler, SessionState};
#[cfg(feature = "metrics")]
pub use metrics::{Metrics, MetricsServer};
pub use stream::ChunkStream;
pub use tcp::TcpServer;
pub use transfer::{TransferOutcome, TransferReport};

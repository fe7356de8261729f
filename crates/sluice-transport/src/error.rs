//! Transport error types

use sluice_protocol::ProtocolError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that end a session
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {} ms waiting for peer", .0.as_millis())]
    Timeout(Duration),

    #[error("Peer closed the connection")]
    PeerClosed,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl SessionError {
    /// Short label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            SessionError::Io(_) => "io",
            SessionError::Timeout(_) => "timeout",
            SessionError::PeerClosed => "peer_closed",
            SessionError::Protocol(_) => "protocol",
        }
    }
}

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

/// Errors reported by [`crate::Client`]
#[derive(Error, Debug)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection to {0} timed out")]
    ConnectTimeout(String),

    /// The server refused the operation; the session is still usable
    #[error("{0}")]
    Remote(String),

    /// A local file could not be used; the session is still usable
    #[error("{}: {source}", path.display())]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ClientError {
    /// Whether the session survived this error
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ClientError::Remote(_) | ClientError::Local { .. })
    }
}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        ClientError::Session(SessionError::Protocol(e))
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

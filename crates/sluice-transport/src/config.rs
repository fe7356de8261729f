//! Server, session and client settings

use sluice_protocol::ScanMode;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default TCP port for `sluiced`
pub const DEFAULT_PORT: u16 = 2121;

/// Default deadline for a single payload or reply read
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Per-session protocol settings
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Deadline for each read while a payload or reply is expected
    pub read_timeout: Duration,
    /// How payload chunks are searched for their sentinel
    pub scan_mode: ScanMode,
    /// First line sent to every client
    pub greeting: String,
}

impl SessionConfig {
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            scan_mode: ScanMode::default(),
            greeting: "Welcome to sluice server!".to_string(),
        }
    }
}

/// Listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    /// Starting directory of every session
    pub root: PathBuf,
    /// Concurrent session limit; `None` is unlimited
    pub max_sessions: Option<usize>,
    pub session: SessionConfig,
}

impl ServerConfig {
    pub fn new(addr: SocketAddr, root: impl Into<PathBuf>) -> Self {
        Self {
            addr,
            root: root.into(),
            max_sessions: None,
            session: SessionConfig::default(),
        }
    }

    pub fn with_max_sessions(mut self, max_sessions: Option<usize>) -> Self {
        self.max_sessions = max_sessions.filter(|&n| n > 0);
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }
}

/// Client settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub read_timeout: Duration,
    pub connect_timeout: Duration,
    pub scan_mode: ScanMode,
}

impl ClientConfig {
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_scan_mode(mut self, scan_mode: ScanMode) -> Self {
        self.scan_mode = scan_mode;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            read_timeout: DEFAULT_READ_TIMEOUT,
            connect_timeout: Duration::from_secs(5),
            scan_mode: ScanMode::default(),
        }
    }
}

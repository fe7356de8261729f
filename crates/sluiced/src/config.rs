//! Daemon settings: defaults, TOML file, command line

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use sluice_protocol::ScanMode;
use sluice_transport::{ServerConfig, SessionConfig, DEFAULT_PORT};

/// Values read from `--config`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub root: Option<PathBuf>,
    pub read_timeout_ms: Option<u64>,
    pub scan_mode: Option<ScanMode>,
    pub max_sessions: Option<usize>,
    pub greeting: Option<String>,
    pub log_level: Option<String>,
    pub metrics_port: Option<u16>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }
}

/// Settings given on the command line or through the environment
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub port: Option<u16>,
    pub bind: Option<String>,
    pub root: Option<PathBuf>,
    pub read_timeout_ms: Option<u64>,
    pub scan_mode: Option<ScanMode>,
    pub max_sessions: Option<usize>,
    pub log_level: Option<String>,
    pub metrics_port: Option<u16>,
}

/// Fully resolved daemon settings
#[derive(Debug)]
pub struct Settings {
    pub server: ServerConfig,
    pub log_level: String,
    pub metrics_addr: Option<SocketAddr>,
}

impl Settings {
    /// Merge with precedence command line > file > defaults
    pub fn resolve(cli: Overrides, file: FileConfig) -> Result<Self> {
        let port = cli.port.or(file.port).unwrap_or(DEFAULT_PORT);
        let bind = cli.bind.or(file.bind).unwrap_or_else(|| "0.0.0.0".to_string());
        let ip: IpAddr = bind
            .parse()
            .with_context(|| format!("Invalid bind address {}", bind))?;
        let addr = SocketAddr::new(ip, port);

        let root = match cli.root.or(file.root) {
            Some(root) => root,
            None => std::env::current_dir().context("Cannot determine current directory")?,
        };

        let mut session = SessionConfig::default();
        if let Some(ms) = cli.read_timeout_ms.or(file.read_timeout_ms) {
            anyhow::ensure!(ms > 0, "read timeout must be greater than zero");
            session = session.with_read_timeout(Duration::from_millis(ms));
        }
        if let Some(mode) = cli.scan_mode.or(file.scan_mode) {
            session = session.with_scan_mode(mode);
        }
        if let Some(greeting) = file.greeting {
            anyhow::ensure!(
                !greeting.contains(['\r', '\n']),
                "greeting must be a single line"
            );
            session = session.with_greeting(greeting);
        }

        let server = ServerConfig::new(addr, root)
            .with_max_sessions(cli.max_sessions.or(file.max_sessions))
            .with_session(session);

        let metrics_addr = cli
            .metrics_port
            .or(file.metrics_port)
            .map(|p| SocketAddr::new(addr.ip(), p));

        Ok(Self {
            server,
            log_level: cli.log_level.or(file.log_level).unwrap_or_else(|| "info".to_string()),
            metrics_addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(Overrides::default(), FileConfig::default()).unwrap();
        assert_eq!(settings.server.addr.port(), DEFAULT_PORT);
        assert_eq!(settings.server.session.read_timeout, Duration::from_millis(1000));
        assert_eq!(settings.server.session.scan_mode, ScanMode::Rolling);
        assert_eq!(settings.server.max_sessions, None);
        assert_eq!(settings.log_level, "info");
        assert!(settings.metrics_addr.is_none());
    }

    #[test]
    fn test_file_values() {
        let file: FileConfig = toml::from_str(
            r#"
            port = 7021
            bind = "127.0.0.1"
            root = "/srv/files"
            read_timeout_ms = 250
            scan_mode = "per-chunk"
            max_sessions = 4
            greeting = "hello"
            metrics_port = 9121
            "#,
        )
        .unwrap();

        let settings = Settings::resolve(Overrides::default(), file).unwrap();
        assert_eq!(settings.server.addr, "127.0.0.1:7021".parse::<SocketAddr>().unwrap());
        assert_eq!(settings.server.root, PathBuf::from("/srv/files"));
        assert_eq!(settings.server.session.read_timeout, Duration::from_millis(250));
        assert_eq!(settings.server.session.scan_mode, ScanMode::PerChunk);
        assert_eq!(settings.server.session.greeting, "hello");
        assert_eq!(settings.server.max_sessions, Some(4));
        assert_eq!(settings.metrics_addr, Some("127.0.0.1:9121".parse::<SocketAddr>().unwrap()));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file: FileConfig = toml::from_str("port = 7021\nscan_mode = \"per-chunk\"").unwrap();
        let cli = Overrides {
            port: Some(8021),
            scan_mode: Some(ScanMode::Rolling),
            ..Default::default()
        };

        let settings = Settings::resolve(cli, file).unwrap();
        assert_eq!(settings.server.addr.port(), 8021);
        assert_eq!(settings.server.session.scan_mode, ScanMode::Rolling);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(toml::from_str::<FileConfig>("colour = \"blue\"").is_err());
        assert!(toml::from_str::<FileConfig>("scan_mode = \"sometimes\"").is_err());

        let cli = Overrides {
            bind: Some("not an address".into()),
            ..Default::default()
        };
        assert!(Settings::resolve(cli, FileConfig::default()).is_err());

        let cli = Overrides {
            read_timeout_ms: Some(0),
            ..Default::default()
        };
        assert!(Settings::resolve(cli, FileConfig::default()).is_err());

        let file: FileConfig = toml::from_str("greeting = \"hi\\r\\n226 Transfer complete.\"").unwrap();
        assert!(Settings::resolve(Overrides::default(), file).is_err());
    }

    #[test]
    fn test_zero_max_sessions_is_unlimited() {
        let cli = Overrides {
            max_sessions: Some(0),
            ..Default::default()
        };
        let settings = Settings::resolve(cli, FileConfig::default()).unwrap();
        assert_eq!(settings.server.max_sessions, None);
    }
}

//! TCP server and session loop

use sluice_core::Workspace;
use sluice_protocol::Reply;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

#[cfg(feature = "metrics")]
use crate::metrics::Metrics;

use crate::config::ServerConfig;
use crate::error::SessionResult;
use crate::handler::{Flow, SessionHandler, SessionState};
use crate::stream::ChunkStream;

/// TCP server for sluice
pub struct TcpServer {
    config: ServerConfig,
    session_counter: AtomicU64,
    #[cfg(feature = "metrics")]
    metrics: Option<Arc<Metrics>>,
}

impl TcpServer {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            session_counter: AtomicU64::new(0),
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Record sessions and commands in `metrics`
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Accept connections on an already bound listener. Each connection
    /// runs its own session task.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        // Fail early on a bad root instead of once per session
        Workspace::new(&self.config.root)?;

        let limiter = self.config.max_sessions.map(|n| Arc::new(Semaphore::new(n)));

        loop {
            let permit = match &limiter {
                Some(limiter) => Some(limiter.clone().acquire_owned().await?),
                None => None,
            };

            match listener.accept().await {
                Ok((stream, peer_addr)) => {
                    let session_id = format!(
                        "tcp:{}:{}",
                        peer_addr,
                        self.session_counter.fetch_add(1, Ordering::Relaxed)
                    );

                    let workspace = match Workspace::new(&self.config.root) {
                        Ok(workspace) => workspace,
                        Err(e) => {
                            error!(session = %session_id, error = %e, "Cannot open session root");
                            continue;
                        }
                    };

                    let handler = SessionHandler::new(session_id, workspace, self.config.session.clone());
                    #[cfg(feature = "metrics")]
                    let handler = handler.with_metrics(self.metrics.clone());

                    tokio::spawn(async move {
                        let _permit = permit;
                        // Errors are logged inside; they only end this session
                        let _ = Self::handle_connection(stream, handler).await;
                    });
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    /// Run one session to completion: greeting, then commands until QUIT,
    /// peer close, or an error.
    pub async fn handle_connection<S>(stream: S, mut handler: SessionHandler) -> SessionResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let session_id = handler.session_id().to_string();
        info!(session = %session_id, "Client connected");

        #[cfg(feature = "metrics")]
        {
            if let Some(metrics) = handler.metrics() {
                metrics.record_session_start();
            }
        }

        let mut stream = ChunkStream::new(stream, handler.config().read_timeout);
        let result = Self::session_loop(&mut stream, &mut handler).await;

        match &result {
            Ok(()) => info!(session = %session_id, "Session closed"),
            Err(e) => error!(session = %session_id, error = %e, kind = e.label(), "Session ended with error"),
        }

        #[cfg(feature = "metrics")]
        {
            if let Some(metrics) = handler.metrics() {
                metrics.record_session_end(result.as_ref().err().map(|e| e.label()));
            }
        }

        result
    }

    async fn session_loop<S>(stream: &mut ChunkStream<S>, handler: &mut SessionHandler) -> SessionResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let greeting = Reply::greeting(handler.config().greeting.clone());
        stream.send_reply(&greeting).await?;

        while handler.state() == SessionState::Active {
            let line = match stream.read_command_line().await? {
                Some(line) => line,
                None => {
                    debug!(session = %handler.session_id(), "Client disconnected");
                    return Ok(());
                }
            };

            if handler.handle_line(stream, &line).await? == Flow::Close {
                stream.shutdown().await?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::error::SessionError;
    use std::net::SocketAddr;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    fn handler(dir: &std::path::Path) -> SessionHandler {
        let config = SessionConfig::default().with_read_timeout(Duration::from_millis(200));
        SessionHandler::new("test", Workspace::new(dir).unwrap(), config)
    }

    #[tokio::test]
    async fn test_tcp_greeting_and_quit() {
        let dir = tempfile::tempdir().unwrap();
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();

        let listener = TcpListener::bind(addr).await.unwrap();
        let bound_addr = listener.local_addr().unwrap();

        let session = handler(dir.path());
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            TcpServer::handle_connection(stream, session).await.unwrap();
        });

        let client = TcpStream::connect(bound_addr).await.unwrap();
        let mut reader = BufReader::new(client);

        let mut greeting = String::new();
        reader.read_line(&mut greeting).await.unwrap();
        assert_eq!(greeting, "Welcome to sluice server!\r\n");

        reader.get_mut().write_all(b"QUIT\r\n").await.unwrap();

        // Exactly one reply, then the server closes
        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "Goodbye.\r\n");

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_ends_session() {
        let dir = tempfile::tempdir().unwrap();
        let (client, server_side) = tokio::io::duplex(4096);

        let server = tokio::spawn(TcpServer::handle_connection(server_side, handler(dir.path())));

        let mut client = ChunkStream::new(client, Duration::from_millis(200));
        client.read_reply().await.unwrap();
        client.write_all(b"PWD\r\n").await.unwrap();
        client.read_reply().await.unwrap();
        drop(client);

        assert!(server.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_overlong_line_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (client, server_side) = tokio::io::duplex(8192);

        let server = tokio::spawn(TcpServer::handle_connection(server_side, handler(dir.path())));

        let mut client = ChunkStream::new(client, Duration::from_millis(200));
        client.read_reply().await.unwrap();
        client.write_all(&[b'A'; 3000]).await.unwrap();

        let result = server.await.unwrap();
        assert!(matches!(result, Err(SessionError::Protocol(_))));
    }

    #[tokio::test]
    async fn test_session_limit() {
        let dir = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = crate::config::ServerConfig::new(addr, dir.path()).with_max_sessions(Some(1));
        let server = TcpServer::new(config);
        let task = tokio::spawn(async move { server.serve(listener).await.map_err(|e| e.to_string()) });

        let first = TcpStream::connect(addr).await.unwrap();
        let mut first = BufReader::new(first);
        let mut line = String::new();
        first.read_line(&mut line).await.unwrap();
        assert!(line.starts_with("Welcome"));

        // The second connection is queued until the first session ends
        let second = TcpStream::connect(addr).await.unwrap();
        let mut second = BufReader::new(second);
        let mut line = String::new();
        let waited = tokio::time::timeout(Duration::from_millis(200), second.read_line(&mut line)).await;
        assert!(waited.is_err());

        first.get_mut().write_all(b"QUIT\r\n").await.unwrap();
        let mut line = String::new();
        tokio::time::timeout(Duration::from_secs(5), second.read_line(&mut line))
            .await
            .unwrap()
            .unwrap();
        assert!(line.starts_with("Welcome"));

        task.abort();
    }
}

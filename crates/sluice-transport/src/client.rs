//! Client side of the sluice protocol

use sluice_protocol::{Command, Failure, Reply, FILE_SENTINEL, LISTING_SENTINEL};
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::listing::receive_listing;
use crate::stream::ChunkStream;
use crate::transfer::{receive_file, write_payload, TransferOutcome, TransferReport};

/// A connected session.
///
/// Operations answered with a `550` reply or hitting a local file problem
/// return an error but leave the session usable.
pub struct Client<S = TcpStream> {
    stream: ChunkStream<S>,
    config: ClientConfig,
    greeting: String,
}

impl Client<TcpStream> {
    /// Connect and read the greeting
    pub async fn connect(addr: &str, config: ClientConfig) -> ClientResult<Self> {
        let stream = match timeout(config.connect_timeout, TcpStream::connect(addr)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => {
                return Err(ClientError::Connect {
                    addr: addr.to_string(),
                    source,
                })
            }
            Err(_) => return Err(ClientError::ConnectTimeout(addr.to_string())),
        };
        stream.set_nodelay(true).map_err(|source| ClientError::Connect {
            addr: addr.to_string(),
            source,
        })?;

        Self::from_stream(stream, config).await
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> Client<S> {
    /// Start a session over an already connected stream
    pub async fn from_stream(stream: S, config: ClientConfig) -> ClientResult<Self> {
        let mut stream = ChunkStream::new(stream, config.read_timeout);
        let greeting = stream.read_reply().await?;
        debug!(greeting = %greeting, "Connected");

        Ok(Self {
            stream,
            config,
            greeting,
        })
    }

    /// The server's greeting line
    pub fn greeting(&self) -> &str {
        &self.greeting
    }

    async fn send(&mut self, command: &Command) -> ClientResult<()> {
        let line = command.encode()?;
        self.stream.write_all(&line).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn request(&mut self, command: &Command) -> ClientResult<String> {
        self.send(command).await?;
        Ok(self.stream.read_reply().await?)
    }

    /// Send an arbitrary line and return the single reply line.
    ///
    /// Only for commands answered by one line; a GET, PUT, or DIR sent this
    /// way leaves the session out of sync.
    pub async fn raw(&mut self, line: &str) -> ClientResult<String> {
        self.stream.write_all(line.as_bytes()).await?;
        self.stream.write_all(b"\r\n").await?;
        self.stream.flush().await?;
        Ok(self.stream.read_reply().await?)
    }

    /// Server working directory
    pub async fn pwd(&mut self) -> ClientResult<String> {
        self.request(&Command::pwd()).await
    }

    /// Change the server working directory
    pub async fn cd(&mut self, path: &str) -> ClientResult<String> {
        let reply = self.request(&Command::cd(path)).await?;
        if reply.starts_with("cd: ") {
            return Err(ClientError::Remote(reply));
        }
        Ok(reply)
    }

    /// Size of a remote file in bytes
    pub async fn size(&mut self, path: &str) -> ClientResult<u64> {
        let reply = self.request(&Command::size(path)).await?;
        if Reply::is_failure(&reply) {
            return Err(ClientError::Remote(reply));
        }
        Ok(Reply::parse_size(&reply)?)
    }

    /// Server platform string
    pub async fn syst(&mut self) -> ClientResult<String> {
        self.request(&Command::syst()).await
    }

    /// Download `remote` into `local`.
    ///
    /// `progress` receives the running byte count. If `local` cannot be
    /// written the download is still drained and a [`ClientError::Local`]
    /// is returned.
    pub async fn get(
        &mut self,
        remote: &str,
        local: &Path,
        progress: impl FnMut(u64),
    ) -> ClientResult<TransferReport> {
        self.send(&Command::get(remote)).await?;

        if let Some(reply) = self.stream.read_failure_reply(FILE_SENTINEL, &[Failure::OpenFile]).await? {
            return Err(ClientError::Remote(reply));
        }

        match receive_file(&mut self.stream, local, self.config.scan_mode, progress).await? {
            TransferOutcome::Completed(report) => Ok(report),
            TransferOutcome::Rejected(source) => Err(ClientError::Local {
                path: local.to_path_buf(),
                source,
            }),
        }
    }

    /// Upload `local` as `remote`.
    ///
    /// The local file is opened before anything is sent, so a missing file
    /// costs no round trip.
    pub async fn put(
        &mut self,
        local: &Path,
        remote: &str,
        progress: impl FnMut(u64),
    ) -> ClientResult<TransferReport> {
        let local_error = |source| ClientError::Local {
            path: local.to_path_buf(),
            source,
        };
        let file = File::open(local).await.map_err(local_error)?;
        if !file.metadata().await.map_err(local_error)?.is_file() {
            return Err(local_error(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        self.send(&Command::put(remote)).await?;
        let report = write_payload(&mut self.stream, file, progress).await?;

        let reply = self.stream.read_reply().await?;
        if Reply::is_failure(&reply) {
            return Err(ClientError::Remote(reply));
        }
        Ok(report)
    }

    /// Write the remote directory listing to `out`
    pub async fn dir<W>(&mut self, out: &mut W) -> ClientResult<TransferReport>
    where
        W: AsyncWrite + Unpin,
    {
        self.send(&Command::dir()).await?;

        if let Some(reply) = self
            .stream
            .read_failure_reply(LISTING_SENTINEL, &[Failure::OpenDirectory, Failure::EmptyDirectory])
            .await? {
            return Err(ClientError::Remote(reply));
        }

        Ok(receive_listing(&mut self.stream, self.config.scan_mode, out).await?)
    }

    /// End the session and close the connection
    pub async fn quit(mut self) -> ClientResult<String> {
        let reply = self.request(&Command::quit()).await?;
        self.stream.shutdown().await?;
        Ok(reply)
    }
}

//! Buffered, deadline-aware byte stream shared by server and client

use bytes::{Bytes, BytesMut};
use sluice_protocol::frame::split_line;
use sluice_protocol::{Failure, Reply, CHUNK_SIZE};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::error::{SessionError, SessionResult};

/// A byte stream read in chunks of at most [`CHUNK_SIZE`].
///
/// Bytes read past the end of a line or payload stay buffered and are handed
/// to whichever reader comes next, so control lines and payloads can share
/// one connection.
pub struct ChunkStream<S> {
    inner: S,
    buffer: BytesMut,
    read_timeout: Duration,
}

impl<S> ChunkStream<S> {
    pub fn new(inner: S, read_timeout: Duration) -> Self {
        Self {
            inner,
            buffer: BytesMut::with_capacity(CHUNK_SIZE * 2),
            read_timeout,
        }
    }

    /// Bytes received but not consumed yet
    pub fn buffered(&self) -> &[u8] {
        &self.buffer
    }

    /// Push bytes back in front of the buffer
    pub fn unread(&mut self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        let mut restored = BytesMut::with_capacity(bytes.len() + self.buffer.len());
        restored.extend_from_slice(bytes);
        restored.extend_from_slice(&self.buffer);
        self.buffer = restored;
    }
}

impl<S: AsyncRead + AsyncWrite + Unpin> ChunkStream<S> {
    /// Perform one read of up to one chunk. Returns the number of bytes read,
    /// zero once the peer has closed its side.
    async fn fill(&mut self, deadline: Option<Duration>) -> SessionResult<usize> {
        let mut chunk = [0u8; CHUNK_SIZE];
        let n = match deadline {
            Some(limit) => timeout(limit, self.inner.read(&mut chunk))
                .await
                .map_err(|_| SessionError::Timeout(limit))??,
            None => self.inner.read(&mut chunk).await?,
        };
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    /// Wait for the next command line. No deadline applies.
    ///
    /// Returns `None` if the peer closes the connection between commands.
    pub async fn read_command_line(&mut self) -> SessionResult<Option<String>> {
        loop {
            if let Some(line) = split_line(&mut self.buffer)? {
                return Ok(Some(String::from_utf8_lossy(&line).into_owned()));
            }
            if self.fill(None).await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(SessionError::PeerClosed);
            }
        }
    }

    /// Read one reply line within the read deadline
    pub async fn read_reply(&mut self) -> SessionResult<String> {
        loop {
            if let Some(line) = split_line(&mut self.buffer)? {
                return Ok(String::from_utf8_lossy(&line).into_owned());
            }
            if self.fill(Some(self.read_timeout)).await? == 0 {
                return Err(SessionError::PeerClosed);
            }
        }
    }

    /// Next chunk of payload bytes.
    ///
    /// Buffered bytes are returned first; otherwise performs a single read
    /// within the read deadline.
    pub async fn next_chunk(&mut self) -> SessionResult<Bytes> {
        if self.buffer.is_empty() && self.fill(Some(self.read_timeout)).await? == 0 {
            return Err(SessionError::PeerClosed);
        }
        Ok(self.buffer.split().freeze())
    }

    /// Decide whether the answer to GET or DIR is one of the `expected`
    /// failure replies or a payload ending in `sentinel`.
    ///
    /// Only a complete, exact failure line counts as a reply, so a payload
    /// that merely starts with `550 ` is still a payload. Reads only as far as
    /// needed to tell the two apart. A failure reply is consumed and returned;
    /// a payload is left buffered.
    pub async fn read_failure_reply(
        &mut self,
        sentinel: &[u8],
        expected: &[Failure],
    ) -> SessionResult<Option<String>> {
        let lines: Vec<Bytes> = expected.iter().map(|f| Reply::failure(*f).encode()).collect();
        loop {
            if self.buffer.starts_with(sentinel) {
                return Ok(None);
            }
            if let Some(line) = lines.iter().find(|line| self.buffer.starts_with(line)) {
                let line = self.buffer.split_to(line.len());
                let text = String::from_utf8_lossy(&line[..line.len() - 2]).into_owned();
                return Ok(Some(text));
            }
            let undecided = sentinel.starts_with(&self.buffer)
                || lines.iter().any(|line| line.starts_with(&self.buffer));
            if !undecided {
                return Ok(None);
            }
            if self.fill(Some(self.read_timeout)).await? == 0 {
                return Err(SessionError::PeerClosed);
            }
        }
    }

    pub async fn write_all(&mut self, data: &[u8]) -> SessionResult<()> {
        self.inner.write_all(data).await?;
        Ok(())
    }

    /// Write one reply line and flush it
    pub async fn send_reply(&mut self, reply: &Reply) -> SessionResult<()> {
        self.inner.write_all(&reply.encode()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    pub async fn flush(&mut self) -> SessionResult<()> {
        self.inner.flush().await?;
        Ok(())
    }

    /// Close the write side
    pub async fn shutdown(&mut self) -> SessionResult<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

//! File transfer engine
//!
//! A file travels as raw bytes in chunks of at most [`CHUNK_SIZE`], followed
//! by the [`FILE_SENTINEL`]. The receiver stops at the first occurrence of the
//! sentinel, so a file that contains `EOF` arrives truncated at that point.

use sluice_protocol::{
    Decoded, Failure, Reply, ScanMode, SentinelDecoder, CHUNK_SIZE, FILE_SENTINEL,
};
use std::io;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::{SessionError, SessionResult};
use crate::stream::ChunkStream;

/// Byte and chunk counts of one payload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub bytes: u64,
    pub chunks: u64,
}

impl TransferReport {
    fn record(&mut self, n: usize) {
        self.bytes += n as u64;
        self.chunks += 1;
    }
}

/// Result of a transfer that kept the session in sync
#[derive(Debug)]
pub enum TransferOutcome {
    Completed(TransferReport),
    /// The local file could not be used. Any payload was still consumed.
    Rejected(io::Error),
}

/// What [`read_payload`] delivered, and whether the sink took all of it
#[derive(Debug)]
pub struct Received {
    pub report: TransferReport,
    pub write_error: Option<io::Error>,
}

/// Send everything `source` yields, then the file sentinel
pub async fn write_payload<S, R>(
    stream: &mut ChunkStream<S>,
    mut source: R,
    mut progress: impl FnMut(u64),
) -> SessionResult<TransferReport>
where
    S: AsyncRead + AsyncWrite + Unpin,
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; CHUNK_SIZE];
    let mut report = TransferReport::default();

    loop {
        let n = source.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        stream.write_all(&chunk[..n]).await?;
        report.record(n);
        progress(report.bytes);
    }

    stream.write_all(FILE_SENTINEL).await?;
    stream.flush().await?;
    Ok(report)
}

/// Serve a GET: the file payload, or `550 Failed to open file.`
pub async fn send_file<S>(
    stream: &mut ChunkStream<S>,
    path: &Path,
    progress: impl FnMut(u64),
) -> SessionResult<TransferOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let file = match open_regular_file(path).await {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot open file for sending");
            stream.send_reply(&Reply::failure(Failure::OpenFile)).await?;
            return Ok(TransferOutcome::Rejected(e));
        }
    };

    let report = write_payload(stream, file, progress).await?;
    Ok(TransferOutcome::Completed(report))
}

async fn open_regular_file(path: &Path) -> io::Result<File> {
    let file = File::open(path).await?;
    if !file.metadata().await?.is_file() {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "not a regular file"));
    }
    Ok(file)
}

/// Consume one payload terminated by `sentinel`, writing it to `sink`.
///
/// Once the sink fails, the rest of the payload is still read and discarded
/// so the stream stays positioned after the sentinel. Bytes that arrived
/// after the sentinel are left in the stream for the next reader. If the
/// peer closes before the sentinel, everything received so far reaches the
/// sink before `PeerClosed` is returned.
pub async fn read_payload<S, W>(
    stream: &mut ChunkStream<S>,
    sentinel: &'static [u8],
    mode: ScanMode,
    sink: &mut W,
    mut progress: impl FnMut(u64),
) -> SessionResult<Received>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut decoder = SentinelDecoder::new(sentinel, mode);
    let mut report = TransferReport::default();
    let mut write_error = None;

    loop {
        let chunk = match stream.next_chunk().await {
            Ok(chunk) => chunk,
            Err(SessionError::PeerClosed) => {
                let held = decoder.finish();
                if write_error.is_none() && !held.is_empty() {
                    // Best effort: the session is over either way
                    if sink.write_all(&held).await.is_ok() {
                        let _ = sink.flush().await;
                    }
                }
                return Err(SessionError::PeerClosed);
            }
            Err(e) => return Err(e),
        };
        let (payload, trailing) = match decoder.decode(&chunk) {
            Decoded::Partial(payload) => (payload, None),
            Decoded::Complete { payload, trailing } => (payload, Some(trailing)),
        };

        if !payload.is_empty() {
            if write_error.is_none() {
                if let Err(e) = sink.write_all(&payload).await {
                    warn!(error = %e, "Payload sink failed; draining remainder");
                    write_error = Some(e);
                }
            }
            report.record(payload.len());
            progress(report.bytes);
        }

        if let Some(trailing) = trailing {
            stream.unread(&trailing);
            break;
        }
    }

    if write_error.is_none() {
        if let Err(e) = sink.flush().await {
            write_error = Some(e);
        }
    }

    Ok(Received {
        report,
        write_error,
    })
}

/// Read and discard one payload
pub async fn drain_payload<S>(
    stream: &mut ChunkStream<S>,
    sentinel: &'static [u8],
    mode: ScanMode,
) -> SessionResult<TransferReport>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let received = read_payload(stream, sentinel, mode, &mut tokio::io::sink(), |_| {}).await?;
    Ok(received.report)
}

/// Receive a file payload into `path`.
///
/// If the file cannot be created or written the payload is drained and the
/// outcome is [`TransferOutcome::Rejected`].
pub async fn receive_file<S>(
    stream: &mut ChunkStream<S>,
    path: &Path,
    mode: ScanMode,
    progress: impl FnMut(u64),
) -> SessionResult<TransferOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut file = match File::create(path).await {
        Ok(file) => file,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Cannot create file; draining payload");
            drain_payload(stream, FILE_SENTINEL, mode).await?;
            return Ok(TransferOutcome::Rejected(e));
        }
    };

    let received = read_payload(stream, FILE_SENTINEL, mode, &mut file, progress).await?;
    Ok(match received.write_error {
        None => TransferOutcome::Completed(received.report),
        Some(e) => TransferOutcome::Rejected(e),
    })
}

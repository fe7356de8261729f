//! Directory listing payloads
//!
//! A listing is zero or more CR/LF terminated record lines followed by the
//! [`LISTING_SENTINEL`]. A file named `END...` ends the listing early.

use sluice_core::{list_directory, DirEntryRecord};
use sluice_protocol::{Failure, Reply, ScanMode, LISTING_SENTINEL};
use std::io;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::stream::ChunkStream;
use crate::transfer::{read_payload, TransferReport};

/// Result of serving a DIR
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingOutcome {
    Sent { entries: usize, bytes: u64 },
    Rejected(Failure),
}

/// Serve a DIR for `dir`: one record line per entry then the sentinel, or a
/// single `550` reply if the directory cannot be read or is empty.
pub async fn send_listing<S>(stream: &mut ChunkStream<S>, dir: &Path) -> SessionResult<ListingOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let target = dir.to_path_buf();
    let records = tokio::task::spawn_blocking(move || {
        list_directory(&target).map(|entries| entries.collect::<Vec<DirEntryRecord>>())
    })
    .await
    .map_err(|e| SessionError::Io(io::Error::new(io::ErrorKind::Other, e)))?;

    let failure = match records {
        Ok(records) if !records.is_empty() => {
            return write_records(stream, &records).await;
        }
        Ok(_) => Failure::EmptyDirectory,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Cannot list directory");
            Failure::OpenDirectory
        }
    };

    stream.send_reply(&Reply::failure(failure)).await?;
    Ok(ListingOutcome::Rejected(failure))
}

async fn write_records<S>(stream: &mut ChunkStream<S>, records: &[DirEntryRecord]) -> SessionResult<ListingOutcome>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut bytes = 0u64;
    for record in records {
        let line = record.to_line();
        stream.write_all(line.as_bytes()).await?;
        bytes += line.len() as u64;
    }
    stream.write_all(LISTING_SENTINEL).await?;
    stream.flush().await?;

    Ok(ListingOutcome::Sent {
        entries: records.len(),
        bytes,
    })
}

/// Copy a listing payload to `out` until the sentinel
pub async fn receive_listing<S, W>(
    stream: &mut ChunkStream<S>,
    mode: ScanMode,
    out: &mut W,
) -> SessionResult<TransferReport>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let received = read_payload(stream, LISTING_SENTINEL, mode, out, |_| {}).await?;
    match received.write_error {
        None => Ok(received.report),
        Some(e) => Err(SessionError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration;
    use tokio::io::duplex;

    fn pair() -> (ChunkStream<tokio::io::DuplexStream>, ChunkStream<tokio::io::DuplexStream>) {
        let (a, b) = duplex(64 * 1024);
        let deadline = Duration::from_millis(200);
        (ChunkStream::new(a, deadline), ChunkStream::new(b, deadline))
    }

    #[tokio::test]
    async fn test_listing_lines() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("alpha.txt"), b"12345").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();

        let (mut tx, mut rx) = pair();
        let outcome = send_listing(&mut tx, dir.path()).await.unwrap();
        assert!(matches!(outcome, ListingOutcome::Sent { entries: 2, .. }));

        let mut out = Vec::new();
        receive_listing(&mut rx, ScanMode::Rolling, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.split_terminator("\r\n").collect();
        assert_eq!(lines.len(), 2);

        let file = lines.iter().find(|l| l.ends_with(" alpha.txt")).unwrap();
        assert!(file.starts_with('-'));
        assert!(file.contains(" 5 "));
        let sub = lines.iter().find(|l| l.ends_with(" sub")).unwrap();
        assert!(sub.starts_with('d'));
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (mut tx, mut rx) = pair();

        let outcome = send_listing(&mut tx, dir.path()).await.unwrap();
        assert_eq!(outcome, ListingOutcome::Rejected(Failure::EmptyDirectory));
        assert_eq!(rx.read_reply().await.unwrap(), "550 Directory is empty.");
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let (mut tx, mut rx) = pair();

        let outcome = send_listing(&mut tx, &dir.path().join("gone")).await.unwrap();
        assert_eq!(outcome, ListingOutcome::Rejected(Failure::OpenDirectory));
        assert_eq!(rx.read_reply().await.unwrap(), "550 Failed to open directory.");
    }

    #[tokio::test]
    async fn test_entry_named_like_sentinel_cuts_listing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ENDNOTES"), b"").unwrap();

        let (mut tx, mut rx) = pair();
        send_listing(&mut tx, dir.path()).await.unwrap();

        let mut out = Vec::new();
        receive_listing(&mut rx, ScanMode::Rolling, &mut out).await.unwrap();
        let text = String::from_utf8(out).unwrap();
        // The record stops right before the file name
        assert!(text.ends_with(' '));
        assert!(!text.contains("\r\n"));
        assert!(rx.buffered().starts_with(b"NOTES\r\n"));
    }
}

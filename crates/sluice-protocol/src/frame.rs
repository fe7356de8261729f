//! Frame codec: chunking, line splitting and sentinel detection

use crate::error::{ProtocolError, ProtocolResult};
use bytes::{Buf, Bytes, BytesMut};
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Size of one I/O chunk. Also the longest accepted command or reply line.
pub const CHUNK_SIZE: usize = 1024;

/// Marks the end of a file payload
pub const FILE_SENTINEL: &[u8] = b"EOF";

/// Marks the end of a listing payload
pub const LISTING_SENTINEL: &[u8] = b"END";

/// How received chunks are searched for a sentinel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// Search each received chunk on its own. A sentinel split across two
    /// chunks is never seen and the receiver stalls until its deadline.
    PerChunk,
    /// Keep the tail of the previous chunk as overlap so split sentinels are
    /// found too.
    #[default]
    Rolling,
}

impl FromStr for ScanMode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "per-chunk" | "chunk" => Ok(ScanMode::PerChunk),
            "rolling" => Ok(ScanMode::Rolling),
            _ => Err(ProtocolError::InvalidScanMode(s.to_string())),
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanMode::PerChunk => f.write_str("per-chunk"),
            ScanMode::Rolling => f.write_str("rolling"),
        }
    }
}

/// Result of feeding one chunk to a [`SentinelDecoder`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// No sentinel yet; these payload bytes can be delivered
    Partial(Bytes),
    /// Sentinel found
    Complete {
        /// Payload bytes preceding the sentinel
        payload: Bytes,
        /// Bytes received after the sentinel, belonging to whatever follows
        trailing: Bytes,
    },
}

/// Finds the end of a sentinel-delimited payload in a sequence of chunks
#[derive(Debug)]
pub struct SentinelDecoder {
    sentinel: &'static [u8],
    mode: ScanMode,
    carry: BytesMut,
}

impl SentinelDecoder {
    pub fn new(sentinel: &'static [u8], mode: ScanMode) -> Self {
        Self {
            sentinel,
            mode,
            carry: BytesMut::with_capacity(CHUNK_SIZE + sentinel.len()),
        }
    }

    /// Feed the next received chunk
    pub fn decode(&mut self, chunk: &[u8]) -> Decoded {
        match self.mode {
            ScanMode::PerChunk => match find_subsequence(chunk, self.sentinel) {
                Some(at) => Decoded::Complete {
                    payload: Bytes::copy_from_slice(&chunk[..at]),
                    trailing: Bytes::copy_from_slice(&chunk[at + self.sentinel.len()..]),
                },
                None => Decoded::Partial(Bytes::copy_from_slice(chunk)),
            },
            ScanMode::Rolling => {
                self.carry.extend_from_slice(chunk);

                if let Some(at) = find_subsequence(&self.carry, self.sentinel) {
                    let mut window = self.carry.split();
                    let payload = window.split_to(at).freeze();
                    window.advance(self.sentinel.len());
                    return Decoded::Complete {
                        payload,
                        trailing: window.freeze(),
                    };
                }

                // Hold back what could be the start of a sentinel
                let keep = self.sentinel.len().saturating_sub(1).min(self.carry.len());
                let ready = self.carry.len() - keep;
                Decoded::Partial(self.carry.split_to(ready).freeze())
            }
        }
    }

    /// Bytes still held back as overlap, for a payload cut off before its sentinel
    pub fn finish(&mut self) -> Bytes {
        self.carry.split().freeze()
    }
}

/// Position of the first occurrence of `needle` in `haystack`
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Take one `\n` terminated line off the front of `buffer`.
///
/// Returns `Ok(None)` if no complete line is buffered yet. The line is
/// returned without its `\r\n` or `\n` terminator.
pub fn split_line(buffer: &mut BytesMut) -> ProtocolResult<Option<Bytes>> {
    let line_end = match buffer.iter().position(|&b| b == b'\n') {
        Some(pos) => pos,
        None if buffer.len() > CHUNK_SIZE => {
            return Err(ProtocolError::LineTooLong {
                size: buffer.len(),
                max: CHUNK_SIZE,
            })
        }
        None => return Ok(None),
    };

    if line_end + 1 > CHUNK_SIZE {
        return Err(ProtocolError::LineTooLong {
            size: line_end + 1,
            max: CHUNK_SIZE,
        });
    }

    let line_len = if line_end > 0 && buffer[line_end - 1] == b'\r' {
        line_end - 1
    } else {
        line_end
    };

    let mut line = buffer.split_to(line_end + 1);
    line.truncate(line_len);
    Ok(Some(line.freeze()))
}

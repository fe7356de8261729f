//! Sluice reply lines

use crate::error::{ProtocolError, ProtocolResult};
use bytes::{BufMut, Bytes, BytesMut};

/// Prefix shared by every operation failure reply
pub const FAILURE_PREFIX: &str = "550 ";

/// A single-line textual reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Sent once when a session starts
    Greeting(String),

    /// PWD result
    WorkingDirectory(String),

    /// Directory changed.
    DirectoryChanged,

    /// cd: <path>: No such file or directory
    NoSuchDirectory(String),

    /// <n> bytes
    Size(u64),

    /// SYST result
    System(String),

    /// 226 Transfer complete.
    TransferComplete,

    /// 550 <reason>
    Failure(Failure),

    /// Invalid command.
    InvalidCommand,

    /// Goodbye.
    Goodbye,
}

/// Reasons carried by a `550` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    OpenFile,
    CreateFile,
    OpenDirectory,
    EmptyDirectory,
}

impl Failure {
    pub fn message(&self) -> &'static str {
        match self {
            Failure::OpenFile => "Failed to open file.",
            Failure::CreateFile => "Failed to create file.",
            Failure::OpenDirectory => "Failed to open directory.",
            Failure::EmptyDirectory => "Directory is empty.",
        }
    }
}

impl Reply {
    pub fn greeting(text: impl Into<String>) -> Self {
        Reply::Greeting(text.into())
    }

    pub fn working_directory(path: impl Into<String>) -> Self {
        Reply::WorkingDirectory(path.into())
    }

    pub fn no_such_directory(path: impl Into<String>) -> Self {
        Reply::NoSuchDirectory(path.into())
    }

    pub fn system(platform: impl Into<String>) -> Self {
        Reply::System(platform.into())
    }

    pub fn failure(reason: Failure) -> Self {
        Reply::Failure(reason)
    }

    /// Encode the reply to bytes
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(64);
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Encode the reply into an existing buffer
    pub fn encode_into(&self, buf: &mut BytesMut) {
        match self {
            Reply::Greeting(text) | Reply::WorkingDirectory(text) | Reply::System(text) => {
                buf.put_slice(text.as_bytes());
            }
            Reply::DirectoryChanged => {
                buf.put_slice(b"Directory changed.");
            }
            Reply::NoSuchDirectory(path) => {
                buf.put_slice(b"cd: ");
                buf.put_slice(path.as_bytes());
                buf.put_slice(b": No such file or directory");
            }
            Reply::Size(n) => {
                buf.put_slice(n.to_string().as_bytes());
                buf.put_slice(b" bytes");
            }
            Reply::TransferComplete => {
                buf.put_slice(b"226 Transfer complete.");
            }
            Reply::Failure(reason) => {
                buf.put_slice(FAILURE_PREFIX.as_bytes());
                buf.put_slice(reason.message().as_bytes());
            }
            Reply::InvalidCommand => {
                buf.put_slice(b"Invalid command.");
            }
            Reply::Goodbye => {
                buf.put_slice(b"Goodbye.");
            }
        }
        buf.put_slice(b"\r\n");
    }

    /// Whether a received reply line is a `550` failure
    pub fn is_failure(line: &str) -> bool {
        line.starts_with(FAILURE_PREFIX)
    }

    /// Parse the `<n> bytes` answer to SIZE
    pub fn parse_size(line: &str) -> ProtocolResult<u64> {
        line.strip_suffix(" bytes")
            .and_then(|n| n.trim().parse().ok())
            .ok_or_else(|| ProtocolError::UnexpectedReply(line.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_failures() {
        assert_eq!(
            Reply::failure(Failure::OpenFile).encode().as_ref(),
            b"550 Failed to open file.\r\n"
        );
        assert_eq!(
            Reply::failure(Failure::CreateFile).encode().as_ref(),
            b"550 Failed to create file.\r\n"
        );
        assert_eq!(
            Reply::failure(Failure::OpenDirectory).encode().as_ref(),
            b"550 Failed to open directory.\r\n"
        );
    }

    #[test]
    fn test_encode_cd_replies() {
        assert_eq!(Reply::DirectoryChanged.encode().as_ref(), b"Directory changed.\r\n");
        assert_eq!(
            Reply::no_such_directory("nope").encode().as_ref(),
            b"cd: nope: No such file or directory\r\n"
        );
    }

    #[test]
    fn test_encode_misc() {
        assert_eq!(Reply::Size(42).encode().as_ref(), b"42 bytes\r\n");
        assert_eq!(Reply::TransferComplete.encode().as_ref(), b"226 Transfer complete.\r\n");
        assert_eq!(Reply::InvalidCommand.encode().as_ref(), b"Invalid command.\r\n");
        assert_eq!(Reply::Goodbye.encode().as_ref(), b"Goodbye.\r\n");
        assert_eq!(Reply::working_directory("/srv").encode().as_ref(), b"/srv\r\n");
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(Reply::parse_size("1024 bytes").unwrap(), 1024);
        assert!(Reply::parse_size("550 Failed to open file.").is_err());
        assert!(Reply::is_failure("550 Failed to open file."));
        assert!(!Reply::is_failure("5500 bytes"));
    }
}

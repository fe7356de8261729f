//! Sluice command types

use crate::error::{ProtocolError, ProtocolResult};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// A parsed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub kind: CommandKind,
    pub argument: Option<String>,
}

/// All supported verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// GET <path>
    Get,
    /// PUT <path>
    Put,
    /// PWD
    Pwd,
    /// CD <path>
    Cd,
    /// DIR
    Dir,
    /// SIZE <path>
    Size,
    /// SYST
    Syst,
    /// QUIT
    Quit,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::Get => "GET",
            CommandKind::Put => "PUT",
            CommandKind::Pwd => "PWD",
            CommandKind::Cd => "CD",
            CommandKind::Dir => "DIR",
            CommandKind::Size => "SIZE",
            CommandKind::Syst => "SYST",
            CommandKind::Quit => "QUIT",
        }
    }

    /// Match a verb, ignoring case
    pub fn from_verb(verb: &str) -> Option<Self> {
        match verb.to_ascii_uppercase().as_str() {
            "GET" => Some(CommandKind::Get),
            "PUT" => Some(CommandKind::Put),
            "PWD" => Some(CommandKind::Pwd),
            "CD" => Some(CommandKind::Cd),
            "DIR" => Some(CommandKind::Dir),
            "SIZE" => Some(CommandKind::Size),
            "SYST" => Some(CommandKind::Syst),
            "QUIT" => Some(CommandKind::Quit),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Command {
    pub fn new(kind: CommandKind, argument: Option<String>) -> Self {
        Command { kind, argument }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Command::new(CommandKind::Get, Some(path.into()))
    }

    pub fn put(path: impl Into<String>) -> Self {
        Command::new(CommandKind::Put, Some(path.into()))
    }

    pub fn pwd() -> Self {
        Command::new(CommandKind::Pwd, None)
    }

    pub fn cd(path: impl Into<String>) -> Self {
        Command::new(CommandKind::Cd, Some(path.into()))
    }

    pub fn dir() -> Self {
        Command::new(CommandKind::Dir, None)
    }

    pub fn size(path: impl Into<String>) -> Self {
        Command::new(CommandKind::Size, Some(path.into()))
    }

    pub fn syst() -> Self {
        Command::new(CommandKind::Syst, None)
    }

    pub fn quit() -> Self {
        Command::new(CommandKind::Quit, None)
    }

    /// The argument, or an empty string when absent
    pub fn arg(&self) -> &str {
        self.argument.as_deref().unwrap_or("")
    }

    /// Encode as a wire line. Arguments cannot carry line terminators.
    pub fn encode(&self) -> ProtocolResult<Bytes> {
        let mut buf = BytesMut::with_capacity(8 + self.arg().len());
        buf.put_slice(self.kind.as_str().as_bytes());

        if let Some(arg) = self.argument.as_deref().filter(|a| !a.is_empty()) {
            if arg.contains(['\r', '\n']) {
                return Err(ProtocolError::InvalidArgument(
                    "argument contains a line terminator".into(),
                ));
            }
            buf.put_u8(b' ');
            buf.put_slice(arg.as_bytes());
        }

        buf.put_slice(b"\r\n");
        Ok(buf.freeze())
    }
}

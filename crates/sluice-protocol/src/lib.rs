//! Sluice wire protocol
//!
//! A line-oriented text protocol with in-band sentinels for payloads. Control
//! and data share one byte stream.
//!
//! ## Command Format
//! ```text
//! VERB [argument]\r\n
//! ```
//! The argument is the rest of the line, so paths may contain spaces.
//!
//! ## Reply Format
//! ```text
//! <text>\r\n               # PWD, CD, SIZE, SYST, QUIT, PUT, errors
//! 550 <reason>\r\n         # operation failure
//! <file bytes>EOF          # GET payload
//! <record line>*END        # DIR payload
//! ```
//!
//! Sentinels are neither escaped nor length-prefixed: a payload that contains
//! the sentinel bytes ends early at that point.

pub mod command;
pub mod error;
pub mod frame;
pub mod parser;
pub mod reply;

pub use command::{Command, CommandKind};
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{
    Decoded, ScanMode, SentinelDecoder, CHUNK_SIZE, FILE_SENTINEL, LISTING_SENTINEL,
};
pub use parser::parse_line;
pub use reply::{Failure, Reply, FAILURE_PREFIX};

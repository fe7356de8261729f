//! Sluice Core - filesystem operations behind the protocol
//!
//! This crate provides the local side of every command:
//! - Per-session working directory and path resolution
//! - Directory entry records as sent by `DIR`
//! - Platform string reported by `SYST`

pub mod error;
pub mod listing;
pub mod system;
pub mod workspace;

pub use error::{Error, Result};
pub use listing::{list_directory, DirEntryRecord, EntryKind};
pub use system::platform_string;
pub use workspace::Workspace;

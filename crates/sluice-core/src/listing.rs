//! Directory entry records
//!
//! One record per directory entry, rendered as an `ls -l` style line:
//!
//! ```text
//! -rw-r--r--  alice staff  1024 Mar 04 17:21 notes.txt
//! drwxr-xr-x  alice staff     - Mar 01 09:02 src
//! ```

use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::SystemTime;
use tracing::warn;

#[cfg(unix)]
use sysinfo::{Groups, Users};

/// Entry type as shown in the first column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Other,
}

impl EntryKind {
    pub fn indicator(self) -> char {
        match self {
            EntryKind::Directory => 'd',
            EntryKind::File => '-',
            EntryKind::Other => '?',
        }
    }

    fn from_file_type(file_type: fs::FileType) -> Self {
        if file_type.is_dir() {
            EntryKind::Directory
        } else if file_type.is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        }
    }
}

/// A single formatted directory entry
#[derive(Debug, Clone)]
pub struct DirEntryRecord {
    pub kind: EntryKind,
    /// Permission bits (`0o777` mask applied when rendering)
    pub mode: u32,
    /// `None` when the uid has no name
    pub owner: Option<String>,
    /// `None` when the gid has no name
    pub group: Option<String>,
    pub size: u64,
    pub modified: DateTime<Local>,
    pub name: String,
}

impl DirEntryRecord {
    /// Nine character `rwxrwxrwx` permission string
    pub fn permissions(&self) -> String {
        const BITS: [(u32, char); 9] = [
            (0o400, 'r'),
            (0o200, 'w'),
            (0o100, 'x'),
            (0o040, 'r'),
            (0o020, 'w'),
            (0o010, 'x'),
            (0o004, 'r'),
            (0o002, 'w'),
            (0o001, 'x'),
        ];
        BITS.iter()
            .map(|&(bit, c)| if self.mode & bit != 0 { c } else { '-' })
            .collect()
    }

    /// Decimal size for regular files, `-` for everything else
    pub fn size_field(&self) -> String {
        match self.kind {
            EntryKind::File => self.size.to_string(),
            _ => "-".to_string(),
        }
    }

    /// `Mon DD HH:MM` in local time
    pub fn timestamp(&self) -> String {
        self.modified.format("%b %d %H:%M").to_string()
    }

    /// The record as a wire line, CR/LF terminated
    pub fn to_line(&self) -> String {
        format!("{}\r\n", self)
    }

    fn from_entry(entry: &fs::DirEntry, names: &AccountNames) -> Self {
        let name = entry.file_name().to_string_lossy().into_owned();
        let kind = entry
            .file_type()
            .map(EntryKind::from_file_type)
            .unwrap_or(EntryKind::Other);

        // Follow symlinks like stat(2); dangling links fall back to the link itself
        let path = entry.path();
        let meta = fs::metadata(&path).or_else(|_| fs::symlink_metadata(&path));

        match meta {
            Ok(meta) => {
                let (mode, owner, group) = ownership(&meta, names);
                let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
                Self {
                    kind,
                    mode,
                    owner,
                    group,
                    size: meta.len(),
                    modified: DateTime::<Local>::from(modified),
                    name,
                }
            }
            Err(e) => {
                warn!(entry = %path.display(), error = %e, "Cannot stat directory entry");
                Self {
                    kind,
                    mode: 0,
                    owner: None,
                    group: None,
                    size: 0,
                    modified: DateTime::<Local>::from(SystemTime::UNIX_EPOCH),
                    name,
                }
            }
        }
    }
}

impl fmt::Display for DirEntryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{} {:>5} {:>5} {:>5} {:>10} {}",
            self.kind.indicator(),
            self.permissions(),
            self.owner.as_deref().unwrap_or(""),
            self.group.as_deref().unwrap_or(""),
            self.size_field(),
            self.timestamp(),
            self.name,
        )
    }
}

/// Iterate the entries of `dir` in the order the platform yields them.
///
/// `.` and `..` are not included. Entries that fail to read are skipped.
pub fn list_directory(dir: &Path) -> Result<impl Iterator<Item = DirEntryRecord>> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    let names = AccountNames::load();

    Ok(entries.filter_map(move |entry| match entry {
        Ok(entry) => Some(DirEntryRecord::from_entry(&entry, &names)),
        Err(e) => {
            warn!(error = %e, "Skipping unreadable directory entry");
            None
        }
    }))
}

#[cfg(unix)]
fn ownership(meta: &fs::Metadata, names: &AccountNames) -> (u32, Option<String>, Option<String>) {
    use std::os::unix::fs::MetadataExt;

    (meta.mode() & 0o777, names.user(meta.uid()), names.group(meta.gid()))
}

#[cfg(not(unix))]
fn ownership(meta: &fs::Metadata, _names: &AccountNames) -> (u32, Option<String>, Option<String>) {
    let mode = if meta.permissions().readonly() { 0o555 } else { 0o777 };
    (mode, None, None)
}

/// Snapshot of the system's user and group names, taken once per listing
#[derive(Debug, Default)]
pub struct AccountNames {
    users: HashMap<u32, String>,
    groups: HashMap<u32, String>,
}

impl AccountNames {
    #[cfg(unix)]
    pub fn load() -> Self {
        let users = Users::new_with_refreshed_list()
            .list()
            .iter()
            .map(|user| (**user.id(), user.name().to_string()))
            .collect();
        let groups = Groups::new_with_refreshed_list()
            .list()
            .iter()
            .map(|group| (**group.id(), group.name().to_string()))
            .collect();
        Self { users, groups }
    }

    #[cfg(not(unix))]
    pub fn load() -> Self {
        Self::default()
    }

    /// `None` when the uid has no account
    pub fn user(&self, uid: u32) -> Option<String> {
        self.users.get(&uid).cloned()
    }

    /// `None` when the gid has no group entry
    pub fn group(&self, gid: u32) -> Option<String> {
        self.groups.get(&gid).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(kind: EntryKind, name: &str) -> DirEntryRecord {
        DirEntryRecord {
            kind,
            mode: 0o754,
            owner: Some("alice".into()),
            group: Some("staff".into()),
            size: 1234,
            modified: Local.with_ymd_and_hms(2024, 3, 4, 17, 21, 0).unwrap(),
            name: name.into(),
        }
    }

    #[test]
    fn test_permission_string() {
        let rec = record(EntryKind::File, "a");
        assert_eq!(rec.permissions(), "rwxr-xr--");

        let none = DirEntryRecord { mode: 0, ..rec };
        assert_eq!(none.permissions(), "---------");
    }

    #[test]
    fn test_format_regular_file() {
        let rec = record(EntryKind::File, "notes.txt");
        assert_eq!(
            rec.to_line(),
            "-rwxr-xr-- alice staff  1234 Mar 04 17:21 notes.txt\r\n"
        );
    }

    #[test]
    fn test_format_directory_hides_size() {
        let rec = record(EntryKind::Directory, "src");
        assert_eq!(rec.to_string(), "drwxr-xr-- alice staff     - Mar 04 17:21 src");
    }

    #[test]
    fn test_format_unresolved_owner_falls_back_to_empty() {
        let rec = DirEntryRecord {
            owner: None,
            group: None,
            ..record(EntryKind::Other, "sock")
        };
        assert_eq!(rec.to_string(), "?rwxr-xr--                 - Mar 04 17:21 sock");
    }

    #[test]
    fn test_list_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("data.bin"), vec![7u8; 300]).unwrap();
        fs::create_dir(dir.path().join("child")).unwrap();

        let mut records: Vec<_> = list_directory(dir.path()).unwrap().collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(records.len(), 2);

        let child = &records[0];
        assert_eq!(child.name, "child");
        assert_eq!(child.kind, EntryKind::Directory);
        assert_eq!(child.size_field(), "-");
        assert!(child.to_string().starts_with('d'));

        let data = &records[1];
        assert_eq!(data.name, "data.bin");
        assert_eq!(data.kind, EntryKind::File);
        assert_eq!(data.size_field(), "300");
        assert_eq!(data.permissions().len(), 9);
        assert!(data.to_line().ends_with(" data.bin\r\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_current_user_resolves() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mine"), b"x").unwrap();
        let rec = list_directory(dir.path()).unwrap().next().unwrap();

        // Either a real name or the documented empty fallback, never garbage
        let owner = rec.owner.clone().unwrap_or_default();
        assert!(owner.chars().all(|c| !c.is_control()));
        assert!(rec.to_string().contains(&format!(" {:>5} ", owner)));
    }

    #[cfg(unix)]
    #[test]
    fn test_unknown_ids_have_no_name() {
        let names = AccountNames::load();
        assert_eq!(names.user(u32::MAX - 7), None);
        assert_eq!(names.group(u32::MAX - 7), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_root_account_resolves() {
        let names = AccountNames::load();
        assert_eq!(names.user(0).as_deref(), Some("root"));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            list_directory(&dir.path().join("gone")),
            Err(Error::NotFound(_))
        ));
    }
}

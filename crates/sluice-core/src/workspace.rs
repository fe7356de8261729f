//! Session working directory
//!
//! Every session owns its own current directory instead of sharing the
//! process one, so concurrent sessions can `CD` independently.

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Working directory of one session
#[derive(Debug, Clone)]
pub struct Workspace {
    cwd: PathBuf,
}

impl Workspace {
    /// Create a workspace rooted at `dir`, which must be an existing directory
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let cwd = dir.canonicalize().map_err(|e| Error::io(dir, e))?;
        if !cwd.is_dir() {
            return Err(Error::NotADirectory(cwd));
        }
        Ok(Self { cwd })
    }

    /// Current directory (always absolute and canonical)
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Resolve a client supplied path against the current directory.
    /// Absolute paths are returned unchanged.
    pub fn resolve(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }

    /// Change the current directory. On failure the current directory is
    /// left untouched.
    pub fn change_dir(&mut self, path: &str) -> Result<&Path> {
        if path.is_empty() {
            return Err(Error::NotFound(PathBuf::new()));
        }

        let target = self.resolve(path);
        let target = target.canonicalize().map_err(|e| Error::io(&target, e))?;
        if !target.is_dir() {
            return Err(Error::NotADirectory(target));
        }
        // Resolving `dir/.` needs search permission on `dir`, same as chdir(2)
        std::fs::metadata(target.join(".")).map_err(|e| Error::io(&target, e))?;

        debug!(from = %self.cwd.display(), to = %target.display(), "Changing directory");
        self.cwd = target;
        Ok(&self.cwd)
    }

    /// Size in bytes of a regular file the server can open for reading
    pub fn file_size(&self, path: &str) -> Result<u64> {
        let target = self.resolve(path);
        let file = std::fs::File::open(&target).map_err(|e| Error::io(&target, e))?;
        let meta = file.metadata().map_err(|e| Error::io(&target, e))?;
        if !meta.is_file() {
            return Err(Error::NotAFile(target));
        }
        Ok(meta.len())
    }
}

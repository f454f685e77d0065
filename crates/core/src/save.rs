//! Save-file access.
//!
//! The file is always handled whole: read fully into memory, or written to a
//! temporary sibling that then replaces the target in one rename.

use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{LibraryError, Result};

/// Directory under the user's data dir that holds the library file.
pub const DEFAULT_DATA_DIR: &str = "shelf";
/// File name of the library file inside [`DEFAULT_DATA_DIR`].
pub const DEFAULT_DATA_FILE: &str = "library.csv";

/// Handle on the flat file the library is persisted to.
#[derive(Debug, Clone)]
pub struct SaveFile {
    path: PathBuf,
}

impl SaveFile {
    /// Wrap the file at `path`; nothing is touched until read or write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under the user's data directory.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_DATA_DIR)
            .join(DEFAULT_DATA_FILE)
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file has been written yet.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the whole file.
    pub fn read(&self) -> Result<String> {
        let contents =
            fs::read_to_string(&self.path).map_err(|err| LibraryError::io(&self.path, err))?;
        debug!(path = %self.path.display(), bytes = contents.len(), "Save file read");
        Ok(contents)
    }

    /// Replace the file with `contents`, creating parent directories as needed.
    pub fn write(&self, contents: &str) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|err| LibraryError::io(&parent, err))?;

        let mut staged =
            NamedTempFile::new_in(&parent).map_err(|err| LibraryError::io(&parent, err))?;
        staged
            .write_all(contents.as_bytes())
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|err| LibraryError::io(staged.path(), err))?;
        staged
            .persist(&self.path)
            .map_err(|err| LibraryError::io(&self.path, err.error))?;
        debug!(path = %self.path.display(), bytes = contents.len(), "Save file written");
        Ok(())
    }
}

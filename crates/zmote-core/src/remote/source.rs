// ── Remote configuration sources ──

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::CoreError;

/// Where a remote configuration document comes from.
///
/// The watcher only needs a modification timestamp and the raw bytes, so
/// tests can substitute in-memory sources.
pub trait RemoteSource: Send + 'static {
    /// Human-readable location used in logs and errors.
    fn location(&self) -> String;

    /// Last modification time of the document.
    fn modified(&self) -> io::Result<SystemTime>;

    /// Read the whole document.
    fn read(&self) -> io::Result<Vec<u8>>;
}

/// A remote configuration file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    /// Wrap an existing, readable file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let readable = path.is_file() && File::open(path).is_ok();
        if !readable {
            return Err(CoreError::RemoteFile {
                path: path.display().to_string(),
                reason: "file does not exist or is not readable".into(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RemoteSource for FileSource {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn modified(&self) -> io::Result<SystemTime> {
        std::fs::metadata(&self.path)?.modified()
    }

    fn read(&self) -> io::Result<Vec<u8>> {
        std::fs::read(&self.path)
    }
}

//! The client's local `.lic` file.

use crate::storage::write_atomic;
use crate::LicvaultError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Handle to a license file on disk. Holds no file descriptor.
#[derive(Debug, Clone)]
pub struct LicenseFile {
    path: PathBuf,
}

impl LicenseFile {
    /// Point at `path`; the file need not exist yet.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a regular file exists at the path.
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the wire string.
    ///
    /// # Errors
    /// * `FileNotFound` - nothing at the path
    /// * `DecryptionError` - the contents are not text, or the file cannot be
    ///   read at all (permissions, I/O failure); a fresh download replaces it
    pub fn read(&self) -> Result<String, LicvaultError> {
        fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LicvaultError::FileNotFound(self.path.clone()),
            ErrorKind::InvalidData => {
                LicvaultError::DecryptionError("License file is not valid UTF-8".to_string())
            }
            _ => LicvaultError::DecryptionError(format!(
                "License file {} is unreadable: {}",
                self.path.display(),
                e
            )),
        })
    }

    /// Atomically replace the file with freshly downloaded contents.
    pub fn replace(&self, contents: &[u8]) -> Result<(), LicvaultError> {
        write_atomic(&self.path, contents)
    }
}

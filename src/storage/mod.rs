//! Local persistence: the client's `.lic` file and the issuer's master keyring.
//!
//! Every write goes to a temp file in the target directory and is renamed
//! into place, so readers see either the old or the new content.

pub mod keyring;
pub mod license_file;

use crate::LicvaultError;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Mode for files holding private key material.
#[cfg(unix)]
const PRIVATE_FILE_MODE: u32 = 0o600;

/// Replace `path` with `contents` via temp file + rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), LicvaultError> {
    write_atomic_with(path, contents, false)
}

/// [`write_atomic`] for secrets: the temp file is created owner-only
/// (0600 on unix) before any byte is written.
pub(crate) fn write_atomic_private(path: &Path, contents: &[u8]) -> Result<(), LicvaultError> {
    write_atomic_with(path, contents, true)
}

fn write_atomic_with(path: &Path, contents: &[u8], private: bool) -> Result<(), LicvaultError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)
        .map_err(|e| LicvaultError::StorageIO(format!("Failed to create {}: {}", dir.display(), e)))?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| LicvaultError::StorageIO(format!("Invalid file path: {}", path.display())))?;
    let temp_path = dir.join(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()));

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(PRIVATE_FILE_MODE);
    }
    #[cfg(not(unix))]
    let _ = private;

    let written = options
        .open(&temp_path)
        .and_then(|mut file| file.write_all(contents).and_then(|()| file.sync_all()));
    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(LicvaultError::StorageIO(format!("Failed to write temp file: {}", e)));
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(LicvaultError::StorageIO(format!(
            "Failed to rename into {}: {}",
            path.display(),
            e
        )));
    }

    Ok(())
}

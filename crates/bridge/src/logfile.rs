//! Rolling log file.
//!
//! One plain-UTF-8, line-based log file lives in the project root. At
//! startup it is rotated to a `.old` sibling once it exceeds the
//! configured size; the `.old` file is overwritten each rotation.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Rename `path` to its `.old` sibling when it exceeds `max_bytes`.
/// Returns `true` when a rotation happened.
pub fn rotate_if_large(path: &Path, max_bytes: u64) -> io::Result<bool> {
    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    if size <= max_bytes {
        return Ok(false);
    }
    std::fs::rename(path, old_sibling(path))?;
    Ok(true)
}

/// Open the log file for appending, creating it if missing.
pub fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn old_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".old");
    path.with_file_name(name)
}

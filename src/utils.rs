//! Utility functions for shadowtrail
//!
//! Hashing helpers and the small set of filesystem operations the shadow
//! store needs: recursive directory creation that tolerates concurrent
//! creators, atomic file replacement, and reads where a missing file is an
//! empty result rather than an error.
//!
//! All functions are safe to call from several threads at once.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use tracing::trace;

/// Hash arbitrary data using SHA-256
///
/// Returns the digest as a 64-character lowercase hexadecimal string. The
/// same input always produces the same output.
///
/// # Example
///
/// ```rust,ignore
/// use crate::utils::hash_data;
///
/// let hash = hash_data(b"/work/app");
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, hash_data(b"/work/app"));
/// ```
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Create a directory and all of its parents
///
/// An already existing directory is not an error, including one created by
/// another process between the check and the call.
pub fn ensure_dir(path: &Path) -> Result<()> {
    match fs::create_dir_all(path) {
        Ok(()) => {
            trace!("Ensured directory {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Read a file to a string, treating a missing file as empty
///
/// Any error other than "not found" is returned.
pub fn read_to_string_or_empty(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            trace!("{:?} does not exist, using empty content", path);
            Ok(String::new())
        }
        Err(e) => Err(e.into()),
    }
}

/// Atomic file write (write to temp file then rename)
///
/// The target is either the old content or the complete new content, never
/// a partial write. Every call gets its own uniquely named temporary file in
/// the target's directory, so concurrent writers of the same file never share
/// one; the last rename wins.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = tempfile::Builder::new()
        .prefix(".shadowtrail-")
        .suffix(".tmp")
        .tempfile_in(dir)?;
    temp.write_all(content)?;
    temp.persist(path).map_err(|e| e.error)?;
    trace!("Wrote {} bytes to {:?}", content.len(), path);
    Ok(())
}

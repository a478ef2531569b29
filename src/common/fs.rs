//! Scoped file IO for a single watermark call.
//!
//! Inputs are read whole and read-only. Outputs are staged in a temporary file
//! next to the destination and renamed into place only after every byte has
//! been written, so a failed or interrupted call never leaves a partial file at
//! the destination path.

use crate::common::error::{Result, WatermarkError};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

/// Read the whole input file, mapping a missing path to `InputNotFound`.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    match std::fs::read(path) {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(WatermarkError::InputNotFound(path.to_path_buf()))
        },
        Err(e) => Err(WatermarkError::Io(e)),
    }
}

/// Write `bytes` to `path` atomically.
///
/// The staging file lives in the destination directory so the final rename
/// never crosses a filesystem boundary. On any error the staging file is
/// removed when it drops.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir)?;
    staged.write_all(bytes)?;
    staged.as_file().sync_all()?;
    staged
        .persist(path)
        .map_err(|e| WatermarkError::Io(e.error))?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "output persisted");
    Ok(())
}

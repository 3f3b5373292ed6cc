//! Atomic file replacement.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::{Result, StoreError};

/// Write `contents` to `path` via a temp file in the same directory and a
/// rename, so readers see either the old or the new file, never a mix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir).map_err(StoreError::WriteFailed)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(StoreError::WriteFailed)?;
    tmp.write_all(contents).map_err(StoreError::WriteFailed)?;
    tmp.as_file().sync_all().map_err(StoreError::WriteFailed)?;
    tmp.persist(path)
        .map_err(|e| StoreError::WriteFailed(e.error))?;
    Ok(())
}

//! Bundle fingerprints.
//!
//! A fingerprint is the SHA-256 of sorted `"<name> <sha256>"` lines, one per
//! item, so it does not depend on the order items were found in.

use std::fs::File;
use std::path::Path;

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::core::types::Fingerprint;
use crate::error::{Result, SyncError};

/// Hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Hex SHA-256 of a file's contents.
pub fn file_hash(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    std::io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Combine `(name, hash)` pairs into a single fingerprint.
pub fn combine<I, N, H>(entries: I) -> Fingerprint
where
    I: IntoIterator<Item = (N, H)>,
    N: AsRef<str>,
    H: AsRef<str>,
{
    let mut lines: Vec<String> = entries
        .into_iter()
        .map(|(name, hash)| format!("{} {}", name.as_ref(), hash.as_ref()))
        .collect();
    lines.sort();
    sha256_hex(lines.join("\n").as_bytes())
}

/// Fingerprint every regular file below `dir`, named by relative path.
pub fn bundle_fingerprint(dir: &Path) -> Result<Fingerprint> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1) {
        let entry = entry.map_err(|e| SyncError::Bundle(e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| SyncError::Bundle(e.to_string()))?;
        let hash = file_hash(entry.path()).map_err(|e| SyncError::Bundle(e.to_string()))?;
        entries.push((rel.to_string_lossy().replace('\\', "/"), hash));
    }
    Ok(combine(entries))
}

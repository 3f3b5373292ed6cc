//! Plaintext store for public vars, meant to be committed.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use zeroize::Zeroizing;

use super::VarStore;
use crate::core::atomic::write_atomic;
use crate::core::constants;
use crate::core::domain::VarKey;
use crate::error::{Result, StoreError};

/// Public vars under `<repo>/vars/public/<key>/value`.
#[derive(Debug, Clone)]
pub struct RepoStore {
    root: PathBuf,
}

impl RepoStore {
    pub fn open(repo: &Path) -> Self {
        Self {
            root: repo.join(constants::VARS_DIR).join(constants::PUBLIC_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn value_path(&self, key: &VarKey) -> PathBuf {
        self.root.join(key.rel_path()).join(constants::VALUE_FILE)
    }
}

impl VarStore for RepoStore {
    fn name(&self) -> &'static str {
        "in-repo"
    }

    fn exists(&self, key: &VarKey) -> Result<bool> {
        Ok(self.value_path(key).is_file())
    }

    fn get(&self, key: &VarKey) -> Result<Zeroizing<Vec<u8>>> {
        let path = self.value_path(key);
        match fs::read(&path) {
            Ok(data) => Ok(Zeroizing::new(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()).into())
            }
            Err(e) => Err(StoreError::ReadFailed(e).into()),
        }
    }

    fn set(&self, key: &VarKey, value: &[u8]) -> Result<Option<PathBuf>> {
        let path = self.value_path(key);
        if fs::read(&path).map(|old| old == value).unwrap_or(false) {
            debug!(key = %key, "public value unchanged");
            return Ok(Some(path));
        }
        write_atomic(&path, value)?;
        debug!(key = %key, "public value written");
        Ok(Some(path))
    }

    fn delete(&self, key: &VarKey) -> Result<()> {
        let dir = self.root.join(key.rel_path());
        if !dir.exists() {
            return Err(StoreError::NotFound(key.to_string()).into());
        }
        fs::remove_dir_all(&dir).map_err(StoreError::WriteFailed)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_and_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = RepoStore::open(tmp.path());
        let key = VarKey::machine("m1", "ssh", "id_ed25519.pub");

        let path = store.set(&key, b"ssh-ed25519 AAAA").unwrap().unwrap();
        assert_eq!(
            path,
            tmp.path()
                .join("vars/public/per-machine/m1/ssh/id_ed25519.pub/value")
        );
        assert!(store.exists(&key).unwrap());
        assert_eq!(store.get(&key).unwrap().as_slice(), b"ssh-ed25519 AAAA");
    }

    #[test]
    fn test_identical_write_keeps_mtime() {
        let tmp = TempDir::new().unwrap();
        let store = RepoStore::open(tmp.path());
        let key = VarKey::shared("ca", "cert");

        let path = store.set(&key, b"cert").unwrap().unwrap();
        let before = fs::metadata(&path).unwrap().modified().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        store.set(&key, b"cert").unwrap();
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
    }

    #[test]
    fn test_missing_value() {
        let tmp = TempDir::new().unwrap();
        let store = RepoStore::open(tmp.path());
        let key = VarKey::shared("ca", "cert");
        assert!(!store.exists(&key).unwrap());
        let err = store.get(&key).unwrap_err();
        assert!(err.to_string().contains("var not found"));
        assert!(store.delete(&key).is_err());
    }
}

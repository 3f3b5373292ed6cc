//! In-memory store for tests and throwaway runs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use parking_lot::RwLock;
use zeroize::Zeroizing;

use super::VarStore;
use crate::core::domain::VarKey;
use crate::error::{Result, StoreError};

/// Values live only as long as the store.
#[derive(Default)]
pub struct EphemeralStore {
    values: RwLock<BTreeMap<VarKey, Zeroizing<Vec<u8>>>>,
}

impl EphemeralStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl std::fmt::Debug for EphemeralStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EphemeralStore")
            .field("keys", &self.values.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl VarStore for EphemeralStore {
    fn name(&self) -> &'static str {
        "ephemeral"
    }

    fn exists(&self, key: &VarKey) -> Result<bool> {
        Ok(self.values.read().contains_key(key))
    }

    fn get(&self, key: &VarKey) -> Result<Zeroizing<Vec<u8>>> {
        self.values
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()).into())
    }

    fn set(&self, key: &VarKey, value: &[u8]) -> Result<Option<PathBuf>> {
        self.values
            .write()
            .insert(key.clone(), Zeroizing::new(value.to_vec()));
        Ok(None)
    }

    fn delete(&self, key: &VarKey) -> Result<()> {
        self.values
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()).into())
    }
}

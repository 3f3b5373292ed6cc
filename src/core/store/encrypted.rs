//! age-encrypted secret store.
//!
//! One unit per secret at `vars/secret/<key>/secret.json`, holding the
//! armored ciphertext and the recipient set it was encrypted to. Recording
//! the recipients lets the store notice when the registry moved on.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::{StoreContext, VarStore};
use crate::core::access::{AccessControl, Principal, Reencrypt};
use crate::core::atomic::write_atomic;
use crate::core::cipher;
use crate::core::constants;
use crate::core::domain::VarKey;
use crate::core::keys::KeyRing;
use crate::core::lock::FileLock;
use crate::core::types::PublicKey;
use crate::error::{AccessError, CipherError, Error, Result, StoreError};

const UNIT_VERSION: u32 = 1;

/// On-disk form of one secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SecretUnit {
    version: u32,
    recipients: BTreeSet<PublicKey>,
    data: String,
}

/// Secrets encrypted to the recipient set resolved by the access registry.
pub struct EncryptedStore {
    root: PathBuf,
    lock_path: PathBuf,
    access: Arc<AccessControl>,
    keys: RwLock<Option<KeyRing>>,
}

impl EncryptedStore {
    pub fn open(ctx: &StoreContext) -> Self {
        Self::new(&ctx.repo, Arc::clone(&ctx.access), ctx.keys.clone())
    }

    /// Store rooted at `<repo>/vars/secret`. Without `keys` the operator key
    /// ring is loaded on first decryption.
    pub fn new(repo: &Path, access: Arc<AccessControl>, keys: Option<KeyRing>) -> Self {
        let vars = repo.join(constants::VARS_DIR);
        Self {
            root: vars.join(constants::SECRET_DIR),
            lock_path: vars.join(constants::LOCK_DIR).join("secret-store.lock"),
            access,
            keys: RwLock::new(keys),
        }
    }

    /// Recipients a stored secret is currently encrypted to.
    pub fn recipients(&self, key: &VarKey) -> Result<Option<BTreeSet<PublicKey>>> {
        Ok(self.read_unit(key)?.map(|unit| unit.recipients))
    }

    fn unit_path(&self, key: &VarKey) -> PathBuf {
        self.root.join(key.rel_path()).join(constants::SECRET_FILE)
    }

    fn keyring(&self) -> Result<KeyRing> {
        if let Some(keys) = self.keys.read().as_ref() {
            return Ok(keys.clone());
        }
        let loaded = KeyRing::load()?;
        *self.keys.write() = Some(loaded.clone());
        Ok(loaded)
    }

    fn lock(&self) -> Result<FileLock> {
        FileLock::acquire(&self.lock_path)
    }

    fn read_unit(&self, key: &VarKey) -> Result<Option<SecretUnit>> {
        let path = self.unit_path(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::ReadFailed(e).into()),
        };
        let unit: SecretUnit = serde_json::from_str(&contents).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        if unit.version != UNIT_VERSION {
            return Err(StoreError::Corrupt {
                key: key.to_string(),
                reason: format!("unsupported version {}", unit.version),
            }
            .into());
        }
        Ok(Some(unit))
    }

    fn write_unit(&self, key: &VarKey, unit: &SecretUnit) -> Result<PathBuf> {
        let path = self.unit_path(key);
        let json = serde_json::to_string_pretty(unit).map_err(|e| StoreError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        write_atomic(&path, format!("{}\n", json).as_bytes())?;
        Ok(path)
    }

    fn open_unit(&self, key: &VarKey, unit: &SecretUnit) -> Result<Zeroizing<Vec<u8>>> {
        let keys = self.keyring()?;
        if !keys.holds_any(&unit.recipients) {
            return Err(AccessError::AccessDenied(key.to_string()).into());
        }
        cipher::decrypt(&unit.data, keys.identities()).map_err(|e| match e {
            Error::Cipher(CipherError::NoMatchingKey) => {
                AccessError::AccessDenied(key.to_string()).into()
            }
            other => other,
        })
    }

    fn seal(plaintext: &[u8], recipients: &BTreeSet<PublicKey>) -> Result<SecretUnit> {
        let parsed = recipients
            .iter()
            .map(|r| cipher::parse_recipient(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(SecretUnit {
            version: UNIT_VERSION,
            recipients: recipients.clone(),
            data: cipher::encrypt(plaintext, &parsed)?,
        })
    }
}

impl std::fmt::Debug for EncryptedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedStore")
            .field("root", &self.root)
            .finish()
    }
}

impl VarStore for EncryptedStore {
    fn name(&self) -> &'static str {
        "age"
    }

    fn exists(&self, key: &VarKey) -> Result<bool> {
        Ok(self.unit_path(key).is_file())
    }

    fn get(&self, key: &VarKey) -> Result<Zeroizing<Vec<u8>>> {
        let unit = self
            .read_unit(key)?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        self.open_unit(key, &unit)
    }

    fn set(&self, key: &VarKey, value: &[u8]) -> Result<Option<PathBuf>> {
        let secret = key.secret_ref();
        // Resolve before taking the store lock: registry before store, always.
        let recipients = self.access.resolve_recipients(&secret);
        if recipients.is_empty() {
            return Err(AccessError::EmptyRecipients(secret).into());
        }

        let _lock = self.lock()?;
        if let Some(unit) = self.read_unit(key)? {
            if unit.recipients == recipients {
                if let Ok(current) = self.open_unit(key, &unit) {
                    if current.as_slice() == value {
                        debug!(key = %key, "secret unchanged");
                        return Ok(Some(self.unit_path(key)));
                    }
                }
            }
        }

        let unit = Self::seal(value, &recipients)?;
        let path = self.write_unit(key, &unit)?;
        debug!(key = %key, recipients = recipients.len(), "secret written");
        Ok(Some(path))
    }

    fn delete(&self, key: &VarKey) -> Result<()> {
        let _lock = self.lock()?;
        let dir = self.root.join(key.rel_path());
        if !dir.join(constants::SECRET_FILE).exists() {
            return Err(StoreError::NotFound(key.to_string()).into());
        }
        fs::remove_dir_all(&dir).map_err(StoreError::WriteFailed)?;
        debug!(key = %key, "secret deleted");
        Ok(())
    }

    fn prepare(&self, key: &VarKey, owners: &[Principal]) -> Result<()> {
        let secret = key.secret_ref();
        if self.access.ensure_owner(&secret, owners)?.is_empty() {
            return Err(AccessError::EmptyRecipients(secret).into());
        }
        Ok(())
    }

    fn needs_refresh(&self, key: &VarKey) -> Result<bool> {
        match self.read_unit(key)? {
            Some(unit) => Ok(unit.recipients != self.access.resolve_recipients(&key.secret_ref())),
            None => Ok(false),
        }
    }

    fn refresh(&self, key: &VarKey) -> Result<()> {
        let secret = key.secret_ref();
        let recipients = self.access.resolve_recipients(&secret);
        if recipients.is_empty() {
            return Err(AccessError::EmptyRecipients(secret).into());
        }
        self.reencrypt_for(&secret, &recipients)
    }

    fn reencryptor(&self) -> &dyn Reencrypt {
        self
    }
}

impl Reencrypt for EncryptedStore {
    fn recorded_recipients(&self, secret: &str) -> Result<Option<BTreeSet<PublicKey>>> {
        // Grants may name keys this store never saw in VarKey form.
        match secret.parse::<VarKey>() {
            Ok(key) => self.recipients(&key),
            Err(_) => Ok(None),
        }
    }

    fn can_decrypt(&self, recipients: &BTreeSet<PublicKey>) -> bool {
        self.keyring()
            .map(|keys| keys.holds_any(recipients))
            .unwrap_or(false)
    }

    fn reencrypt_for(&self, secret: &str, recipients: &BTreeSet<PublicKey>) -> Result<()> {
        let key: VarKey = secret.parse()?;
        let _lock = self.lock()?;
        let Some(unit) = self.read_unit(&key)? else {
            return Ok(());
        };
        if unit.recipients == *recipients {
            return Ok(());
        }
        let plaintext = self.open_unit(&key, &unit)?;
        let sealed = Self::seal(&plaintext, recipients)?;
        self.write_unit(&key, &sealed)?;
        info!(key = %key, recipients = recipients.len(), "secret re-encrypted");
        Ok(())
    }
}

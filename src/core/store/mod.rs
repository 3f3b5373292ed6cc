//! Var storage backends.
//!
//! Every backend implements [`VarStore`]. The fleet config names a backend by
//! tag and [`StoreKind`] turns the tag into an instance.
//!
//! ## Adding a New Storage Backend
//!
//! 1. Implement [`VarStore`] in a new file
//! 2. Add a [`StoreKind`] variant with its tag
//! 3. Construct it in [`StoreKind::open`]

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use tracing::debug;
use zeroize::Zeroizing;

use crate::core::access::{AccessControl, NoSecrets, Principal, Reencrypt};
use crate::core::domain::{Var, VarKey};
use crate::core::keys::KeyRing;
use crate::core::types::Fingerprint;
use crate::error::{ConfigError, Result, StoreError};

mod encrypted;
mod memory;
mod password;
mod repo;

pub use encrypted::EncryptedStore;
pub use memory::EphemeralStore;
pub use password::PasswordStore;
pub use repo::RepoStore;

/// Storage for var values.
///
/// Every backend must round-trip `set` then `get`/`exists` for the same key.
pub trait VarStore: Send + Sync {
    /// Backend tag, as written in `fleet.toml`.
    fn name(&self) -> &'static str;

    fn exists(&self, key: &VarKey) -> Result<bool>;

    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the key is absent.
    fn get(&self, key: &VarKey) -> Result<Zeroizing<Vec<u8>>>;

    /// Write a value. Returns the on-disk location if there is one.
    fn set(&self, key: &VarKey, value: &[u8]) -> Result<Option<PathBuf>>;

    fn delete(&self, key: &VarKey) -> Result<()>;

    /// Called before the first `set` of a key with the machines owning it.
    fn prepare(&self, _key: &VarKey, _owners: &[Principal]) -> Result<()> {
        Ok(())
    }

    /// Whether a stored value must be rewritten without changing it
    /// (for example because its recipients changed).
    fn needs_refresh(&self, _key: &VarKey) -> Result<bool> {
        Ok(false)
    }

    /// Rewrite a stored value in place.
    fn refresh(&self, _key: &VarKey) -> Result<()> {
        Ok(())
    }

    /// Backend-specific change marker for `keys`, if the backend has one.
    fn fingerprint(&self, _keys: &[VarKey]) -> Result<Option<Fingerprint>> {
        Ok(None)
    }

    /// Re-encryption hook used by the access registry.
    fn reencryptor(&self) -> &dyn Reencrypt {
        &NoSecrets
    }

    /// Materialize `keys` as `<target_dir>/<generator>/<file>`.
    fn upload(&self, keys: &[VarKey], target_dir: &Path) -> Result<()> {
        for key in keys {
            let value = self.get(key)?;
            let path = target_dir.join(&key.generator).join(&key.file);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(StoreError::WriteFailed)?;
            }
            fs::write(&path, value.as_slice()).map_err(StoreError::WriteFailed)?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&path, fs::Permissions::from_mode(0o600))
                    .map_err(StoreError::WriteFailed)?;
            }
        }
        debug!(store = self.name(), files = keys.len(), "bundle materialized");
        Ok(())
    }
}

/// The secret and public store of a fleet.
#[derive(Clone)]
pub struct Stores {
    pub secret: Arc<dyn VarStore>,
    pub public: Arc<dyn VarStore>,
}

impl Stores {
    /// Store a var belongs in, by its `secret` flag.
    pub fn for_var(&self, var: &Var) -> &dyn VarStore {
        if var.secret {
            self.secret.as_ref()
        } else {
            self.public.as_ref()
        }
    }
}

impl fmt::Debug for Stores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stores")
            .field("secret", &self.secret.name())
            .field("public", &self.public.name())
            .finish()
    }
}

/// Everything a backend may need when it is opened.
#[derive(Debug, Clone)]
pub struct StoreContext {
    /// Repository root holding `fleet.toml`.
    pub repo: PathBuf,
    pub access: Arc<AccessControl>,
    /// Operator keys; loaded lazily by the encrypted store when `None`.
    pub keys: Option<KeyRing>,
}

/// Backend tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Age,
    PasswordStore,
    InRepo,
    Ephemeral,
}

impl StoreKind {
    pub const ALL: [StoreKind; 4] = [
        StoreKind::Age,
        StoreKind::PasswordStore,
        StoreKind::InRepo,
        StoreKind::Ephemeral,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            StoreKind::Age => "age",
            StoreKind::PasswordStore => "password-store",
            StoreKind::InRepo => "in-repo",
            StoreKind::Ephemeral => "ephemeral",
        }
    }

    /// Whether values written here stay encrypted at rest.
    pub fn holds_secrets(self) -> bool {
        !matches!(self, StoreKind::InRepo)
    }

    pub fn open(self, ctx: &StoreContext) -> Result<Arc<dyn VarStore>> {
        debug!(backend = self.tag(), "opening store");
        let store: Arc<dyn VarStore> = match self {
            StoreKind::Age => Arc::new(EncryptedStore::open(ctx)),
            StoreKind::PasswordStore => Arc::new(PasswordStore::from_env()?),
            StoreKind::InRepo => Arc::new(RepoStore::open(&ctx.repo)),
            StoreKind::Ephemeral => Arc::new(EphemeralStore::new()),
        };
        Ok(store)
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for StoreKind {
    type Err = ConfigError;

    fn from_str(tag: &str) -> std::result::Result<Self, ConfigError> {
        StoreKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| ConfigError::UnknownStore {
                tag: tag.to_string(),
                supported: StoreKind::ALL
                    .iter()
                    .map(|k| k.tag())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

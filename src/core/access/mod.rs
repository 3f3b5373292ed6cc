//! Access control: who can decrypt which secret.
//!
//! [`AccessControl`] owns the [`Registry`] persisted at `vars/access.toml`.
//! Every mutation that changes the recipient set of a stored secret
//! re-encrypts that secret to the new set before the registry is committed.
//! Mutations hold `vars/.locks/access.lock` and re-read the file first, so
//! separate invocations never write back each other's stale copies.

mod principal;
mod registry;

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::core::atomic::write_atomic;
use crate::core::constants;
use crate::core::lock::FileLock;
use crate::core::types::{PublicKey, SecretRef};
use crate::error::{AccessError, ConfigError, Result, StoreError};

pub use principal::{Identity, IdentityKind, Principal};
pub use registry::Registry;

/// Stored secrets as seen by the registry.
///
/// Implemented by stores that record recipients next to each secret.
/// Implementations must not call back into [`AccessControl`]: they are invoked
/// while the registry write lock is held.
pub trait Reencrypt {
    /// Recipients recorded for a stored secret, `None` if it is not stored.
    fn recorded_recipients(&self, secret: &str) -> Result<Option<BTreeSet<PublicKey>>>;

    /// Whether the operator can decrypt a secret recorded for `recipients`.
    fn can_decrypt(&self, recipients: &BTreeSet<PublicKey>) -> bool;

    /// Decrypt a stored secret and encrypt it again for exactly `recipients`.
    fn reencrypt_for(&self, secret: &str, recipients: &BTreeSet<PublicKey>) -> Result<()>;
}

/// Stores that hold no encrypted secrets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSecrets;

impl Reencrypt for NoSecrets {
    fn recorded_recipients(&self, _secret: &str) -> Result<Option<BTreeSet<PublicKey>>> {
        Ok(None)
    }

    fn can_decrypt(&self, _recipients: &BTreeSet<PublicKey>) -> bool {
        true
    }

    fn reencrypt_for(&self, _secret: &str, _recipients: &BTreeSet<PublicKey>) -> Result<()> {
        Ok(())
    }
}

/// Persistent access registry.
#[derive(Debug)]
pub struct AccessControl {
    path: PathBuf,
    lock_path: PathBuf,
    registry: RwLock<Registry>,
}

impl AccessControl {
    /// Open the registry at `path`. A missing file is an empty registry.
    pub fn open(path: &Path) -> Result<Self> {
        let registry = read(path)?;
        let lock_path = path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(constants::LOCK_DIR)
            .join("access.lock");

        Ok(Self {
            path: path.to_path_buf(),
            lock_path,
            registry: RwLock::new(registry),
        })
    }

    /// Copy of the current registry.
    pub fn snapshot(&self) -> Registry {
        self.registry.read().clone()
    }

    /// Public keys allowed to decrypt `secret`.
    pub fn resolve_recipients(&self, secret: &str) -> BTreeSet<PublicKey> {
        self.registry.read().resolve(secret)
    }

    /// Principals granted on `secret`.
    pub fn grants(&self, secret: &str) -> BTreeSet<Principal> {
        self.registry.read().grants(secret)
    }

    /// Register a user or machine key.
    ///
    /// Replacing a key requires `force` and re-encrypts every secret that
    /// identity can read. Returns `true` if anything changed.
    pub fn add_identity(
        &self,
        kind: IdentityKind,
        name: &str,
        key: &str,
        force: bool,
        store: &dyn Reencrypt,
    ) -> Result<bool> {
        let changed = self.update(store, |registry| {
            registry.set_identity(kind, name, key, force)
        })?;
        if changed {
            info!(identity = %Principal::identity(kind, name), "identity registered");
        }
        Ok(changed)
    }

    /// Remove a user or machine together with its memberships and grants.
    pub fn remove_identity(&self, principal: &Principal, store: &dyn Reencrypt) -> Result<()> {
        self.update(store, |registry| registry.remove_identity(principal))?;
        info!(identity = %principal, "identity removed");
        Ok(())
    }

    /// Add a user or machine to a group.
    pub fn add_member(&self, group: &str, member: &Principal, store: &dyn Reencrypt) -> Result<bool> {
        self.update(store, |registry| registry.add_member(group, member))
    }

    /// Remove a user or machine from a group.
    pub fn remove_member(&self, group: &str, member: &Principal, store: &dyn Reencrypt) -> Result<()> {
        self.update(store, |registry| registry.remove_member(group, member))
    }

    /// Allow `principal` to decrypt `secret`.
    pub fn grant(&self, secret: &str, principal: &Principal, store: &dyn Reencrypt) -> Result<()> {
        self.update(store, |registry| {
            registry.require(principal)?;
            registry
                .grants
                .entry(secret.to_string())
                .or_default()
                .insert(principal.clone());
            Ok(())
        })?;
        info!(secret, principal = %principal, "granted");
        Ok(())
    }

    /// Stop `principal` from decrypting `secret` going forward.
    ///
    /// Fails with `EmptyRecipients` if nobody would be left; delete the
    /// secret instead.
    pub fn revoke(&self, secret: &str, principal: &Principal, store: &dyn Reencrypt) -> Result<()> {
        self.update(store, |registry| {
            registry.require(principal)?;
            let removed = registry
                .grants
                .get_mut(secret)
                .map(|principals| principals.remove(principal))
                .unwrap_or(false);
            if !removed {
                return Err(AccessError::UnknownSecret(format!("{} (for {})", secret, principal)).into());
            }
            if !registry.has_grants(secret) {
                return Err(AccessError::EmptyRecipients(secret.to_string()).into());
            }
            Ok(())
        })?;
        info!(secret, principal = %principal, "revoked");
        Ok(())
    }

    /// Replace the principals granted to every new secret.
    pub fn set_default_grants(&self, principals: BTreeSet<Principal>) -> Result<()> {
        self.update(&NoSecrets, |registry| {
            for principal in &principals {
                registry.require(principal)?;
            }
            registry.default_grants = principals.clone();
            Ok(())
        })
    }

    /// Make sure `secret` has grants before it is encrypted and return its
    /// recipient set.
    ///
    /// A secret without grants is seeded from the default grants and its
    /// registered `owners`. Existing grants are never widened here.
    pub fn ensure_owner(&self, secret: &str, owners: &[Principal]) -> Result<BTreeSet<PublicKey>> {
        let mut registry = self.registry.write();
        let _lock = self.reload(&mut registry)?;
        if registry.has_grants(secret) {
            return Ok(registry.resolve(secret));
        }

        let mut next = registry.clone();
        if next.ensure_grants(secret, owners) {
            self.save(&next)?;
            *registry = next;
            debug!(secret, "grants seeded");
        }
        Ok(registry.resolve(secret))
    }

    /// Drop every grant on a deleted secret.
    pub fn forget(&self, secret: &str) -> Result<()> {
        let mut registry = self.registry.write();
        let _lock = self.reload(&mut registry)?;
        if registry.grants.contains_key(secret) {
            let mut next = registry.clone();
            next.grants.remove(secret);
            self.save(&next)?;
            *registry = next;
            debug!(secret, "grants dropped");
        }
        Ok(())
    }

    /// Apply `change` to a fresh copy of the registry, re-encrypt every
    /// stored secret whose recipient set changed, then commit.
    ///
    /// If a re-encryption fails, the secrets already rewritten are sealed
    /// back to the recipients they had and nothing is committed.
    fn update<T>(
        &self,
        store: &dyn Reencrypt,
        change: impl FnOnce(&mut Registry) -> Result<T>,
    ) -> Result<T> {
        let mut registry = self.registry.write();
        let _lock = self.reload(&mut registry)?;
        let mut next = registry.clone();
        let value = change(&mut next)?;

        let secrets: BTreeSet<&SecretRef> = registry.grants.keys().chain(next.grants.keys()).collect();
        let mut pending = BTreeMap::new();
        for secret in secrets {
            let before = registry.resolve(secret);
            let after = next.resolve(secret);
            if before == after {
                continue;
            }
            let Some(recorded) = store.recorded_recipients(secret)? else {
                continue;
            };
            if after.is_empty() {
                return Err(AccessError::EmptyRecipients(secret.clone()).into());
            }
            if !store.can_decrypt(&recorded) {
                return Err(AccessError::AccessDenied(secret.clone()).into());
            }
            pending.insert(secret.clone(), (recorded, after));
        }

        let mut done: Vec<(&SecretRef, &BTreeSet<PublicKey>)> = Vec::new();
        for (secret, (recorded, recipients)) in &pending {
            debug!(secret = %secret, recipients = recipients.len(), "re-encrypting");
            if let Err(e) = store.reencrypt_for(secret, recipients) {
                warn!(secret = %secret, "re-encryption failed: {}", e);
                roll_back(store, &done);
                return Err(e);
            }
            done.push((secret, recorded));
        }

        if *registry != next {
            if let Err(e) = self.save(&next) {
                roll_back(store, &done);
                return Err(e);
            }
            *registry = next;
        }
        Ok(value)
    }

    /// Take the file lock and replace the in-memory copy with what is on disk.
    fn reload(&self, registry: &mut Registry) -> Result<FileLock> {
        let lock = FileLock::acquire(&self.lock_path)?;
        *registry = read(&self.path)?;
        Ok(lock)
    }

    fn save(&self, registry: &Registry) -> Result<()> {
        let contents = toml::to_string_pretty(registry).map_err(ConfigError::Serialize)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::WriteFailed)?;
        }
        write_atomic(&self.path, contents.as_bytes())
    }
}

fn read(path: &Path) -> Result<Registry> {
    if !path.exists() {
        debug!(path = %path.display(), "no access registry yet");
        return Ok(Registry::default());
    }
    let contents = fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
    Ok(toml::from_str(&contents).map_err(ConfigError::Parse)?)
}

/// Seal already rewritten secrets back to the recipients they had.
fn roll_back(store: &dyn Reencrypt, done: &[(&SecretRef, &BTreeSet<PublicKey>)]) {
    for (secret, recipients) in done.iter().rev() {
        if let Err(e) = store.reencrypt_for(secret, recipients) {
            warn!(secret = %secret, "rollback failed: {}", e);
        }
    }
}

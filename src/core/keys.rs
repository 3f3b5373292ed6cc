//! Operator keys.
//!
//! The key ring holds the private age identities of whoever runs fleetvars.
//! They are only used to decrypt; every encryption goes to the recipient set
//! resolved by the access registry.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use age::secrecy::ExposeSecret;
use age::x25519;
use tracing::{debug, warn};

use crate::core::cipher;
use crate::core::constants;
use crate::core::types::PublicKey;
use crate::error::{Result, StoreError, ValidationError};

/// Private identities available for decryption.
#[derive(Clone, Default)]
pub struct KeyRing {
    identities: Vec<x25519::Identity>,
}

impl KeyRing {
    /// Build a key ring from already loaded identities.
    pub fn from_identities(identities: Vec<x25519::Identity>) -> Self {
        Self { identities }
    }

    /// Load operator keys.
    ///
    /// Looks at `FLEETVARS_AGE_KEY` (inline keys), then
    /// `FLEETVARS_AGE_KEY_FILE`, then `<config dir>/fleetvars/keys.txt`.
    /// Keys from every source that is present are combined.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoPrivateKey` if no source yields a key, or
    /// `StoreError::InvalidFormat` for a malformed key line.
    pub fn load() -> Result<Self> {
        let mut identities = Vec::new();
        let mut looked_in = Vec::new();

        if let Ok(inline) = std::env::var(constants::ENV_AGE_KEY) {
            debug!("loading keys from {}", constants::ENV_AGE_KEY);
            identities.extend(parse_keys(&inline)?);
        }
        looked_in.push(format!("${}", constants::ENV_AGE_KEY));

        let file = match std::env::var_os(constants::ENV_AGE_KEY_FILE) {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::default_path(),
        };
        if let Some(path) = file {
            if path.exists() {
                identities.extend(Self::read_file(&path)?);
            }
            looked_in.push(path.display().to_string());
        }

        if identities.is_empty() {
            return Err(StoreError::NoPrivateKey(looked_in.join(", ")).into());
        }

        debug!(keys = identities.len(), "key ring loaded");
        Ok(Self { identities })
    }

    /// Read every key in a key file.
    pub fn read_file(path: &Path) -> Result<Vec<x25519::Identity>> {
        debug!(path = %path.display(), "reading key file");

        #[cfg(unix)]
        {
            if let Err(e) = validate_file_permissions(path, 0o600) {
                warn!(path = %path.display(), "insecure key file permissions: {}", e);
            }
        }

        let contents = fs::read_to_string(path).map_err(StoreError::ReadFailed)?;
        parse_keys(&contents)
    }

    /// Generate a new identity and write it to `path` (0600 on Unix).
    ///
    /// Returns the public key. Refuses to overwrite an existing file unless
    /// `force` is set.
    pub fn generate(path: &Path, force: bool) -> Result<PublicKey> {
        if path.exists() && !force {
            return Err(StoreError::WriteFailed(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists", path.display()),
            ))
            .into());
        }

        let identity = x25519::Identity::generate();
        let public_key = identity.to_public().to_string();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(StoreError::WriteFailed)?;
        }

        let secret = identity.to_string();
        let contents = format!(
            "# public key: {}\n{}\n",
            public_key,
            secret.expose_secret()
        );
        fs::write(path, contents).map_err(StoreError::WriteFailed)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))
                .map_err(StoreError::WriteFailed)?;
        }

        debug!(path = %path.display(), "identity saved");
        Ok(public_key)
    }

    /// Default key file (`~/.config/fleetvars/keys.txt` on Linux).
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(constants::KEY_FILE))
    }

    /// Private identities, in load order.
    pub fn identities(&self) -> &[x25519::Identity] {
        &self.identities
    }

    /// Public keys of every identity in the ring.
    pub fn public_keys(&self) -> BTreeSet<PublicKey> {
        self.identities
            .iter()
            .map(|i| i.to_public().to_string())
            .collect()
    }

    /// Whether any key in the ring is among `recipients`.
    pub fn holds_any<'a>(&self, recipients: impl IntoIterator<Item = &'a PublicKey>) -> bool {
        let ours = self.public_keys();
        recipients.into_iter().any(|r| ours.contains(r))
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("public_keys", &self.public_keys())
            .finish()
    }
}

/// Parse `AGE-SECRET-KEY-...` lines, skipping blanks and `#` comments.
fn parse_keys(contents: &str) -> Result<Vec<x25519::Identity>> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(cipher::parse_identity)
        .collect()
}

/// Validate file permissions (Unix only)
#[cfg(unix)]
fn validate_file_permissions(path: &Path, expected_mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)?;
    let actual_mode = metadata.permissions().mode() & 0o777;

    if actual_mode != expected_mode {
        return Err(ValidationError::InvalidPermissions {
            path: path.display().to_string(),
            expected: format!("{:o}", expected_mode),
            actual: format!("{:o}", actual_mode),
        }
        .into());
    }

    Ok(())
}

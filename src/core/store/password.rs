//! Store backed by the `pass` password manager.
//!
//! Values live outside the repository in `$PASSWORD_STORE_DIR` (default
//! `~/.password-store`), one gpg file per var.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::VarStore;
use crate::core::constants;
use crate::core::domain::{Scope, VarKey};
use crate::core::sync::fingerprint;
use crate::core::types::Fingerprint;
use crate::error::{Result, StoreError};

const TOOL: &str = "pass";

/// Delegates every operation to the `pass` CLI.
#[derive(Debug, Clone)]
pub struct PasswordStore {
    program: PathBuf,
    store_dir: PathBuf,
}

impl PasswordStore {
    pub fn new(program: impl Into<PathBuf>, store_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            store_dir: store_dir.into(),
        }
    }

    /// `pass` from `PATH` and the store dir `pass` itself would use.
    pub fn from_env() -> Result<Self> {
        let store_dir = match std::env::var_os(constants::ENV_PASSWORD_STORE_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::home_dir()
                .ok_or_else(|| StoreError::Tool {
                    tool: TOOL,
                    reason: "unable to determine home directory".to_string(),
                })?
                .join(".password-store"),
        };
        Ok(Self::new(TOOL, store_dir))
    }

    /// Entry name inside the password store.
    pub fn entry(key: &VarKey) -> String {
        match &key.scope {
            Scope::Machine(machine) => {
                format!("machines/{}/{}/{}", machine, key.generator, key.file)
            }
            Scope::Shared => format!("shared/{}/{}", key.generator, key.file),
        }
    }

    fn gpg_path(&self, key: &VarKey) -> PathBuf {
        self.store_dir.join(format!("{}.gpg", Self::entry(key)))
    }

    fn command(&self, args: &[&str]) -> Result<Command> {
        let program = which::which(&self.program).map_err(|e| StoreError::Tool {
            tool: TOOL,
            reason: format!("{} not found: {}", self.program.display(), e),
        })?;
        trace!(?args, "running pass");
        let mut cmd = Command::new(program);
        cmd.args(args)
            .env(constants::ENV_PASSWORD_STORE_DIR, &self.store_dir)
            .stderr(Stdio::piped());
        Ok(cmd)
    }

    fn tool_error(action: &str, entry: &str, stderr: &[u8]) -> StoreError {
        StoreError::Tool {
            tool: TOOL,
            reason: format!(
                "{} {}: {}",
                action,
                entry,
                String::from_utf8_lossy(stderr).trim()
            ),
        }
    }
}

impl VarStore for PasswordStore {
    fn name(&self) -> &'static str {
        "password-store"
    }

    fn exists(&self, key: &VarKey) -> Result<bool> {
        Ok(self.gpg_path(key).is_file())
    }

    fn get(&self, key: &VarKey) -> Result<Zeroizing<Vec<u8>>> {
        if !self.exists(key)? {
            return Err(StoreError::NotFound(key.to_string()).into());
        }
        let entry = Self::entry(key);
        let output = self
            .command(&["show", &entry])?
            .stdin(Stdio::null())
            .output()
            .map_err(StoreError::ReadFailed)?;
        if !output.status.success() {
            return Err(Self::tool_error("show", &entry, &output.stderr).into());
        }
        Ok(Zeroizing::new(output.stdout))
    }

    fn set(&self, key: &VarKey, value: &[u8]) -> Result<Option<PathBuf>> {
        if self.exists(key)? && self.get(key)?.as_slice() == value {
            debug!(key = %key, "pass entry unchanged");
            return Ok(None);
        }

        let entry = Self::entry(key);
        let mut child = self
            .command(&["insert", "-m", "-f", &entry])?
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .map_err(StoreError::WriteFailed)?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(value).map_err(StoreError::WriteFailed)?;
        }
        let output = child.wait_with_output().map_err(StoreError::WriteFailed)?;
        if !output.status.success() {
            return Err(Self::tool_error("insert", &entry, &output.stderr).into());
        }
        debug!(key = %key, "pass entry written");
        // Lives outside the repository.
        Ok(None)
    }

    fn delete(&self, key: &VarKey) -> Result<()> {
        if !self.exists(key)? {
            return Err(StoreError::NotFound(key.to_string()).into());
        }
        let entry = Self::entry(key);
        let output = self
            .command(&["rm", "-f", &entry])?
            .stdin(Stdio::null())
            .output()
            .map_err(StoreError::WriteFailed)?;
        if !output.status.success() {
            return Err(Self::tool_error("rm", &entry, &output.stderr).into());
        }
        Ok(())
    }

    /// Hash of every entry's encrypted file, so the remote check needs no
    /// decryption.
    fn fingerprint(&self, keys: &[VarKey]) -> Result<Option<Fingerprint>> {
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            let hash = fingerprint::file_hash(&self.gpg_path(key)).map_err(StoreError::ReadFailed)?;
            entries.push((Self::entry(key), hash));
        }
        Ok(Some(fingerprint::combine(entries)))
    }
}

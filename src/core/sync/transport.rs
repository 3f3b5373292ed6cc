//! Ways to reach a target host.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::core::atomic::write_atomic;
use crate::core::constants;
use crate::core::types::Fingerprint;
use crate::error::{Result, SyncError};

/// A target host's upload directory.
pub trait Transport: Send + Sync {
    /// Human-readable target, used in errors.
    fn target(&self) -> String;

    /// Fingerprint of the last successful upload, `None` if never synced.
    fn read_marker(&self) -> Result<Option<Fingerprint>>;

    /// Replace the upload directory's contents with `bundle`. Returns bytes sent.
    fn transfer(&self, bundle: &Path) -> Result<u64>;

    fn write_marker(&self, fingerprint: &Fingerprint) -> Result<()>;
}

/// Upload directory reached over `ssh` and `rsync`.
#[derive(Debug, Clone)]
pub struct SshTransport {
    host: String,
    upload_dir: PathBuf,
    ssh_options: Vec<String>,
}

impl SshTransport {
    pub fn new(host: impl Into<String>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: host.into(),
            upload_dir: upload_dir.into(),
            ssh_options: Vec::new(),
        }
    }

    /// Extra `-o` options passed to every ssh invocation.
    pub fn with_options(mut self, options: Vec<String>) -> Self {
        self.ssh_options = options;
        self
    }

    fn marker_path(&self) -> String {
        self.upload_dir
            .join(constants::FINGERPRINT_MARKER)
            .display()
            .to_string()
    }

    fn ssh(&self, remote: &str) -> Command {
        let mut cmd = Command::new("ssh");
        for option in &self.ssh_options {
            cmd.arg("-o").arg(option);
        }
        cmd.arg(&self.host).arg(remote);
        debug!(host = %self.host, remote, "ssh");
        cmd
    }

    fn quoted(path: &str) -> String {
        shell_words::quote(path).into_owned()
    }
}

impl Transport for SshTransport {
    fn target(&self) -> String {
        format!("{}:{}", self.host, self.upload_dir.display())
    }

    fn read_marker(&self) -> Result<Option<Fingerprint>> {
        let remote = format!("cat {} 2>/dev/null || true", Self::quoted(&self.marker_path()));
        let output = self
            .ssh(&remote)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| SyncError::MarkerRead {
                host: self.host.clone(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(SyncError::MarkerRead {
                host: self.host.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }
            .into());
        }
        let marker = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!marker.is_empty()).then_some(marker))
    }

    fn transfer(&self, bundle: &Path) -> Result<u64> {
        let transfer_err = |reason: String| SyncError::Transfer {
            host: self.host.clone(),
            reason,
        };

        let dir = self.upload_dir.display().to_string();
        let status = self
            .ssh(&format!("mkdir -p {}", Self::quoted(&dir)))
            .stdin(Stdio::null())
            .status()
            .map_err(|e| transfer_err(e.to_string()))?;
        if !status.success() {
            return Err(transfer_err(format!("mkdir exited with {}", status)).into());
        }

        let mut rsync = Command::new("rsync");
        rsync
            .arg("-a")
            .arg("--delete")
            .arg(format!("--exclude={}", constants::FINGERPRINT_MARKER));
        if !self.ssh_options.is_empty() {
            let ssh = std::iter::once("ssh".to_string())
                .chain(self.ssh_options.iter().flat_map(|o| ["-o".to_string(), o.clone()]))
                .collect::<Vec<_>>();
            rsync.arg("-e").arg(shell_words::join(ssh));
        }
        let output = rsync
            .arg(format!("{}/", bundle.display()))
            .arg(format!("{}:{}/", self.host, dir))
            .stdin(Stdio::null())
            .output()
            .map_err(|e| transfer_err(e.to_string()))?;
        if !output.status.success() {
            return Err(transfer_err(String::from_utf8_lossy(&output.stderr).trim().to_string()).into());
        }

        let bytes = bundle_size(bundle)?;
        info!(host = %self.host, bytes, "bundle transferred");
        Ok(bytes)
    }

    fn write_marker(&self, fingerprint: &Fingerprint) -> Result<()> {
        let marker_err = |reason: String| SyncError::MarkerWrite {
            host: self.host.clone(),
            reason,
        };

        let remote = format!("cat > {}", Self::quoted(&self.marker_path()));
        let mut child = self
            .ssh(&remote)
            .stdin(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| marker_err(e.to_string()))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(format!("{}\n", fingerprint).as_bytes())
                .map_err(|e| marker_err(e.to_string()))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| marker_err(e.to_string()))?;
        if !output.status.success() {
            return Err(marker_err(String::from_utf8_lossy(&output.stderr).trim().to_string()).into());
        }
        Ok(())
    }
}

/// Upload directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    dir: PathBuf,
}

impl LocalTransport {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn marker_path(&self) -> PathBuf {
        self.dir.join(constants::FINGERPRINT_MARKER)
    }
}

impl Transport for LocalTransport {
    fn target(&self) -> String {
        self.dir.display().to_string()
    }

    fn read_marker(&self) -> Result<Option<Fingerprint>> {
        match fs::read_to_string(self.marker_path()) {
            Ok(marker) => {
                let marker = marker.trim().to_string();
                Ok((!marker.is_empty()).then_some(marker))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(SyncError::MarkerRead {
                host: self.target(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    fn transfer(&self, bundle: &Path) -> Result<u64> {
        let transfer_err = |e: std::io::Error| SyncError::Transfer {
            host: self.target(),
            reason: e.to_string(),
        };

        fs::create_dir_all(&self.dir).map_err(transfer_err)?;
        for entry in fs::read_dir(&self.dir).map_err(transfer_err)? {
            let entry = entry.map_err(transfer_err)?;
            if entry.file_name() == constants::FINGERPRINT_MARKER {
                continue;
            }
            let path = entry.path();
            if path.is_dir() {
                fs::remove_dir_all(&path).map_err(transfer_err)?;
            } else {
                fs::remove_file(&path).map_err(transfer_err)?;
            }
        }

        let mut bytes = 0;
        for entry in WalkDir::new(bundle).min_depth(1) {
            let entry = entry.map_err(|e| transfer_err(e.into()))?;
            let rel = entry
                .path()
                .strip_prefix(bundle)
                .map_err(|e| SyncError::Bundle(e.to_string()))?;
            let dest = self.dir.join(rel);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest).map_err(transfer_err)?;
            } else {
                bytes += fs::copy(entry.path(), &dest).map_err(transfer_err)?;
            }
        }
        debug!(dir = %self.dir.display(), bytes, "bundle copied");
        Ok(bytes)
    }

    fn write_marker(&self, fingerprint: &Fingerprint) -> Result<()> {
        write_atomic(&self.marker_path(), format!("{}\n", fingerprint).as_bytes()).map_err(|e| {
            SyncError::MarkerWrite {
                host: self.target(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

fn bundle_size(bundle: &Path) -> Result<u64> {
    let mut bytes = 0;
    for entry in WalkDir::new(bundle).min_depth(1) {
        let entry = entry.map_err(|e| SyncError::Bundle(e.to_string()))?;
        if entry.file_type().is_file() {
            bytes += entry
                .metadata()
                .map_err(|e| SyncError::Bundle(e.to_string()))?
                .len();
        }
    }
    Ok(bytes)
}

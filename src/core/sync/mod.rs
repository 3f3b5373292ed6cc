//! Remote sync.
//!
//! Uploads a machine's deployable secrets only when their fingerprint
//! differs from the marker left on the target by the previous upload.

pub mod fingerprint;
mod transport;

use tempfile::TempDir;
use tracing::{debug, info};

use crate::core::domain::{SyncOutcome, VarKey};
use crate::core::store::VarStore;
use crate::error::{Result, SyncError};

pub use transport::{LocalTransport, SshTransport, Transport};

/// Push `keys` from `store` to `transport` unless the target is current.
///
/// The marker is written only after the transfer succeeded, so a failed
/// transfer is retried on the next call.
pub fn upload(store: &dyn VarStore, keys: &[VarKey], transport: &dyn Transport) -> Result<SyncOutcome> {
    let bundle = TempDir::new().map_err(|e| SyncError::Bundle(e.to_string()))?;
    store.upload(keys, bundle.path())?;

    let fingerprint = match store.fingerprint(keys)? {
        Some(fingerprint) => fingerprint,
        None => fingerprint::bundle_fingerprint(bundle.path())?,
    };

    let remote = transport.read_marker()?;
    debug!(dest = %transport.target(), local = %fingerprint, remote = ?remote, "comparing fingerprints");
    if remote.as_deref() == Some(fingerprint.as_str()) {
        info!(dest = %transport.target(), "already up to date");
        return Ok(SyncOutcome::UpToDate { fingerprint });
    }

    let bytes = transport.transfer(bundle.path())?;
    transport.write_marker(&fingerprint)?;
    info!(dest = %transport.target(), files = keys.len(), bytes, "uploaded");

    Ok(SyncOutcome::Uploaded {
        fingerprint,
        files: keys.len(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::EphemeralStore;
    use crate::core::types::Fingerprint;
    use parking_lot::Mutex;
    use std::path::Path;
    use tempfile::TempDir;

    /// Transport that fails every transfer.
    struct Broken {
        inner: LocalTransport,
        marker_writes: Mutex<usize>,
    }

    impl Transport for Broken {
        fn target(&self) -> String {
            "broken".into()
        }

        fn read_marker(&self) -> Result<Option<Fingerprint>> {
            self.inner.read_marker()
        }

        fn transfer(&self, _bundle: &Path) -> Result<u64> {
            Err(SyncError::Transfer {
                host: "broken".into(),
                reason: "connection reset".into(),
            }
            .into())
        }

        fn write_marker(&self, fingerprint: &Fingerprint) -> Result<()> {
            *self.marker_writes.lock() += 1;
            self.inner.write_marker(fingerprint)
        }
    }

    fn store_with(values: &[(&VarKey, &str)]) -> EphemeralStore {
        let store = EphemeralStore::new();
        for (key, value) in values {
            store.set(key, value.as_bytes()).unwrap();
        }
        store
    }

    #[test]
    fn test_second_upload_transfers_nothing() {
        let key = VarKey::machine("m1", "gen", "secret");
        let store = store_with(&[(&key, "hello\n")]);
        let target = TempDir::new().unwrap();
        let transport = LocalTransport::new(target.path());

        let first = upload(&store, &[key.clone()], &transport).unwrap();
        assert_eq!(first.bytes_transferred(), 6);
        let marker = std::fs::read_to_string(target.path().join(".fleetvars-fingerprint")).unwrap();

        let second = upload(&store, &[key.clone()], &transport).unwrap();
        assert!(matches!(second, SyncOutcome::UpToDate { .. }));
        assert_eq!(second.bytes_transferred(), 0);
        assert_eq!(
            std::fs::read_to_string(target.path().join(".fleetvars-fingerprint")).unwrap(),
            marker
        );

        store.set(&key, b"changed\n").unwrap();
        let third = upload(&store, &[key], &transport).unwrap();
        assert_ne!(third.fingerprint(), first.fingerprint());
    }

    #[test]
    fn test_failed_transfer_leaves_marker() {
        let key = VarKey::shared("gen", "secret");
        let store = store_with(&[(&key, "x")]);
        let target = TempDir::new().unwrap();
        let transport = Broken {
            inner: LocalTransport::new(target.path()),
            marker_writes: Mutex::new(0),
        };

        let err = upload(&store, &[key], &transport).unwrap_err();
        assert!(err.to_string().contains("connection reset"));
        assert_eq!(*transport.marker_writes.lock(), 0);
        assert_eq!(transport.read_marker().unwrap(), None);
    }
}

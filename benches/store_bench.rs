use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use age::x25519;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fleetvars::core::access::{AccessControl, IdentityKind, NoSecrets, Principal};
use fleetvars::core::domain::VarKey;
use fleetvars::core::keys::KeyRing;
use fleetvars::core::store::{EncryptedStore, VarStore};
use fleetvars::core::sync::fingerprint;
use tempfile::TempDir;

/// Encrypted store with one user granted on every new secret.
fn store(repo: &TempDir) -> EncryptedStore {
    let identity = x25519::Identity::generate();
    let access = Arc::new(AccessControl::open(&repo.path().join("vars/access.toml")).unwrap());
    access
        .add_identity(
            IdentityKind::User,
            "bench",
            &identity.to_public().to_string(),
            false,
            &NoSecrets,
        )
        .unwrap();
    access
        .set_default_grants(BTreeSet::from([Principal::User("bench".into())]))
        .unwrap();
    EncryptedStore::new(
        repo.path(),
        access,
        Some(KeyRing::from_identities(vec![identity])),
    )
}

/// Benchmark set/get roundtrip through the encrypted store.
fn bench_encrypted_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("encrypted_store");
    group.sample_size(30);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    for size in [32, 1024, 16384] {
        let repo = TempDir::new().unwrap();
        let store = store(&repo);
        let key = VarKey::machine("m1", "bench", "value");
        store.prepare(&key, &[]).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        let mut counter = 0u8;
        group.bench_with_input(BenchmarkId::new("set_get", format!("{}B", size)), &size, |b, &size| {
            b.iter(|| {
                // Vary the payload so the unchanged-value shortcut never applies.
                counter = counter.wrapping_add(1);
                let payload = vec![counter; size];
                store.set(black_box(&key), black_box(&payload)).unwrap();
                black_box(store.get(&key).unwrap());
            });
        });
    }

    group.finish();
}

/// Benchmark bundle fingerprinting over many small files.
fn bench_fingerprint(c: &mut Criterion) {
    let mut group = c.benchmark_group("fingerprint");

    for files in [10, 100, 1000] {
        let dir = TempDir::new().unwrap();
        for i in 0..files {
            let sub = dir.path().join(format!("gen{}", i % 10));
            std::fs::create_dir_all(&sub).unwrap();
            std::fs::write(sub.join(format!("file{}", i)), format!("value {}", i)).unwrap();
        }

        group.bench_with_input(BenchmarkId::new("bundle", files), &files, |b, _| {
            b.iter(|| black_box(fingerprint::bundle_fingerprint(dir.path()).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_encrypted_store, bench_fingerprint);
criterion_main!(benches);

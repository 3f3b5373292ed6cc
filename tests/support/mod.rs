//! Test support utilities for fleetvars integration tests.
//!
//! Provides reusable test environment setup and helper commands.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::path::PathBuf;

use tempfile::TempDir;

/// Test environment with isolated temp directories.
///
/// Each test gets its own fleet repository and home dir. Child processes
/// use `.current_dir()` and explicit env vars, so tests can run in parallel.
pub struct Test {
    /// Fleet repository holding `fleet.toml` and `vars/`
    pub dir: TempDir,
    /// Temporary home directory with the operator key
    pub home: TempDir,
}

impl Test {
    /// Create an empty environment without config or keys.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let home = TempDir::new().expect("failed to create temp home");
        Self { dir, home }
    }

    /// Create an environment with `fleet.toml` written from `config`.
    pub fn with_config(config: &str) -> Self {
        let t = Self::new();
        t.write_config(config);
        t
    }

    /// Create an environment with `config`, an operator key registered as
    /// user `alice`, and alice granted on every new secret.
    pub fn with_operator(config: &str) -> Self {
        let t = Self::with_config(config);
        let public_key = t.keygen_default();
        assert_success(&t.run(&["users", "add", "alice", &public_key]));
        assert_success(&t.run(&["defaults", "user:alice"]));
        t
    }

    pub fn write_config(&self, config: &str) {
        std::fs::write(self.dir.path().join("fleet.toml"), config).expect("failed to write config");
    }

    /// Operator key file used by every command.
    pub fn key_file(&self) -> PathBuf {
        self.home.path().join("keys.txt")
    }

    /// Path of a secret unit in the encrypted store.
    pub fn secret_unit(&self, secret_ref: &str) -> PathBuf {
        self.dir
            .path()
            .join("vars/secret")
            .join(secret_ref)
            .join("secret.json")
    }

    /// Path of a public value in the repo store.
    pub fn public_value(&self, secret_ref: &str) -> PathBuf {
        self.dir
            .path()
            .join("vars/public")
            .join(secret_ref)
            .join("value")
    }
}

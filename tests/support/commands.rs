//! Command helper methods for Test.

use std::path::Path;
use std::process::Output;

use assert_cmd::Command;
use fleetvars::core::cipher;
use fleetvars::core::keys::KeyRing;

use super::{assert_success, stdout, Test};

impl Test {
    /// Create a fleetvars command with correct environment variables.
    ///
    /// Returns a Command configured with:
    /// - HOME and XDG_CONFIG_HOME inside the temporary home directory
    /// - FLEETVARS_AGE_KEY_FILE pointing at the test's operator key
    /// - Current directory set to the fleet repository
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("fleetvars").expect("failed to find fleetvars binary");
        cmd.env("HOME", self.home.path());
        cmd.env("XDG_CONFIG_HOME", self.home.path().join(".config"));
        cmd.env("FLEETVARS_AGE_KEY_FILE", self.key_file());
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("FLEETVARS_AGE_KEY");
        cmd.env_remove("FLEETVARS_CONFIG");
        cmd.env_remove("FLEETVARS_LOG");
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// Run `fleetvars ARGS...`.
    pub fn run(&self, args: &[&str]) -> Output {
        self.cmd()
            .args(args)
            .output()
            .expect("failed to run fleetvars")
    }

    /// Run `fleetvars generate --no-input ARGS...`.
    pub fn generate(&self, args: &[&str]) -> Output {
        let mut full = vec!["generate", "--no-input"];
        full.extend_from_slice(args);
        self.run(&full)
    }

    /// Create a key at `path` and return its public key.
    pub fn keygen(&self, path: &Path) -> String {
        let output = self.run(&["keygen", "--output", &path.display().to_string()]);
        assert_success(&output);
        stdout(&output)
            .lines()
            .find(|l| l.starts_with("age1"))
            .expect("keygen printed no public key")
            .to_string()
    }

    /// Create the operator key and return its public key.
    pub fn keygen_default(&self) -> String {
        self.keygen(&self.key_file())
    }

    /// Recipients recorded in a secret unit.
    pub fn recipients(&self, secret_ref: &str) -> Vec<String> {
        let unit = self.unit(secret_ref);
        unit["recipients"]
            .as_array()
            .expect("recipients array")
            .iter()
            .map(|r| r.as_str().expect("recipient string").to_string())
            .collect()
    }

    /// Armored ciphertext of a secret unit.
    pub fn ciphertext(&self, secret_ref: &str) -> String {
        self.unit(secret_ref)["data"]
            .as_str()
            .expect("data string")
            .to_string()
    }

    /// Decrypt a secret with the keys in `key_file`.
    pub fn decrypt_with(&self, secret_ref: &str, key_file: &Path) -> fleetvars::error::Result<String> {
        let identities = KeyRing::read_file(key_file)?;
        let plaintext = cipher::decrypt(&self.ciphertext(secret_ref), &identities)?;
        Ok(String::from_utf8_lossy(&plaintext).to_string())
    }

    fn unit(&self, secret_ref: &str) -> serde_json::Value {
        let contents =
            std::fs::read_to_string(self.secret_unit(secret_ref)).expect("secret unit missing");
        serde_json::from_str(&contents).expect("secret unit is JSON")
    }
}

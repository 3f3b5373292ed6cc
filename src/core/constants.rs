//! Constants used throughout fleetvars.
//!
//! Centralizes file names and environment variable names.

/// Fleet configuration file name.
pub const CONFIG_FILE: &str = "fleet.toml";

/// Directory (relative to the repo) holding all generated vars.
pub const VARS_DIR: &str = "vars";

/// Encrypted secret store root, relative to [`VARS_DIR`].
pub const SECRET_DIR: &str = "secret";

/// Plaintext public store root, relative to [`VARS_DIR`].
pub const PUBLIC_DIR: &str = "public";

/// Access registry file, relative to [`VARS_DIR`].
pub const ACCESS_FILE: &str = "access.toml";

/// Advisory lock directory, relative to [`VARS_DIR`].
pub const LOCK_DIR: &str = ".locks";

/// Encrypted unit file name inside a secret's directory.
pub const SECRET_FILE: &str = "secret.json";

/// Public value file name inside a var's directory.
pub const VALUE_FILE: &str = "value";

/// Marker file on the target host holding the last uploaded fingerprint.
pub const FINGERPRINT_MARKER: &str = ".fleetvars-fingerprint";

/// Default upload directory on target hosts.
pub const DEFAULT_UPLOAD_DIR: &str = "/var/lib/fleetvars";

/// Inline operator keys (`AGE-SECRET-KEY-...` lines).
pub const ENV_AGE_KEY: &str = "FLEETVARS_AGE_KEY";

/// Path to an operator key file.
pub const ENV_AGE_KEY_FILE: &str = "FLEETVARS_AGE_KEY_FILE";

/// Key file location relative to the user config dir.
pub const KEY_FILE: &str = "fleetvars/keys.txt";

/// Password store directory override used by `pass`.
pub const ENV_PASSWORD_STORE_DIR: &str = "PASSWORD_STORE_DIR";

/// Gitignore entries keeping local state out of version control.
pub const GITIGNORE_ENTRIES: &[&str] = &["vars/.locks/"];

//! Error types.
//!
//! Each subsystem has its own error enum; [`Error`] wraps them so callers can
//! propagate with `?` and still match on the domain when they need to.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("{0}")]
    Other(String),
}

/// Malformed or inconsistent fleet configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("fleet config not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to read config: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("missing field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unknown store backend '{tag}' (supported: {supported})")]
    UnknownStore { tag: String, supported: String },

    #[error("unknown machine '{name}'{}", format_suggestions(.suggestions))]
    UnknownMachine {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("machine '{machine}' has no generator '{name}'")]
    UnknownGenerator { machine: String, name: String },

    #[error("generator '{generator}' depends on undeclared generator '{dependency}'")]
    UnknownDependency {
        generator: String,
        dependency: String,
    },

    #[error("shared generator '{generator}' is declared differently by {machines}")]
    SharedMismatch { generator: String, machines: String },

    #[error("no value for prompt '{prompt}' of generator '{generator}'")]
    MissingPrompt { generator: String, prompt: String },

    #[error("machine '{0}' has no target_host")]
    NoTargetHost(String),
}

/// Failures while running generators.
#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("dependency cycle: {}", .cycle.join(" -> "))]
    DependencyCycle { cycle: Vec<String> },

    #[error("generator '{generator}' failed ({status}): {stderr}")]
    ScriptFailed {
        generator: String,
        status: String,
        stderr: String,
    },

    #[error("generator '{generator}' did not produce: {}", .files.join(", "))]
    MissingOutput {
        generator: String,
        files: Vec<String>,
    },

    #[error("failed to start generator '{generator}': {source}")]
    Spawn {
        generator: String,
        #[source]
        source: std::io::Error,
    },
}

/// Store backend failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("var not found: {0}")]
    NotFound(String),

    #[error("no private key found (looked in {0})")]
    NoPrivateKey(String),

    #[error("invalid key format: {0}")]
    InvalidFormat(String),

    #[error("failed to read store: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("failed to write store: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("corrupt store entry {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("{tool} failed: {reason}")]
    Tool { tool: &'static str, reason: String },

    #[error("failed to acquire lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Access-control failures.
#[derive(Error, Debug)]
pub enum AccessError {
    #[error("unknown identity '{name}'{}", format_suggestions(.suggestions))]
    UnknownIdentity {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("unknown group '{name}'{}", format_suggestions(.suggestions))]
    UnknownGroup {
        name: String,
        suggestions: Vec<String>,
    },

    #[error("unknown secret '{0}'")]
    UnknownSecret(String),

    #[error("identity '{0}' already exists with a different key (use --force to replace)")]
    IdentityExists(String),

    #[error("access denied to {0}: none of your keys is a recipient")]
    AccessDenied(String),

    #[error("{0} would have no recipients left")]
    EmptyRecipients(String),

    #[error("invalid principal '{0}' (expected user:NAME, machine:NAME or group:NAME)")]
    InvalidPrincipal(String),
}

/// Encryption failures.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("none of the available keys can decrypt this ciphertext")]
    NoMatchingKey,

    #[error("armor failed: {0}")]
    ArmorFailed(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// Remote sync failures.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("failed to read fingerprint from {host}: {reason}")]
    MarkerRead { host: String, reason: String },

    #[error("failed to transfer bundle to {host}: {reason}")]
    Transfer { host: String, reason: String },

    #[error("failed to write fingerprint to {host}: {reason}")]
    MarkerWrite { host: String, reason: String },

    #[error("failed to build bundle: {0}")]
    Bundle(String),
}

/// Input validation failures.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("{path} has permissions {actual}, expected {expected}")]
    InvalidPermissions {
        path: String,
        expected: String,
        actual: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Remediation hint shown under the error message.
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Error::Config(ConfigError::NotFound(_)) => {
                Some("create fleet.toml or pass --config PATH")
            }
            Error::Config(ConfigError::MissingPrompt { .. }) => {
                Some("pass --prompt GENERATOR.PROMPT=VALUE or run interactively")
            }
            Error::Config(ConfigError::NoTargetHost(_)) => {
                Some("set target_host for the machine in fleet.toml")
            }
            Error::Store(StoreError::NoPrivateKey(_)) => {
                Some("run: fleetvars keygen, or set FLEETVARS_AGE_KEY_FILE")
            }
            Error::Access(AccessError::AccessDenied(_)) => {
                Some("ask an authorized user to grant you access")
            }
            Error::Access(AccessError::EmptyRecipients(_)) => {
                Some("grant access before generating")
            }
            Error::Access(AccessError::UnknownIdentity { .. }) => {
                Some("run: fleetvars users add NAME KEY")
            }
            Error::Generate(GenerateError::DependencyCycle { .. }) => {
                Some("remove one of the dependencies in the cycle")
            }
            Error::Sync(_) => Some("check that the target host is reachable over ssh"),
            _ => None,
        }
    }

    /// Process exit code: 2 for configuration and recipient errors, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Validation(_) => 2,
            Error::Generate(GenerateError::DependencyCycle { .. }) => 2,
            Error::Access(AccessError::AccessDenied(_)) => 1,
            Error::Access(_) => 2,
            Error::Cipher(CipherError::InvalidPublicKey(_)) => 2,
            _ => 1,
        }
    }
}

/// Names from `available` that are close to `name`.
pub fn suggestions(name: &str, available: &[String]) -> Vec<String> {
    let mut close: Vec<(usize, &String)> = available
        .iter()
        .map(|candidate| (edit_distance(name, candidate), candidate))
        .filter(|(distance, candidate)| {
            *distance <= 2 || candidate.starts_with(name) || name.starts_with(candidate.as_str())
        })
        .collect();
    close.sort();
    close.into_iter().take(3).map(|(_, c)| c.clone()).collect()
}

fn format_suggestions(suggestions: &[String]) -> String {
    if suggestions.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", suggestions.join(", "))
    }
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cur = row[j + 1];
            row[j + 1] = if ca == *cb {
                prev
            } else {
                1 + prev.min(row[j]).min(cur)
            };
            prev = cur;
        }
    }
    row[b.len()]
}

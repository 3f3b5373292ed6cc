//! Type aliases for domain concepts.
//!
//! Provides semantic type aliases to make function signatures more descriptive.

/// A machine name as declared in `fleet.toml`.
pub type MachineName = String;

/// A generator name, unique per machine or within the shared scope.
pub type GeneratorName = String;

/// An output file name of a generator.
pub type FileName = String;

/// An age public key string (starts with "age1...").
pub type PublicKey = String;

/// String form of a `VarKey`, used as the secret reference in grants.
pub type SecretRef = String;

/// An identity or group name in the access registry.
pub type PrincipalName = String;

/// SHA-256 hex digest summarizing a bundle of vars.
pub type Fingerprint = String;

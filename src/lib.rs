//! fleetvars - generate, encrypt and deploy per-machine secrets.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── generate      # Run generators, prompt on the terminal
//! │   ├── list          # Declared vars and their state
//! │   ├── upload        # Push secrets to target hosts
//! │   ├── access        # users, machines, groups, grant, revoke
//! │   ├── delete        # Remove a stored var and its grants
//! │   ├── keygen        # Operator key creation
//! │   └── completions   # Shell completions
//! └── core/             # Core library components
//!     ├── config        # fleet.toml loading and validation
//!     ├── access/       # Identities, groups, grants, recipient sets
//!     ├── cipher/       # age encryption
//!     ├── keys          # Operator key ring
//!     ├── store/        # VarStore backends (age, pass, in-repo, ephemeral)
//!     ├── generator/    # Dependency-ordered script execution
//!     ├── sync/         # Fingerprinted uploads over ssh/rsync
//!     └── fleet         # Driver tying it together
//! ```
//!
//! # Features
//!
//! - Generators declared per machine or shared across machines
//! - Secrets encrypted with age to the exact set of granted keys
//! - Re-encryption on every grant, revoke or group change
//! - Uploads skipped when the target's fingerprint is current

pub mod cli;
pub mod core;
pub mod error;

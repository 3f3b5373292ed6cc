//! Results of generate and upload runs.

use std::fmt;

use crate::core::types::{GeneratorName, MachineName};
use crate::error::Error;

/// What happened to one generator during a run.
#[derive(Debug)]
pub enum Outcome {
    /// All outputs present with the expected recipients; nothing written.
    UpToDate,
    /// Outputs present but some secrets were re-encrypted for a changed
    /// recipient set.
    Reencrypted { files: usize },
    /// The script ran and its outputs were committed.
    Generated { files: usize },
    /// The script or the commit failed; nothing of this generator was written.
    Failed(Error),
    /// Not attempted because a dependency failed or was skipped.
    Skipped { failed_dependency: GeneratorName },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Outcome::Skipped { .. })
    }

    /// Whether dependents may run after this outcome.
    pub fn is_usable(&self) -> bool {
        !self.is_failure() && !self.is_skipped()
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::UpToDate => write!(f, "up to date"),
            Outcome::Reencrypted { files } => write!(f, "re-encrypted {} file(s)", files),
            Outcome::Generated { files } => write!(f, "generated {} file(s)", files),
            Outcome::Failed(e) => write!(f, "failed: {}", e),
            Outcome::Skipped { failed_dependency } => {
                write!(f, "skipped (dependency '{}' did not succeed)", failed_dependency)
            }
        }
    }
}

/// Per-generator outcomes for one machine, in execution order.
#[derive(Debug)]
pub struct RunReport {
    pub machine: MachineName,
    pub generators: Vec<(GeneratorName, Outcome)>,
}

impl RunReport {
    pub fn new(machine: impl Into<String>) -> Self {
        Self {
            machine: machine.into(),
            generators: Vec::new(),
        }
    }

    /// Outcome of a single generator, if it was part of the run.
    pub fn outcome(&self, generator: &str) -> Option<&Outcome> {
        self.generators
            .iter()
            .find(|(name, _)| name == generator)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&GeneratorName, &Error)> {
        self.generators.iter().filter_map(|(name, outcome)| match outcome {
            Outcome::Failed(e) => Some((name, e)),
            _ => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.generators
            .iter()
            .any(|(_, o)| o.is_failure() || o.is_skipped())
    }

    /// Number of generators whose script ran.
    pub fn generated(&self) -> usize {
        self.generators
            .iter()
            .filter(|(_, o)| matches!(o, Outcome::Generated { .. }))
            .count()
    }
}

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote fingerprint matched; nothing transferred.
    UpToDate { fingerprint: String },
    /// Bundle transferred and remote fingerprint updated.
    Uploaded {
        fingerprint: String,
        files: usize,
        bytes: u64,
    },
}

impl SyncOutcome {
    pub fn fingerprint(&self) -> &str {
        match self {
            SyncOutcome::UpToDate { fingerprint } => fingerprint,
            SyncOutcome::Uploaded { fingerprint, .. } => fingerprint,
        }
    }

    /// Bytes sent to the target host.
    pub fn bytes_transferred(&self) -> u64 {
        match self {
            SyncOutcome::UpToDate { .. } => 0,
            SyncOutcome::Uploaded { bytes, .. } => *bytes,
        }
    }
}

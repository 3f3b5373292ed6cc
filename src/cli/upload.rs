//! Upload command.
//!
//! Pushes each machine's deployed secrets to its target host, skipping
//! hosts whose fingerprint marker is current.

use std::path::Path;

use crate::cli::output;
use crate::core::domain::SyncOutcome;
use crate::error::{Error, Result};

/// Upload secrets for the given machines (all when empty).
pub fn execute(config: &Path, machines: &[String]) -> Result<()> {
    let fleet = super::open(config)?;
    let targets: Vec<String> = fleet
        .machines(machines)?
        .into_iter()
        .map(|m| m.name.clone())
        .collect();

    let mut first_error: Option<Error> = None;
    for machine in targets {
        match fleet.upload(&machine) {
            Ok(SyncOutcome::UpToDate { .. }) => {
                output::dimmed(&format!("{}: up to date", machine));
            }
            Ok(SyncOutcome::Uploaded { files, bytes, .. }) => {
                output::success(&format!(
                    "{}: uploaded {} file(s), {} bytes",
                    output::key(&machine),
                    files,
                    bytes
                ));
            }
            Err(e) => {
                output::error(&format!("{}: {}", output::key(&machine), e));
                first_error.get_or_insert(e);
            }
        }
    }

    first_error.map_or(Ok(()), Err)
}

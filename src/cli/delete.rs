//! `delete` command.

use std::io::{self, IsTerminal};
use std::path::Path;

use dialoguer::Confirm;

use crate::cli::output;
use crate::core::domain::VarKey;
use crate::error::{Error, Result};

/// `delete SECRET [--yes]`.
pub fn execute(config: &Path, secret: &str, yes: bool) -> Result<()> {
    let fleet = super::open(config)?;
    let key: VarKey = secret.parse()?;

    if !yes {
        if !io::stdin().is_terminal() {
            return Err(Error::Other(format!(
                "refusing to delete {} without confirmation (pass --yes)",
                key
            )));
        }
        if !confirm(&key)? {
            output::dimmed("cancelled");
            return Ok(());
        }
    }

    fleet.delete(&key)?;
    output::success(&format!("deleted {}", output::key(&key.to_string())));
    if fleet.config().var(&key).is_some() {
        output::hint("the next generate creates it again");
    }
    Ok(())
}

fn confirm(key: &VarKey) -> Result<bool> {
    Confirm::new()
        .with_prompt(format!("Delete {} and its grants?", key))
        .default(false)
        .interact()
        .map_err(Into::into)
}

//! Keygen command - create an operator key.

use std::path::PathBuf;

use crate::cli::output;
use crate::core::constants;
use crate::core::keys::KeyRing;
use crate::error::{Error, Result};

/// Generate a key file and print its public key.
pub fn execute(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path.or_else(KeyRing::default_path) {
        Some(path) => path,
        None => {
            return Err(Error::Other(format!(
                "no config directory; pass --output or set {}",
                constants::ENV_AGE_KEY_FILE
            )))
        }
    };

    let public_key = KeyRing::generate(&path, force)?;
    output::success(&format!("wrote {}", output::path(&path.display().to_string())));
    output::data(&public_key);
    output::hint(&format!(
        "register it: fleetvars users add {} {}",
        whoami::username(),
        public_key
    ));
    Ok(())
}

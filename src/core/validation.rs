//! Input validation.
//!
//! Every name that ends up as a path component (machines, generators, files,
//! identities, groups) goes through [`validate_name`].

use crate::error::{Result, ValidationError};

/// Validate a name used as a path component.
///
/// Names must be non-empty, may contain only ASCII letters, digits, `-`,
/// `_` and `.`, and must not start with `.`.
///
/// # Errors
///
/// Returns `ValidationError::InvalidName` describing the first problem.
pub fn validate_name(kind: &'static str, name: &str) -> Result<()> {
    let invalid = |reason: String| -> crate::error::Error {
        ValidationError::InvalidName {
            kind,
            name: name.to_string(),
            reason,
        }
        .into()
    };

    if name.is_empty() {
        return Err(invalid("cannot be empty".to_string()));
    }

    if name.starts_with('.') {
        return Err(invalid("cannot start with '.'".to_string()));
    }

    for (i, ch) in name.chars().enumerate() {
        if !ch.is_ascii_alphanumeric() && !matches!(ch, '-' | '_' | '.') {
            return Err(invalid(format!(
                "invalid character '{}' at position {}",
                ch,
                i + 1
            )));
        }
    }

    Ok(())
}

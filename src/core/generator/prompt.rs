//! Prompt answers.

use std::collections::BTreeMap;

use crate::core::domain::Prompt;
use crate::core::types::GeneratorName;
use crate::error::{ConfigError, Result};

/// Answers given up front, keyed by generator then prompt name.
pub type PromptValues = BTreeMap<GeneratorName, BTreeMap<String, String>>;

/// Asks for prompt values that were not supplied up front.
pub trait PromptSource: Send + Sync {
    /// `prompt.previous_value` holds the stored answer, if any, to offer as
    /// the default.
    fn ask(&self, generator: &str, prompt: &Prompt) -> Result<String>;
}

/// Never asks: reuses the previous value or fails with a configuration error.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonInteractive;

impl PromptSource for NonInteractive {
    fn ask(&self, generator: &str, prompt: &Prompt) -> Result<String> {
        prompt.previous_value.clone().ok_or_else(|| {
            ConfigError::MissingPrompt {
                generator: generator.to_string(),
                prompt: prompt.name.clone(),
            }
            .into()
        })
    }
}

/// Resolve a prompt: an explicit value is used without asking; otherwise
/// `source` decides, with the previous value as the default.
pub fn resolve(
    generator: &str,
    prompt: &Prompt,
    values: &PromptValues,
    source: &dyn PromptSource,
) -> Result<String> {
    if let Some(value) = values.get(generator).and_then(|v| v.get(&prompt.name)) {
        return Ok(value.clone());
    }
    source.ask(generator, prompt)
}

/// Parse a `GENERATOR.PROMPT=VALUE` argument.
pub fn parse_assignment(arg: &str) -> Option<(GeneratorName, String, String)> {
    let (target, value) = arg.split_once('=')?;
    let (generator, prompt) = target.split_once('.')?;
    if generator.is_empty() || prompt.is_empty() {
        return None;
    }
    Some((generator.to_string(), prompt.to_string(), value.to_string()))
}

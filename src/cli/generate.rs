//! Generate command.
//!
//! Runs missing generators for the selected machines, asking for prompt
//! answers on the terminal unless `--no-input` is given or stdin is piped.

use std::io::{self, IsTerminal};
use std::path::Path;

use dialoguer::{Editor, Input, Password};
use parking_lot::Mutex;
use tracing::info;

use crate::cli::output;
use crate::core::domain::{Outcome, Prompt, PromptKind};
use crate::core::fleet::GenerateRequest;
use crate::core::generator::{parse_assignment, NonInteractive, PromptSource, PromptValues};
use crate::error::{ConfigError, Error, Result};

/// Parsed `generate` arguments.
pub struct Options {
    pub machines: Vec<String>,
    pub regenerate: bool,
    pub generator: Option<String>,
    pub jobs: usize,
    pub prompts: Vec<String>,
    pub no_input: bool,
}

/// Asks on the terminal, one prompt at a time even with several workers.
#[derive(Default)]
struct Terminal {
    lock: Mutex<()>,
}

impl PromptSource for Terminal {
    fn ask(&self, generator: &str, prompt: &Prompt) -> Result<String> {
        let _guard = self.lock.lock();
        let label = if prompt.description.is_empty() {
            format!("{}.{}", generator, prompt.name)
        } else {
            format!("{} ({}.{})", prompt.description, generator, prompt.name)
        };

        match prompt.kind {
            PromptKind::Line => {
                let mut input = Input::<String>::new().with_prompt(label);
                if let Some(previous) = &prompt.previous_value {
                    input = input.default(previous.clone());
                }
                Ok(input.interact_text()?)
            }
            PromptKind::Hidden => {
                let hint = if prompt.previous_value.is_some() {
                    " [empty keeps current]"
                } else {
                    ""
                };
                let value = Password::new()
                    .with_prompt(format!("{}{}", label, hint))
                    .allow_empty_password(prompt.previous_value.is_some())
                    .interact()?;
                match (&prompt.previous_value, value.is_empty()) {
                    (Some(previous), true) => Ok(previous.clone()),
                    _ => Ok(value),
                }
            }
            PromptKind::Multiline => {
                output::dimmed(&format!("opening editor for {}", label));
                let initial = prompt.previous_value.clone().unwrap_or_default();
                match Editor::new().edit(&initial)? {
                    Some(value) => Ok(value),
                    None => prompt.previous_value.clone().ok_or_else(|| {
                        ConfigError::MissingPrompt {
                            generator: generator.to_string(),
                            prompt: prompt.name.clone(),
                        }
                        .into()
                    }),
                }
            }
        }
    }
}

fn prompt_values(assignments: &[String]) -> Result<PromptValues> {
    let mut values = PromptValues::new();
    for arg in assignments {
        let (generator, prompt, value) =
            parse_assignment(arg).ok_or_else(|| ConfigError::InvalidValue {
                field: "prompt",
                reason: format!("expected GENERATOR.PROMPT=VALUE, got '{}'", arg),
            })?;
        values.entry(generator).or_default().insert(prompt, value);
    }
    Ok(values)
}

/// Generate vars.
pub fn execute(config: &Path, options: Options) -> Result<()> {
    let fleet = super::open(config)?;
    let request = GenerateRequest {
        machines: options.machines,
        regenerate: options.regenerate,
        generator: options.generator,
        jobs: options.jobs,
        prompt_values: prompt_values(&options.prompts)?,
    };

    let terminal = Terminal::default();
    let source: &dyn PromptSource = if options.no_input || !io::stdin().is_terminal() {
        &NonInteractive
    } else {
        &terminal
    };

    let results = fleet.generate(&request, source)?;
    if results.is_empty() {
        output::dimmed("no machines declared");
        return Ok(());
    }

    let mut first_error: Option<Error> = None;
    for (machine, result) in results {
        output::section(&machine);
        let report = match result {
            Ok(report) => report,
            Err(e) => {
                output::error(&e.to_string());
                first_error.get_or_insert(e);
                continue;
            }
        };

        for (generator, outcome) in report.generators {
            match outcome {
                Outcome::Generated { .. } | Outcome::Reencrypted { .. } => {
                    output::success(&format!("{}: {}", output::key(&generator), outcome))
                }
                Outcome::UpToDate => output::dimmed(&format!("  {}: {}", generator, outcome)),
                Outcome::Skipped { .. } => {
                    output::warn(&format!("{}: {}", output::key(&generator), outcome))
                }
                Outcome::Failed(e) => {
                    output::error(&format!("{}: {}", output::key(&generator), e));
                    first_error.get_or_insert(e);
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            info!("generation finished");
            Ok(())
        }
    }
}

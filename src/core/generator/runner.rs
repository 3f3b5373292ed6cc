//! Running a machine's generators.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::{debug, info, warn};

use super::cache::RunCache;
use super::graph;
use super::prompt::{self, PromptSource, PromptValues};
use super::script::{self, Inputs};
use crate::core::access::Principal;
use crate::core::domain::{Generator, Outcome, RunReport, Var};
use crate::core::lock::FileLock;
use crate::core::store::Stores;
use crate::core::types::{GeneratorName, MachineName};
use crate::error::{ConfigError, Result};

/// What to run for one machine.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Only these generators and their dependencies; empty means all.
    pub selected: Vec<GeneratorName>,
    /// Regenerate these even if their outputs exist.
    pub forced: BTreeSet<GeneratorName>,
    pub prompt_values: PromptValues,
}

/// Runs generators against a pair of stores.
pub struct Runner<'a> {
    stores: &'a Stores,
    lock_dir: PathBuf,
    prompts: &'a dyn PromptSource,
    cache: &'a RunCache,
    shared_owners: BTreeMap<GeneratorName, Vec<MachineName>>,
}

impl<'a> Runner<'a> {
    pub fn new(
        stores: &'a Stores,
        lock_dir: impl Into<PathBuf>,
        prompts: &'a dyn PromptSource,
        cache: &'a RunCache,
    ) -> Self {
        Self {
            stores,
            lock_dir: lock_dir.into(),
            prompts,
            cache,
            shared_owners: BTreeMap::new(),
        }
    }

    /// Machines that must be able to read each shared generator's secrets.
    pub fn with_shared_owners(mut self, owners: BTreeMap<GeneratorName, Vec<MachineName>>) -> Self {
        self.shared_owners = owners;
        self
    }

    /// Run `generators` of `machine` in dependency order.
    ///
    /// Per-generator failures are recorded in the report; dependents of a
    /// failed generator are skipped. Graph errors fail the whole call.
    pub fn run(
        &self,
        machine: &str,
        generators: &BTreeMap<GeneratorName, Generator>,
        request: &RunRequest,
    ) -> Result<RunReport> {
        let order = graph::execution_order(machine, generators, &request.selected)?;
        for name in &request.forced {
            if !generators.contains_key(name) {
                return Err(ConfigError::UnknownGenerator {
                    machine: machine.to_string(),
                    name: name.clone(),
                }
                .into());
            }
        }
        let forced = graph::with_dependents(generators, &request.forced);

        let mut report = RunReport::new(machine);
        for name in order {
            let generator = &generators[&name];
            let blocked = generator
                .dependencies
                .iter()
                .find(|dep| report.outcome(dep).map(|o| !o.is_usable()).unwrap_or(false));

            let outcome = match blocked {
                Some(dep) => Outcome::Skipped {
                    failed_dependency: dep.clone(),
                },
                None => {
                    match self.run_one(machine, generator, generators, forced.contains(&name), request) {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            warn!(machine, generator = %name, "generator failed: {}", e);
                            Outcome::Failed(e)
                        }
                    }
                }
            };
            debug!(machine, generator = %name, %outcome);
            report.generators.push((name, outcome));
        }
        Ok(report)
    }

    fn run_one(
        &self,
        machine: &str,
        generator: &Generator,
        generators: &BTreeMap<GeneratorName, Generator>,
        forced: bool,
        request: &RunRequest,
    ) -> Result<Outcome> {
        // Shared generators: check and generate under one lock so a second
        // machine waiting here sees the first one's outputs.
        let _lock = if generator.share {
            let path = self.lock_dir.join(format!("shared-{}.lock", generator.name));
            Some(FileLock::acquire(&path)?)
        } else {
            None
        };

        let forced = forced && !(generator.share && self.cache.shared_generated(&generator.name));
        let owners = self.owners(machine, generator);
        let vars = generator.vars(&machine.to_string());

        if !forced && self.all_exist(&vars)? {
            let mut refreshed = 0;
            for var in vars.iter().filter(|v| v.secret) {
                self.stores.secret.prepare(&var.key, &owners)?;
                if self.stores.secret.needs_refresh(&var.key)? {
                    self.stores.secret.refresh(&var.key)?;
                    refreshed += 1;
                }
            }
            return Ok(if refreshed > 0 {
                Outcome::Reencrypted { files: refreshed }
            } else {
                Outcome::UpToDate
            });
        }

        let mut answers = BTreeMap::new();
        for prompt in &generator.prompts {
            let mut prompt = prompt.clone();
            if prompt.create_file {
                prompt.previous_value = self.previous_value(machine, generator, &prompt.name)?;
            }
            let value = prompt::resolve(&generator.name, &prompt, &request.prompt_values, self.prompts)?;
            answers.insert(prompt.name.clone(), value);
        }

        let mut inputs = Inputs::new();
        for dependency in &generator.dependencies {
            let files = inputs.entry(dependency.clone()).or_default();
            for var in generators[dependency].vars(&machine.to_string()) {
                let value = self.stores.for_var(&var).get(&var.key)?;
                files.insert(var.key.file.clone(), value);
            }
        }

        let outputs = script::run(generator, &inputs, &answers)?;

        // Everything validated; make sure every secret has recipients before
        // the first write so a commit never stops halfway.
        for var in vars.iter().filter(|v| v.secret) {
            self.stores.secret.prepare(&var.key, &owners)?;
        }
        for var in &vars {
            let value = &outputs[&var.key.file];
            self.stores.for_var(var).set(&var.key, value)?;
        }

        if generator.share {
            self.cache.mark_shared_generated(&generator.name);
        }
        info!(machine, generator = %generator.name, files = vars.len(), "generated");
        Ok(Outcome::Generated { files: vars.len() })
    }

    fn all_exist(&self, vars: &[Var]) -> Result<bool> {
        for var in vars {
            if !self.stores.for_var(var).exists(&var.key)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Stored answer of a `create_file` prompt: public store first, then secret.
    fn previous_value(&self, machine: &str, generator: &Generator, prompt: &str) -> Result<Option<String>> {
        let key = generator.key(machine, prompt);
        for store in [&self.stores.public, &self.stores.secret] {
            if store.exists(&key)? {
                let value = store.get(&key)?;
                return Ok(Some(String::from_utf8_lossy(&value).into_owned()));
            }
        }
        Ok(None)
    }

    fn owners(&self, machine: &str, generator: &Generator) -> Vec<Principal> {
        if generator.share {
            match self.shared_owners.get(&generator.name) {
                Some(machines) => machines.iter().cloned().map(Principal::Machine).collect(),
                None => vec![Principal::Machine(machine.to_string())],
            }
        } else {
            vec![Principal::Machine(machine.to_string())]
        }
    }
}

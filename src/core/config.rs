//! Fleet configuration.
//!
//! Handles reading, writing, and validating `fleet.toml`: the store backends
//! and every machine with its generators.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::constants;
use crate::core::domain::{Generator, Scope, Var, VarKey};
use crate::core::store::StoreKind;
use crate::core::types::{GeneratorName, MachineName};
use crate::core::validation::validate_name;
use crate::error::{suggestions, AccessError, ConfigError, Result};

/// Contents of `fleet.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetConfig {
    pub fleet: Meta,
    #[serde(default)]
    pub machines: BTreeMap<MachineName, Machine>,
}

/// `[fleet]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    /// Configuration version
    pub version: String,
    /// Backend tag for secret vars
    #[serde(default = "default_secret_store")]
    pub secret_store: String,
    /// Backend tag for public vars
    #[serde(default = "default_public_store")]
    pub public_store: String,
    /// Extra `-o` options for ssh and rsync
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ssh_options: Vec<String>,
}

/// One `[machines.<name>]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Machine {
    /// Filled in from the table key.
    #[serde(default, skip_serializing)]
    pub name: MachineName,
    /// `user@host` used by `upload`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_host: Option<String>,
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    #[serde(default)]
    pub generators: BTreeMap<GeneratorName, Generator>,
}

fn default_secret_store() -> String {
    StoreKind::Age.tag().to_string()
}

fn default_public_store() -> String {
    StoreKind::InRepo.tag().to_string()
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from(constants::DEFAULT_UPLOAD_DIR)
}

impl Machine {
    /// Secret vars that are copied to the target host, in key order.
    pub fn deployed_secrets(&self) -> Vec<VarKey> {
        let mut keys: Vec<VarKey> = self
            .generators
            .values()
            .flat_map(|g| g.vars(&self.name))
            .filter(|v| v.secret && v.deploy)
            .map(|v| v.key)
            .collect();
        keys.sort();
        keys
    }
}

impl FleetConfig {
    /// Empty configuration with the default stores.
    pub fn new() -> Self {
        Self {
            fleet: Meta {
                version: env!("CARGO_PKG_VERSION").to_string(),
                secret_store: default_secret_store(),
                public_store: default_public_store(),
                ssh_options: Vec::new(),
            },
            machines: BTreeMap::new(),
        }
    }

    /// Parse and validate a config from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(contents).map_err(ConfigError::Parse)?;
        for (machine_name, machine) in config.machines.iter_mut() {
            machine.name = machine_name.clone();
            for (generator_name, generator) in machine.generators.iter_mut() {
                generator.name = generator_name.clone();
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Load `fleet.toml` from `path`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the file doesn't exist,
    /// `ConfigError::Parse` if the TOML is malformed, or a validation error.
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()).into());
        }
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config = Self::from_toml(&contents)?;

        debug!(machines = config.machines.len(), "config loaded");
        Ok(config)
    }

    pub fn secret_store(&self) -> Result<StoreKind> {
        Ok(self.fleet.secret_store.parse()?)
    }

    pub fn public_store(&self) -> Result<StoreKind> {
        Ok(self.fleet.public_store.parse()?)
    }

    /// Look up a machine, suggesting close names on a miss.
    pub fn machine(&self, name: &str) -> Result<&Machine> {
        self.machines.get(name).ok_or_else(|| {
            let available: Vec<String> = self.machines.keys().cloned().collect();
            ConfigError::UnknownMachine {
                name: name.to_string(),
                suggestions: suggestions(name, &available),
            }
            .into()
        })
    }

    /// The declared var behind `key`, if a machine declares it.
    pub fn var(&self, key: &VarKey) -> Option<Var> {
        let machines: Vec<&Machine> = match &key.scope {
            Scope::Machine(name) => self.machines.get(name).into_iter().collect(),
            Scope::Shared => self.machines.values().collect(),
        };
        machines.into_iter().find_map(|machine| {
            machine
                .generators
                .get(&key.generator)?
                .vars(&machine.name)
                .into_iter()
                .find(|var| var.key == *key)
        })
    }

    /// Like [`FleetConfig::var`], failing with `UnknownSecret` for keys no
    /// machine declares.
    pub fn declared(&self, key: &VarKey) -> Result<Var> {
        self.var(key)
            .ok_or_else(|| AccessError::UnknownSecret(key.to_string()).into())
    }

    /// Machines declaring each shared generator.
    pub fn shared_owners(&self) -> BTreeMap<GeneratorName, Vec<MachineName>> {
        let mut owners: BTreeMap<GeneratorName, Vec<MachineName>> = BTreeMap::new();
        for (machine_name, machine) in &self.machines {
            for generator in machine.generators.values().filter(|g| g.share) {
                owners
                    .entry(generator.name.clone())
                    .or_default()
                    .push(machine_name.clone());
            }
        }
        owners
    }

    /// Validate the configuration.
    ///
    /// Checks:
    /// - Version is present and looks like a version
    /// - Store tags are known and the secret store encrypts
    /// - Machine, generator, file and prompt names are path-safe
    /// - Dependencies are declared on the same machine
    /// - Shared generators only depend on shared generators
    /// - `create_file` prompts are declared as files
    /// - Every machine declares a shared generator identically
    pub fn validate(&self) -> Result<()> {
        debug!("validating config");

        if self.fleet.version.is_empty() {
            return Err(ConfigError::MissingField { field: "version" }.into());
        }
        if self.fleet.version.split('.').count() < 2 {
            return Err(ConfigError::InvalidValue {
                field: "version",
                reason: format!("not a valid version: {}", self.fleet.version),
            }
            .into());
        }

        let secret_store = self.secret_store()?;
        self.public_store()?;
        if !secret_store.holds_secrets() {
            return Err(ConfigError::InvalidValue {
                field: "secret_store",
                reason: format!("'{}' stores plaintext and cannot hold secrets", secret_store),
            }
            .into());
        }

        for (machine_name, machine) in &self.machines {
            validate_name("machine", machine_name)?;
            for (name, generator) in &machine.generators {
                validate_generator(name, generator, &machine.generators)?;
            }
        }

        self.validate_shared()
    }

    fn validate_shared(&self) -> Result<()> {
        let mut first: BTreeMap<&str, (&str, &Generator)> = BTreeMap::new();
        for (machine_name, machine) in &self.machines {
            for (name, generator) in machine.generators.iter().filter(|(_, g)| g.share) {
                match first.get(name.as_str()) {
                    Some((other_machine, other)) if !other.same_declaration(generator) => {
                        return Err(ConfigError::SharedMismatch {
                            generator: name.clone(),
                            machines: format!("{} and {}", other_machine, machine_name),
                        }
                        .into());
                    }
                    Some(_) => {}
                    None => {
                        first.insert(name.as_str(), (machine_name.as_str(), generator));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_generator(
    name: &str,
    generator: &Generator,
    siblings: &BTreeMap<GeneratorName, Generator>,
) -> Result<()> {
    validate_name("generator", name)?;
    for file in generator.files.keys() {
        validate_name("file", file)?;
    }

    for dependency in &generator.dependencies {
        let Some(target) = siblings.get(dependency) else {
            return Err(ConfigError::UnknownDependency {
                generator: name.to_string(),
                dependency: dependency.clone(),
            }
            .into());
        };
        if generator.share && !target.share {
            return Err(ConfigError::InvalidValue {
                field: "dependencies",
                reason: format!(
                    "shared generator '{}' depends on per-machine generator '{}'",
                    name, dependency
                ),
            }
            .into());
        }
    }

    for prompt in &generator.prompts {
        validate_name("prompt", &prompt.name)?;
        if prompt.create_file && !generator.files.contains_key(&prompt.name) {
            return Err(ConfigError::InvalidValue {
                field: "prompts",
                reason: format!(
                    "prompt '{}' of '{}' has create_file but no file of that name",
                    prompt.name, name
                ),
            }
            .into());
        }
    }
    Ok(())
}

/// Ensure `.gitignore` in `repo` ignores local lock files.
///
/// # Errors
///
/// Returns error if file operations fail.
pub fn ensure_gitignore(repo: &Path) -> Result<()> {
    let gitignore = repo.join(".gitignore");

    let existing = if gitignore.exists() {
        std::fs::read_to_string(&gitignore)?
    } else {
        String::new()
    };

    let mut updated = existing.clone();
    for entry in constants::GITIGNORE_ENTRIES {
        if !existing.lines().any(|l| l.trim() == *entry) {
            if !updated.is_empty() && !updated.ends_with('\n') {
                updated.push('\n');
            }
            updated.push_str(entry);
            updated.push('\n');
        }
    }

    if updated != existing {
        std::fs::write(&gitignore, updated)?;
    }

    Ok(())
}

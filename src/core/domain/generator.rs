//! Generator declarations.
//!
//! These types are deserialized straight from `fleet.toml`. Generators only
//! ever refer to their machine by name; the fleet owns the machine table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::var::{Scope, VarKey};
use crate::core::types::{FileName, GeneratorName, MachineName};

/// A named unit producing one or more vars via a script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generator {
    /// Filled in from the table key when the config is loaded.
    #[serde(default, skip_serializing)]
    pub name: GeneratorName,
    /// Generators whose outputs this one reads from `$in`.
    #[serde(default)]
    pub dependencies: Vec<GeneratorName>,
    /// Shell script run with `sh -c`.
    pub script: String,
    /// Generated once for every machine declaring it.
    #[serde(default)]
    pub share: bool,
    #[serde(default)]
    pub prompts: Vec<Prompt>,
    #[serde(default)]
    pub files: BTreeMap<FileName, FileSpec>,
}

/// Storage and deployment flags of one output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSpec {
    #[serde(default = "default_true")]
    pub secret: bool,
    #[serde(default = "default_true")]
    pub deploy: bool,
}

impl Default for FileSpec {
    fn default() -> Self {
        Self {
            secret: true,
            deploy: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// How a prompt is asked interactively.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    #[default]
    Line,
    Hidden,
    Multiline,
}

/// A value the generator needs from a human.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kind: PromptKind,
    /// Also store the answer as an output file of the same name.
    #[serde(default)]
    pub create_file: bool,
    /// Value found in the stores; never read from config.
    #[serde(skip)]
    pub previous_value: Option<String>,
}

/// One output file of a generator, resolved for a machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Var {
    pub key: VarKey,
    pub secret: bool,
    pub deploy: bool,
}

impl Generator {
    /// Scope the outputs of this generator live in for `machine`.
    pub fn scope(&self, machine: &str) -> Scope {
        if self.share {
            Scope::Shared
        } else {
            Scope::Machine(machine.to_string())
        }
    }

    /// Store key of one of this generator's files.
    pub fn key(&self, machine: &str, file: &str) -> VarKey {
        VarKey::new(self.scope(machine), self.name.clone(), file)
    }

    /// Every declared output file as a var of `machine`.
    pub fn vars(&self, machine: &MachineName) -> Vec<Var> {
        self.files
            .iter()
            .map(|(file, spec)| Var {
                key: self.key(machine, file),
                secret: spec.secret,
                deploy: spec.deploy,
            })
            .collect()
    }

    /// Whether two machines declared this shared generator identically.
    pub fn same_declaration(&self, other: &Generator) -> bool {
        self.script == other.script
            && self.dependencies == other.dependencies
            && self.files == other.files
            && self.prompts.len() == other.prompts.len()
            && self
                .prompts
                .iter()
                .zip(&other.prompts)
                .all(|(a, b)| a.name == b.name && a.create_file == b.create_file)
    }
}

impl std::fmt::Display for Var {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{} ({}{})",
            self.key.generator,
            self.key.file,
            if self.secret { "secret" } else { "public" },
            if self.deploy { "" } else { ", not deployed" }
        )
    }
}

//! Var keys.
//!
//! A var is one output file of a generator. Its key decides where every
//! store puts it and doubles as the secret reference used in grants.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::types::{FileName, GeneratorName, MachineName, SecretRef};
use crate::core::validation::validate_name;
use crate::error::{AccessError, Error, Result};

/// Owner of a var: one machine, or every machine sharing the generator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Scope {
    Machine(MachineName),
    Shared,
}

/// Store key of a single var.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VarKey {
    pub scope: Scope,
    pub generator: GeneratorName,
    pub file: FileName,
}

impl VarKey {
    pub fn new(scope: Scope, generator: impl Into<String>, file: impl Into<String>) -> Self {
        Self {
            scope,
            generator: generator.into(),
            file: file.into(),
        }
    }

    /// Key of a per-machine var.
    pub fn machine(
        machine: impl Into<String>,
        generator: impl Into<String>,
        file: impl Into<String>,
    ) -> Self {
        Self::new(Scope::Machine(machine.into()), generator, file)
    }

    /// Key of a shared var.
    pub fn shared(generator: impl Into<String>, file: impl Into<String>) -> Self {
        Self::new(Scope::Shared, generator, file)
    }

    /// Relative path of this var inside a store root.
    pub fn rel_path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        match &self.scope {
            Scope::Machine(machine) => {
                path.push("per-machine");
                path.push(machine);
            }
            Scope::Shared => path.push("shared"),
        }
        path.push(&self.generator);
        path.push(&self.file);
        path
    }

    /// Secret reference used by the access registry.
    pub fn secret_ref(&self) -> SecretRef {
        self.to_string()
    }

    pub fn is_shared(&self) -> bool {
        matches!(self.scope, Scope::Shared)
    }
}

impl fmt::Display for VarKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Machine(machine) => write!(
                f,
                "per-machine/{}/{}/{}",
                machine, self.generator, self.file
            ),
            Scope::Shared => write!(f, "shared/{}/{}", self.generator, self.file),
        }
    }
}

impl FromStr for VarKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        let key = match parts.as_slice() {
            ["per-machine", machine, generator, file] => {
                validate_name("machine", machine)?;
                VarKey::machine(*machine, *generator, *file)
            }
            ["shared", generator, file] => VarKey::shared(*generator, *file),
            _ => return Err(AccessError::UnknownSecret(s.to_string()).into()),
        };
        validate_name("generator", &key.generator)?;
        validate_name("file", &key.file)?;
        Ok(key)
    }
}

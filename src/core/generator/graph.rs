//! Generator dependency graph.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::domain::Generator;
use crate::core::types::GeneratorName;
use crate::error::{ConfigError, GenerateError, Result};

/// Order generators so each comes after its dependencies.
///
/// With an empty `selected` every generator is ordered; otherwise only the
/// selected ones and what they (transitively) depend on. Ties keep name order.
///
/// # Errors
///
/// `GenerateError::DependencyCycle` naming the cycle, or a `ConfigError` for
/// an undeclared dependency or an unknown selected generator.
pub fn execution_order(
    machine: &str,
    generators: &BTreeMap<GeneratorName, Generator>,
    selected: &[GeneratorName],
) -> Result<Vec<GeneratorName>> {
    let roots: Vec<&GeneratorName> = if selected.is_empty() {
        generators.keys().collect()
    } else {
        for name in selected {
            if !generators.contains_key(name) {
                return Err(ConfigError::UnknownGenerator {
                    machine: machine.to_string(),
                    name: name.clone(),
                }
                .into());
            }
        }
        selected.iter().collect()
    };

    let mut sorted = Vec::new();
    let mut visited = BTreeSet::new();
    let mut path = Vec::new();
    for root in roots {
        visit(root, generators, &mut visited, &mut path, &mut sorted)?;
    }
    Ok(sorted)
}

fn visit(
    name: &GeneratorName,
    generators: &BTreeMap<GeneratorName, Generator>,
    visited: &mut BTreeSet<GeneratorName>,
    path: &mut Vec<GeneratorName>,
    sorted: &mut Vec<GeneratorName>,
) -> Result<()> {
    if visited.contains(name) {
        return Ok(());
    }
    if let Some(start) = path.iter().position(|n| n == name) {
        let mut cycle = path[start..].to_vec();
        cycle.push(name.clone());
        return Err(GenerateError::DependencyCycle { cycle }.into());
    }

    let generator = generators.get(name).ok_or_else(|| ConfigError::UnknownDependency {
        generator: path.last().cloned().unwrap_or_default(),
        dependency: name.clone(),
    })?;

    path.push(name.clone());
    for dependency in &generator.dependencies {
        visit(dependency, generators, visited, path, sorted)?;
    }
    path.pop();

    visited.insert(name.clone());
    sorted.push(name.clone());
    Ok(())
}

/// `roots` plus every generator that transitively depends on one of them.
pub fn with_dependents(
    generators: &BTreeMap<GeneratorName, Generator>,
    roots: &BTreeSet<GeneratorName>,
) -> BTreeSet<GeneratorName> {
    let mut closed = roots.clone();
    loop {
        let before = closed.len();
        for (name, generator) in generators {
            if generator.dependencies.iter().any(|d| closed.contains(d)) {
                closed.insert(name.clone());
            }
        }
        if closed.len() == before {
            return closed;
        }
    }
}

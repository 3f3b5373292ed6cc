//! Running a generator script.
//!
//! The script gets a fresh temp directory with three subdirectories, exported
//! as `$out` (files it must write), `$prompts` (one file per answer) and
//! `$in` (`<dependency>/<file>` for every dependency output). The directory
//! is removed when the run ends, whatever the result.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use tempfile::TempDir;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::core::domain::Generator;
use crate::core::types::{FileName, GeneratorName};
use crate::error::{GenerateError, Result};

/// Plaintext values keyed by file name.
pub type Outputs = BTreeMap<FileName, Zeroizing<Vec<u8>>>;

/// Dependency outputs keyed by generator.
pub type Inputs = BTreeMap<GeneratorName, Outputs>;

/// Run `generator.script` and collect its declared outputs.
///
/// # Errors
///
/// `GenerateError::ScriptFailed` on a non-zero exit,
/// `GenerateError::MissingOutput` if a declared file was not produced.
pub fn run(generator: &Generator, inputs: &Inputs, prompts: &BTreeMap<String, String>) -> Result<Outputs> {
    let spawn_err = |source| GenerateError::Spawn {
        generator: generator.name.clone(),
        source,
    };

    let work = TempDir::new().map_err(spawn_err)?;
    let out = work.path().join("out");
    let prompts_dir = work.path().join("prompts");
    let in_dir = work.path().join("in");
    for dir in [&out, &prompts_dir, &in_dir] {
        fs::create_dir_all(dir).map_err(spawn_err)?;
    }

    for (name, value) in prompts {
        fs::write(prompts_dir.join(name), value).map_err(spawn_err)?;
    }
    for (dependency, files) in inputs {
        let dir = in_dir.join(dependency);
        fs::create_dir_all(&dir).map_err(spawn_err)?;
        for (file, value) in files {
            fs::write(dir.join(file), value.as_slice()).map_err(spawn_err)?;
        }
    }

    debug!(generator = %generator.name, "running script");
    trace!(script = %generator.script);
    let output = Command::new("sh")
        .arg("-c")
        .arg(&generator.script)
        .current_dir(work.path())
        .env("out", &out)
        .env("prompts", &prompts_dir)
        .env("in", &in_dir)
        .stdin(Stdio::null())
        .output()
        .map_err(spawn_err)?;

    if !output.status.success() {
        return Err(GenerateError::ScriptFailed {
            generator: generator.name.clone(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    for prompt in generator.prompts.iter().filter(|p| p.create_file) {
        let target = out.join(&prompt.name);
        if !target.exists() {
            if let Some(value) = prompts.get(&prompt.name) {
                fs::write(&target, value).map_err(spawn_err)?;
            }
        }
    }

    collect(generator, &out)
}

fn collect(generator: &Generator, out: &Path) -> Result<Outputs> {
    let missing: Vec<String> = generator
        .files
        .keys()
        .filter(|file| !out.join(file).is_file())
        .cloned()
        .collect();
    if !missing.is_empty() {
        return Err(GenerateError::MissingOutput {
            generator: generator.name.clone(),
            files: missing,
        }
        .into());
    }

    let mut outputs = Outputs::new();
    for file in generator.files.keys() {
        let value = fs::read(out.join(file)).map_err(|source| GenerateError::Spawn {
            generator: generator.name.clone(),
            source,
        })?;
        outputs.insert(file.clone(), Zeroizing::new(value));
    }
    Ok(outputs)
}

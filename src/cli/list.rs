//! List command.

use std::path::Path;

use crate::cli::output;
use crate::error::Result;

/// List declared vars of one or all machines.
pub fn execute(config: &Path, machine: Option<String>, json: bool) -> Result<()> {
    let fleet = super::open(config)?;
    let machines: Vec<String> = machine.into_iter().collect();
    let statuses = fleet.list(&machines)?;

    if json {
        let out = serde_json::to_string_pretty(&statuses)
            .map_err(|e| crate::error::Error::Other(e.to_string()))?;
        output::data(&out);
        return Ok(());
    }

    if statuses.is_empty() {
        output::dimmed("no vars declared");
        return Ok(());
    }

    let mut current: Option<&str> = None;
    for status in &statuses {
        if current != Some(status.machine.as_str()) {
            output::section(&status.machine);
            current = Some(&status.machine);
        }

        let name = format!("{}/{}", status.generator, status.file);
        let mut flags = vec![if status.secret { "secret" } else { "public" }];
        if status.shared {
            flags.push("shared");
        }
        if !status.deploy {
            flags.push("not deployed");
        }
        let state = match (status.present, status.stale) {
            (false, _) => "missing",
            (true, true) => "stale recipients",
            (true, false) => "ok",
        };
        output::kv(&output::key(&name), format!("{} ({})", state, flags.join(", ")));
    }
    Ok(())
}

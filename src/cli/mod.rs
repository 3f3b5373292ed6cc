//! Command-line interface.

pub mod access;
pub mod completions;
pub mod delete;
pub mod generate;
pub mod keygen;
pub mod list;
pub mod output;
pub mod upload;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use crate::core::constants;
use crate::core::fleet::Fleet;
use crate::error::Result;

/// fleetvars - generate, encrypt and deploy per-machine secrets.
#[derive(Parser)]
#[command(
    name = "fleetvars",
    about = "Generate, encrypt and deploy per-machine secrets and vars",
    version
)]
pub struct Cli {
    /// Path to the fleet config
    #[arg(long, global = true, env = "FLEETVARS_CONFIG", default_value = constants::CONFIG_FILE)]
    pub config: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Run generators whose outputs are missing
    Generate {
        /// Machines to generate for (default: all)
        machines: Vec<String>,
        /// Regenerate even if outputs exist
        #[arg(short, long)]
        regenerate: bool,
        /// Only this generator and its dependencies
        #[arg(short, long)]
        generator: Option<String>,
        /// Machines generated in parallel
        #[arg(short, long, default_value_t = 1)]
        jobs: usize,
        /// Prompt answer as GENERATOR.PROMPT=VALUE
        #[arg(long = "prompt", value_name = "GEN.PROMPT=VALUE")]
        prompts: Vec<String>,
        /// Never ask; fail on prompts without a value
        #[arg(long)]
        no_input: bool,
    },

    /// List declared vars and whether they exist
    List {
        /// Only this machine
        machine: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Upload deployed secrets to target hosts
    Upload {
        /// Machines to upload (default: all)
        machines: Vec<String>,
    },

    /// Manage user keys
    Users {
        #[command(subcommand)]
        action: IdentityAction,
    },

    /// Manage machine keys
    Machines {
        #[command(subcommand)]
        action: IdentityAction,
    },

    /// Manage groups
    Groups {
        #[command(subcommand)]
        action: GroupAction,
    },

    /// Allow a principal to decrypt a secret
    Grant {
        /// Secret, e.g. per-machine/m1/gen/file or shared/gen/file
        secret: String,
        /// user:NAME, machine:NAME or group:NAME
        principal: String,
    },

    /// Stop a principal from decrypting a secret
    Revoke {
        /// Secret, e.g. per-machine/m1/gen/file or shared/gen/file
        secret: String,
        /// user:NAME, machine:NAME or group:NAME
        principal: String,
    },

    /// Delete a stored var and its grants
    Delete {
        /// Var, e.g. per-machine/m1/gen/file or shared/gen/file
        secret: String,
        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Set or show the principals granted on every new secret
    Defaults {
        /// user:NAME, machine:NAME or group:NAME (none: show current)
        principals: Vec<String>,
    },

    /// Generate an operator key
    Keygen {
        /// Key file (default: ~/.config/fleetvars/keys.txt)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Overwrite an existing key file
        #[arg(short, long)]
        force: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

/// `users` and `machines` subcommands.
#[derive(Subcommand)]
pub enum IdentityAction {
    /// Register a public key
    Add {
        name: String,
        /// age public key (age1...)
        key: String,
        /// Replace an existing key and re-encrypt its secrets
        #[arg(short, long)]
        force: bool,
    },

    /// Remove an identity with its memberships and grants
    Rm { name: String },

    /// List identities
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// `groups` subcommands.
#[derive(Subcommand)]
pub enum GroupAction {
    /// Add a user or machine to a group (creates the group)
    AddMember {
        group: String,
        /// user:NAME or machine:NAME
        member: String,
    },

    /// Remove a member (an emptied group is deleted)
    RmMember {
        group: String,
        /// user:NAME or machine:NAME
        member: String,
    },

    /// List groups and members
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute a command.
pub fn execute(command: Command, config: &Path) -> Result<()> {
    use crate::core::access::IdentityKind;
    use Command::*;

    match command {
        Generate {
            machines,
            regenerate,
            generator,
            jobs,
            prompts,
            no_input,
        } => generate::execute(
            config,
            generate::Options {
                machines,
                regenerate,
                generator,
                jobs,
                prompts,
                no_input,
            },
        ),
        List { machine, json } => list::execute(config, machine, json),
        Upload { machines } => upload::execute(config, &machines),
        Users { action } => access::identities(config, IdentityKind::User, action),
        Machines { action } => access::identities(config, IdentityKind::Machine, action),
        Groups { action } => access::groups(config, action),
        Grant { secret, principal } => access::grant(config, &secret, &principal),
        Revoke { secret, principal } => access::revoke(config, &secret, &principal),
        Delete { secret, yes } => delete::execute(config, &secret, yes),
        Defaults { principals } => access::defaults(config, &principals),
        Keygen { output, force } => keygen::execute(output, force),
        Completions { shell } => completions::execute(shell),
    }
}

/// Open the fleet for a command.
fn open(config: &Path) -> Result<Fleet> {
    Fleet::open(config)
}

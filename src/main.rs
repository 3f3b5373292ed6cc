//! fleetvars - generate, encrypt and deploy per-machine secrets.

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fleetvars::cli::output;
use fleetvars::cli::{execute, Cli};

fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber with env-filter support
    let filter = EnvFilter::try_from_env("FLEETVARS_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("fleetvars=debug")
        } else {
            EnvFilter::new("fleetvars=warn")
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).without_time().with_writer(std::io::stderr))
        .init();

    if let Err(e) = execute(cli.command, &cli.config) {
        output::error(&e.to_string());
        if let Some(hint) = e.hint() {
            output::hint(hint);
        }
        std::process::exit(e.exit_code());
    }
}

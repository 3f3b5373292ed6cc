//! Domain types.

mod generator;
mod report;
mod var;

pub use generator::{FileSpec, Generator, Prompt, PromptKind, Var};
pub use report::{Outcome, RunReport, SyncOutcome};
pub use var::{Scope, VarKey};

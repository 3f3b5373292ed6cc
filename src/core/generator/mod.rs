//! Generator pipeline.
//!
//! Orders a machine's generators by dependency, skips those whose outputs
//! already exist, runs the rest and commits their outputs to the stores.

mod cache;
mod graph;
mod prompt;
mod runner;
mod script;

pub use cache::RunCache;
pub use graph::{execution_order, with_dependents};
pub use prompt::{parse_assignment, NonInteractive, PromptSource, PromptValues};
pub use runner::{RunRequest, Runner};

//! Core library components.
//!
//! Everything below the CLI: configuration, the access registry, store
//! backends, the generator pipeline and remote sync.

pub mod access;
pub mod atomic;
pub mod cipher;
pub mod config;
pub mod constants;
pub mod domain;
pub mod fleet;
pub mod generator;
pub mod keys;
pub mod lock;
pub mod store;
pub mod sync;
pub mod types;
pub mod validation;

//! Application-level utilities for the KeepTower CLI.
//!
//! - Path resolution for config and vault files
//! - The per-invocation context and vault open/close handling

mod context;
mod resolver;

pub use context::AppContext;
pub use resolver::resolve_config_path;

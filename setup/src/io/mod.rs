//! I/O helpers: runtime access, configuration, topology files, operator prompts.

pub mod config;
pub mod docker;
pub mod explorer_store;
pub mod process;
pub mod runtime;
pub mod selection;
pub mod topology;

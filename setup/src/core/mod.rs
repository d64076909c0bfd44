//! Deterministic, pure logic for runtime interrogation.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values (container lists, output text, decoded YAML) and return
//! deterministic outputs suitable for tests.

pub mod candidates;
pub mod explorer;
pub mod locator;
pub mod report;
pub mod script;
pub mod topology;
pub mod types;

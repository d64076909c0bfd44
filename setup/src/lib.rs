//! Container interrogation for the Hyperledger Fabric explorer setup wizard.
//!
//! Given a running Fabric network, the crate finds a peer's container, asks
//! it which channels it has joined, and runs the `discover` tool in a
//! short-lived helper container to learn the channel's peers. The answers
//! feed an explorer connection profile.
//!
//! - **[`core`]**: Pure logic (container matching, output parsing, script
//!   rendering, report decoding, topology and profile types). No I/O.
//! - **[`io`]**: Side effects (Docker CLI adapter, processes, config and
//!   topology files, terminal prompts).
//!
//! Orchestration modules ([`locate`], [`channels`], [`discover`], [`wizard`])
//! combine the two to implement CLI commands.

pub mod channels;
pub mod core;
pub mod discover;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod locate;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod wizard;

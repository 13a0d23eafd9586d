//! Ingestion Integration Tests
//!
//! End-to-end runs through the public `lightning` API:
//! - Scenarios: batching, conflict recovery, failed writes, cancellation
//! - Wire: the same runs over the TCP protocol
//! - Shell: configuration precedence of the `lightning` binary

#[path = "../common/mod.rs"]
mod common;

mod scenarios;
mod shell;
mod wire;

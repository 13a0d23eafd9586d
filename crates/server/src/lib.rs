//! Process shell for the Lightning import client
//!
//! - [`config`]: flags and config file
//! - [`workload`]: mutations to ingest
//! - [`server`]: import client lifecycle (`start` / `ingest` / `close`)
//! - [`status`] and [`http`]: the status endpoint
//! - [`shell`]: signal-driven run loop used by the `lightning` binary

#![warn(clippy::all)]

pub mod config;
pub mod http;
pub mod server;
pub mod shell;
pub mod status;
pub mod workload;

pub use config::{ConfigError, RawConfig, ShellConfig};
pub use http::HttpServer;
pub use server::Server;
pub use shell::{ingest_grace, run, run_server, run_with_shutdown, shutdown_signal, SHUTDOWN_GRACE};
pub use status::{ServerState, StatusBoard};
pub use workload::Workload;

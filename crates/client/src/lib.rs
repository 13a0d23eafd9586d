//! Import engine client for Lightning
//!
//! This crate implements the ingestion protocol against a remote import
//! engine:
//! - [`BatchBuffer`]: pending mutations between flushes
//! - [`EngineSession`]: Closed / Open / ConflictDetected lifecycle of one engine
//! - [`EngineWriter`]: batched, timestamped writes into an open session
//! - [`CommitClock`]: strictly increasing commit timestamps
//! - [`ConnectionManager`] / [`ImportService`]: RPC connections to the engine
//! - [`ImportClient`]: the orchestrator tying the above together
//!
//! The `testing` feature adds an in-memory import engine and a TCP stub
//! serving it.
//!
//! # Example
//!
//! ```ignore
//! use lightning_client::{ClientOptions, ConnectionManager, ImportClient};
//!
//! let manager = Arc::new(ConnectionManager::default());
//! let mut client = ImportClient::connect(manager, "127.0.0.1:8287", session_id, ClientOptions::default()).await?;
//! let summary = client.run(mutations, &cancel).await?;
//! client.close()?;
//! ```

#![warn(clippy::all)]

pub mod buffer;
pub mod client;
pub mod clock;
pub mod config;
pub mod progress;
pub mod rpc;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod writer;

pub use buffer::BatchBuffer;
pub use client::ImportClient;
pub use clock::{CommitClock, SystemTime, TimeSource};
pub use config::{ClientOptions, DEFAULT_BATCH_SIZE};
pub use progress::{BatchReceipt, IngestProgress, IngestSummary};
pub use rpc::{call_with_cancel, ConnectionManager, ImportService, TcpImportClient};
pub use session::{EngineSession, SessionState, MAX_CONFLICT_RECOVERIES};
pub use writer::EngineWriter;

pub use lightning_core::{EngineId, Error, Mutation, MutationOp, Result, SessionId, WriteBatch};
pub use tokio_util::sync::CancellationToken;

//! Lightning - bulk key-value ingestion into a remote import engine
//!
//! Lightning streams Put/Delete mutations into a staging engine on a remote
//! importer in timestamped batches. The engine is later sealed into the
//! storage engine by a separate step.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use lightning::{CancellationToken, ClientOptions, ConnectionManager, ImportClient, Mutation, SessionId};
//!
//! let manager = Arc::new(ConnectionManager::default());
//! let session = SessionId::parse("123e4567-e89b-12d3-a456-426614174000")?;
//! let mut client = ImportClient::connect(manager, "127.0.0.1:8287", session, ClientOptions::default()).await?;
//!
//! let summary = client
//!     .run(vec![Mutation::put("k1", "v1")], &CancellationToken::new())
//!     .await?;
//! client.close()?;
//! ```
//!
//! # Architecture
//!
//! All operations go through [`ImportClient`], which owns one
//! [`EngineSession`] and opens an [`EngineWriter`] per run. The process
//! shell (config, status endpoint, signals) lives in `lightning-server`.

// Re-export the public API from lightning-client
pub use lightning_client::*;

//! RPC layer to the remote import engine.
//!
//! The engine is reached through the [`ImportService`] trait. The production
//! implementation is [`TcpImportClient`], which speaks a length-delimited
//! MessagePack protocol (see [`proto`]); [`ConnectionManager`] hands out one
//! reusable client per address.
//!
//! Every call site wraps its RPC in [`call_with_cancel`] so a cancellation
//! token reaches each in-flight request.

use std::future::Future;

use async_trait::async_trait;
use lightning_core::{EngineId, Error, Result, WriteBatch};
use tokio_util::sync::CancellationToken;

pub mod manager;
pub mod proto;
pub mod tcp;

pub use manager::ConnectionManager;
pub use tcp::TcpImportClient;

/// Operations exposed by a remote import engine.
///
/// Implementations map remote outcomes onto the error taxonomy:
/// an existing engine on `open_engine` is [`Error::EngineExists`], a rejected
/// batch is [`Error::RemoteWrite`], transport failures are [`Error::Connection`].
#[async_trait]
pub trait ImportService: Send + Sync {
    /// Create the staging engine.
    async fn open_engine(&self, engine: EngineId) -> Result<()>;

    /// Forcibly delete the staging engine if it exists.
    async fn cleanup_engine(&self, engine: EngineId) -> Result<()>;

    /// Apply one batch atomically.
    async fn write_engine(&self, engine: EngineId, batch: &WriteBatch) -> Result<()>;

    /// Release the remote writer handle for the engine.
    async fn close_writer(&self, engine: EngineId) -> Result<()>;
}

/// Run an RPC future, abandoning it if `cancel` fires first.
///
/// A cancelled call reports [`Error::cancelled`]. The remote side may still
/// apply an abandoned request; its outcome is unknown to the caller.
pub async fn call_with_cancel<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    if cancel.is_cancelled() {
        return Err(Error::cancelled());
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::cancelled()),
        res = fut => res,
    }
}

//! Engine writer
//!
//! Binds a [`BatchBuffer`] to an open [`EngineSession`] and turns buffered
//! mutations into write batches stamped by a [`CommitClock`].
//!
//! ## Usage
//!
//! ```ignore
//! let mut writer = EngineWriter::new(&session, 1024);
//! writer.open()?;
//! for m in mutations {
//!     writer.append(m)?;
//!     if writer.is_full() {
//!         writer.flush(&cancel).await?;
//!     }
//! }
//! writer.flush(&cancel).await?;
//! writer.close().await?;
//! ```
//!
//! `close` never flushes: anything still buffered is dropped. A rejected batch
//! is not retried, since the engine may have applied part of it and the
//! protocol carries no idempotency token.

use std::sync::Arc;
use std::time::{Duration, Instant};

use lightning_core::{Error, Mutation, Result, WriteBatch};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::buffer::BatchBuffer;
use crate::clock::CommitClock;
use crate::progress::{BatchReceipt, IngestProgress};
use crate::rpc::call_with_cancel;
use crate::session::EngineSession;

const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(10);

/// Batching writer for one engine session
pub struct EngineWriter<'a> {
    session: &'a EngineSession,
    buffer: BatchBuffer,
    clock: CommitClock,
    progress: Option<Arc<IngestProgress>>,
    close_timeout: Duration,
    opened: bool,
}

impl<'a> EngineWriter<'a> {
    /// Create a closed writer over `session` flushing every `batch_size` mutations
    pub fn new(session: &'a EngineSession, batch_size: usize) -> Self {
        EngineWriter {
            session,
            buffer: BatchBuffer::new(batch_size),
            clock: CommitClock::new(),
            progress: None,
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            opened: false,
        }
    }

    /// Use a specific commit clock
    pub fn with_clock(mut self, clock: CommitClock) -> Self {
        self.clock = clock;
        self
    }

    /// Report acknowledged batches to `progress`
    pub fn with_progress(mut self, progress: Arc<IngestProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Bound the writer-handle release
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Bind to the session
    ///
    /// Idempotent once open.
    ///
    /// # Errors
    /// `Error::NotOpen` unless the session is `Open`.
    pub fn open(&mut self) -> Result<()> {
        if self.opened {
            return Ok(());
        }
        if !self.session.is_open() {
            return Err(self.not_open());
        }
        self.opened = true;
        debug!(engine = %self.session.engine_id(), "engine writer opened");
        Ok(())
    }

    /// Returns true between `open` and `close`
    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Buffer a mutation
    pub fn append(&mut self, mutation: Mutation) -> Result<()> {
        self.buffer.append(mutation)
    }

    /// Returns true once a flush is due
    pub fn is_full(&self) -> bool {
        self.buffer.is_full()
    }

    /// Mutations waiting for the next flush
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Write everything buffered as one batch
    ///
    /// Returns `None` when the buffer was empty. On failure the drained
    /// mutations are not put back.
    pub async fn flush(&mut self, cancel: &CancellationToken) -> Result<Option<BatchReceipt>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let mutations = self.buffer.drain();
        self.write_engine(cancel, mutations).await
    }

    /// Send `mutations` as one batch with the next commit timestamp
    ///
    /// Returns `None` without contacting the engine for an empty batch.
    ///
    /// # Errors
    /// - `Error::NotOpen` if the writer is not open
    /// - `Error::RemoteWrite` if the engine rejected the batch
    /// - `Error::Connection` on transport failure or cancellation
    pub async fn write_engine(
        &mut self,
        cancel: &CancellationToken,
        mutations: Vec<Mutation>,
    ) -> Result<Option<BatchReceipt>> {
        if !self.opened {
            return Err(self.not_open());
        }
        if mutations.is_empty() {
            return Ok(None);
        }

        let engine = self.session.engine_id();
        let batch = WriteBatch::new(self.clock.next(), mutations);
        let started = Instant::now();

        let res = call_with_cancel(
            cancel,
            self.session.service().write_engine(engine, &batch),
        )
        .await;
        if let Err(e) = res {
            error!(engine = %engine, commit_ts = batch.commit_ts, error = %e, "fail to write batch");
            if let Some(progress) = &self.progress {
                progress.record_failure();
            }
            return Err(e);
        }

        let receipt = BatchReceipt {
            commit_ts: batch.commit_ts,
            mutations: batch.len(),
        };
        if let Some(progress) = &self.progress {
            progress.record_batch(receipt.mutations, receipt.commit_ts);
        }
        debug!(
            engine = %engine,
            commit_ts = receipt.commit_ts,
            mutations = receipt.mutations,
            elapsed_us = started.elapsed().as_micros() as u64,
            "batch written"
        );
        Ok(Some(receipt))
    }

    /// Release the remote writer handle
    ///
    /// Sends `CloseWriter` once per `open`; later calls are no-ops. Not
    /// subject to any cancellation token, only to the close timeout.
    pub async fn close(&mut self) -> Result<()> {
        if !self.opened {
            return Ok(());
        }
        self.opened = false;

        let engine = self.session.engine_id();
        if !self.buffer.is_empty() {
            warn!(engine = %engine, dropped = self.buffer.len(), "closing writer with unflushed mutations");
        }
        match time::timeout(self.close_timeout, self.session.service().close_writer(engine)).await {
            Ok(Ok(())) => {
                debug!(engine = %engine, "engine writer closed");
                Ok(())
            }
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::connection(format!(
                "close writer for {} timed out after {:?}",
                engine, self.close_timeout
            ))),
        }
    }

    fn not_open(&self) -> Error {
        Error::NotOpen {
            engine: self.session.engine_id().to_string(),
        }
    }
}

impl Drop for EngineWriter<'_> {
    fn drop(&mut self) {
        if self.opened {
            warn!(engine = %self.session.engine_id(), "engine writer dropped without close");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::ImportService;
    use crate::testing::{Call, MemoryImporter};
    use lightning_core::SessionId;

    fn session_id() -> SessionId {
        SessionId::parse("123e4567-e89b-12d3-a456-426614174000").unwrap()
    }

    async fn open_session(importer: &Arc<MemoryImporter>) -> EngineSession {
        let service: Arc<dyn ImportService> = importer.clone();
        let mut session = EngineSession::new(service, session_id());
        session.open_engine(&CancellationToken::new()).await.unwrap();
        session
    }

    #[tokio::test]
    async fn test_open_requires_open_session() {
        let importer: Arc<dyn ImportService> = Arc::new(MemoryImporter::new());
        let session = EngineSession::new(importer, session_id());
        let mut writer = EngineWriter::new(&session, 2);

        let err = writer.open().unwrap_err();
        assert!(matches!(err, Error::NotOpen { .. }));
        assert!(!writer.is_open());
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let importer = Arc::new(MemoryImporter::new());
        let session = open_session(&importer).await;
        let mut writer = EngineWriter::new(&session, 2);

        writer.open().unwrap();
        writer.open().unwrap();
        writer.close().await.unwrap();
        assert_eq!(importer.close_writer_calls(), 1);
    }

    #[tokio::test]
    async fn test_write_before_open_is_not_open() {
        let importer = Arc::new(MemoryImporter::new());
        let session = open_session(&importer).await;
        let mut writer = EngineWriter::new(&session, 2);

        let err = writer
            .write_engine(&CancellationToken::new(), vec![Mutation::put("k", "v")])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotOpen { .. }));
    }

    #[tokio::test]
    async fn test_flush_writes_one_batch() {
        let importer = Arc::new(MemoryImporter::new());
        let session = open_session(&importer).await;
        let progress = Arc::new(IngestProgress::new());
        let mut writer = EngineWriter::new(&session, 2).with_progress(progress.clone());
        let cancel = CancellationToken::new();
        writer.open().unwrap();

        writer.append(Mutation::put("k1", "v1")).unwrap();
        writer.append(Mutation::put("k2", "v2")).unwrap();
        assert!(writer.is_full());

        let receipt = writer.flush(&cancel).await.unwrap().unwrap();
        assert_eq!(receipt.mutations, 2);
        assert_eq!(writer.buffered(), 0);
        assert_eq!(progress.batches(), 1);
        assert_eq!(progress.mutations(), 2);

        let batches = importer.batches(session.engine_id());
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].commit_ts, receipt.commit_ts);
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_flush_empty_is_noop() {
        let importer = Arc::new(MemoryImporter::new());
        let session = open_session(&importer).await;
        let mut writer = EngineWriter::new(&session, 2);
        writer.open().unwrap();

        assert_eq!(writer.flush(&CancellationToken::new()).await.unwrap(), None);
        assert_eq!(importer.count(|c| matches!(c, Call::WriteEngine(..))), 0);
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_commit_ts_strictly_increasing() {
        let importer = Arc::new(MemoryImporter::new());
        let session = open_session(&importer).await;
        let mut writer = EngineWriter::new(&session, 1);
        let cancel = CancellationToken::new();
        writer.open().unwrap();

        for i in 0..5 {
            writer.append(Mutation::put(format!("k{}", i), "v")).unwrap();
            writer.flush(&cancel).await.unwrap();
        }
        writer.close().await.unwrap();

        let ts: Vec<u64> = importer
            .batches(session.engine_id())
            .iter()
            .map(|b| b.commit_ts)
            .collect();
        assert_eq!(ts.len(), 5);
        assert!(ts.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_rejected_batch_reported_and_not_retried() {
        let importer = Arc::new(MemoryImporter::new().with_failing_write(0));
        let session = open_session(&importer).await;
        let progress = Arc::new(IngestProgress::new());
        let mut writer = EngineWriter::new(&session, 4).with_progress(progress.clone());
        writer.open().unwrap();

        writer.append(Mutation::put("k", "v")).unwrap();
        let err = writer.flush(&CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, Error::RemoteWrite { .. }));
        assert_eq!(writer.buffered(), 0);
        assert_eq!(progress.failed_batches(), 1);
        assert_eq!(importer.count(|c| matches!(c, Call::WriteEngine(..))), 1);
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_close_does_not_flush() {
        let importer = Arc::new(MemoryImporter::new());
        let session = open_session(&importer).await;
        let mut writer = EngineWriter::new(&session, 4);
        writer.open().unwrap();

        writer.append(Mutation::put("k", "v")).unwrap();
        writer.close().await.unwrap();
        assert!(importer.batches(session.engine_id()).is_empty());
        assert_eq!(importer.close_writer_calls(), 1);
    }

    #[tokio::test]
    async fn test_close_twice_sends_once() {
        let importer = Arc::new(MemoryImporter::new());
        let session = open_session(&importer).await;
        let mut writer = EngineWriter::new(&session, 4);
        writer.open().unwrap();

        writer.close().await.unwrap();
        writer.close().await.unwrap();
        assert_eq!(importer.close_writer_calls(), 1);
        assert!(!writer.is_open());
    }

    #[tokio::test]
    async fn test_close_unopened_is_noop() {
        let importer = Arc::new(MemoryImporter::new());
        let session = open_session(&importer).await;
        let mut writer = EngineWriter::new(&session, 4);
        writer.close().await.unwrap();
        assert_eq!(importer.close_writer_calls(), 0);
    }

    #[tokio::test]
    async fn test_close_after_cancellation_still_releases() {
        let importer = Arc::new(MemoryImporter::new());
        let session = open_session(&importer).await;
        let mut writer = EngineWriter::new(&session, 1);
        let cancel = CancellationToken::new();
        writer.open().unwrap();
        cancel.cancel();

        writer.append(Mutation::put("k", "v")).unwrap();
        let err = writer.flush(&cancel).await.unwrap_err();
        assert!(err.is_cancelled());

        writer.close().await.unwrap();
        assert_eq!(importer.close_writer_calls(), 1);
    }
}

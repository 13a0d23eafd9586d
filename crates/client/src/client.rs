//! Import client orchestrator
//!
//! [`ImportClient`] drives one ingestion run end to end:
//!
//! ```text
//! 1. get_connection(addr)                 - ConnectionManager
//! 2. open_engine()                        - EngineSession
//!    on EngineExists: cleanup_engine() and open_engine() once, else abort
//! 3. EngineWriter::open()
//! 4. for each mutation: append; when full, flush with a fresh commit ts
//! 5. flush the remainder
//! 6. EngineWriter::close()                - always, on every exit path
//! ```
//!
//! The pipeline is strictly sequential: one connection, one session, one
//! writer, one batch in flight. Only `EngineExists` is recovered; every other
//! error aborts the remaining steps, and step 6 still runs.

use std::sync::Arc;

use lightning_core::{EngineId, Error, Mutation, Result, SessionId};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::clock::CommitClock;
use crate::config::ClientOptions;
use crate::progress::{IngestProgress, IngestSummary};
use crate::rpc::{ConnectionManager, ImportService};
use crate::session::{EngineSession, SessionState};
use crate::writer::EngineWriter;

/// Connection held by the client and where it came from
struct Connection {
    manager: Arc<ConnectionManager>,
    addr: String,
}

/// Orchestrates session setup, batched writes and release
pub struct ImportClient {
    session: EngineSession,
    options: ClientOptions,
    progress: Arc<IngestProgress>,
    connection: Option<Connection>,
    closed: bool,
}

impl ImportClient {
    /// Create a client over an already resolved service
    pub fn new(service: Arc<dyn ImportService>, session_id: SessionId, options: ClientOptions) -> Self {
        ImportClient {
            session: EngineSession::new(service, session_id),
            options,
            progress: Arc::new(IngestProgress::new()),
            connection: None,
            closed: false,
        }
    }

    /// Resolve `addr` through `manager` and create a client on that connection
    ///
    /// # Errors
    /// - `Error::Config` if `options` are invalid
    /// - `Error::Connection` if the engine cannot be reached
    pub async fn connect(
        manager: Arc<ConnectionManager>,
        addr: &str,
        session_id: SessionId,
        options: ClientOptions,
    ) -> Result<Self> {
        options.validate()?;
        let service = manager.get_connection(addr).await.map_err(|e| {
            error!(addr, error = %e, "fail to get conn");
            e
        })?;
        let mut client = Self::new(service, session_id, options);
        client.connection = Some(Connection {
            manager,
            addr: addr.to_string(),
        });
        Ok(client)
    }

    /// Report progress into a shared counter set
    pub fn with_progress(mut self, progress: Arc<IngestProgress>) -> Self {
        self.progress = progress;
        self
    }

    /// Session identifier
    pub fn session_id(&self) -> SessionId {
        self.session.session_id()
    }

    /// Remote engine identifier
    pub fn engine_id(&self) -> EngineId {
        self.session.engine_id()
    }

    /// Session state
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Cumulative progress counters
    pub fn progress(&self) -> Arc<IngestProgress> {
        self.progress.clone()
    }

    /// Client options
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Open the engine, recovering from a leftover engine once
    ///
    /// A no-op once the engine is open. A failure is returned on every call;
    /// calling again after a failed conflict recovery starts a fresh bounded
    /// recovery.
    pub async fn start(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidState {
                reason: "import client is closed".to_string(),
            });
        }
        if self.session.is_open() {
            return Ok(());
        }
        if self.session.state() == SessionState::ConflictDetected {
            self.session.reset();
        }

        self.session.open_with_recovery(cancel).await.map_err(|e| {
            error!(engine = %self.session.engine_id(), error = %e, "fail to open engine");
            e
        })
    }

    /// Stream `mutations` into the open engine
    ///
    /// The writer is closed before returning, whether the run succeeded,
    /// failed or was cancelled. If both the run and the close fail, the run's
    /// error is returned.
    pub async fn ingest<I>(&self, mutations: I, cancel: &CancellationToken) -> Result<IngestSummary>
    where
        I: IntoIterator<Item = Mutation>,
    {
        let clock = CommitClock::new().resume_after(self.progress.last_commit_ts());
        let mut writer = EngineWriter::new(&self.session, self.options.batch_size)
            .with_clock(clock)
            .with_progress(self.progress.clone())
            .with_close_timeout(self.options.close_timeout);
        writer.open()?;

        let streamed = Self::stream(&mut writer, mutations, cancel).await;
        let closed = writer.close().await;

        match (streamed, closed) {
            (Ok(summary), Ok(())) => {
                info!(
                    engine = %self.session.engine_id(),
                    batches = summary.batches,
                    mutations = summary.mutations,
                    "ingestion finished"
                );
                Ok(summary)
            }
            (Ok(_), Err(e)) => {
                error!(error = %e, "fail to close engine writer");
                Err(e)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(close_err)) => {
                warn!(error = %close_err, "fail to close engine writer after error");
                Err(e)
            }
        }
    }

    async fn stream<I>(
        writer: &mut EngineWriter<'_>,
        mutations: I,
        cancel: &CancellationToken,
    ) -> Result<IngestSummary>
    where
        I: IntoIterator<Item = Mutation>,
    {
        let mut summary = IngestSummary::default();
        for mutation in mutations {
            if cancel.is_cancelled() {
                return Err(Error::cancelled());
            }
            writer.append(mutation)?;
            if writer.is_full() {
                if let Some(receipt) = writer.flush(cancel).await? {
                    summary.record(receipt);
                }
            }
        }
        if let Some(receipt) = writer.flush(cancel).await? {
            summary.record(receipt);
        }
        Ok(summary)
    }

    /// `start` followed by `ingest`
    pub async fn run<I>(&mut self, mutations: I, cancel: &CancellationToken) -> Result<IngestSummary>
    where
        I: IntoIterator<Item = Mutation>,
    {
        self.start(cancel).await?;
        self.ingest(mutations, cancel).await
    }

    /// Release the connection and session state
    ///
    /// The engine itself stays open remotely for the later seal step. Only
    /// the first call does anything.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.session.reset();
        if let Some(conn) = self.connection.take() {
            conn.manager.release(&conn.addr);
        }
        info!(session = %self.session.session_id(), "import client closed");
        Ok(())
    }

    /// Returns true after `close`
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

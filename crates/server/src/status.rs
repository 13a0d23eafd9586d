//! Server state surfaced by the status endpoint

use std::fmt;
use std::sync::Arc;

use lightning_client::IngestProgress;
use lightning_core::{EngineId, SessionId};
use parking_lot::RwLock;

/// Coarse lifecycle state of the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerState {
    /// Connecting and opening the engine
    Starting,
    /// Engine open, nothing ingested yet
    Ready,
    /// Workload in progress
    Ingesting,
    /// Workload finished, session held open
    Idle,
    /// Startup or ingestion failed
    Failed(String),
    /// Server closed
    Closed,
}

impl ServerState {
    /// Short lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            ServerState::Starting => "starting",
            ServerState::Ready => "ready",
            ServerState::Ingesting => "ingesting",
            ServerState::Idle => "idle",
            ServerState::Failed(_) => "failed",
            ServerState::Closed => "closed",
        }
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Shared view of the server for the status endpoint
///
/// Cloning is cheap; every clone observes the same state.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    state: Arc<RwLock<ServerState>>,
    session: SessionId,
    importer_addr: String,
    progress: Arc<IngestProgress>,
}

impl StatusBoard {
    pub fn new(session: SessionId, importer_addr: impl Into<String>) -> Self {
        StatusBoard {
            state: Arc::new(RwLock::new(ServerState::Starting)),
            session,
            importer_addr: importer_addr.into(),
            progress: Arc::new(IngestProgress::new()),
        }
    }

    pub fn state(&self) -> ServerState {
        self.state.read().clone()
    }

    pub fn set_state(&self, state: ServerState) {
        *self.state.write() = state;
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn engine(&self) -> EngineId {
        self.session.engine_id()
    }

    /// Counters the import client reports into
    pub fn progress(&self) -> Arc<IngestProgress> {
        self.progress.clone()
    }

    /// Plain-text `key=value` lines served on `/status`
    pub fn render(&self) -> String {
        let state = self.state();
        let mut out = format!(
            "state={}\nsession={}\nengine={}\nimporter={}\nbatches={}\nmutations={}\nlast_commit_ts={}\nfailed_batches={}\n",
            state,
            self.session,
            self.engine(),
            self.importer_addr,
            self.progress.batches(),
            self.progress.mutations(),
            self.progress.last_commit_ts(),
            self.progress.failed_batches(),
        );
        if let ServerState::Failed(reason) = &state {
            out.push_str(&format!("error={}\n", reason));
        }
        out
    }
}

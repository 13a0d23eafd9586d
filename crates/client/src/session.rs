//! Engine session lifecycle
//!
//! An [`EngineSession`] tracks the state of the one remote staging engine
//! named by a session's [`EngineId`].
//!
//! ## State Machine
//!
//! ```text
//!            open_engine (ok)
//!   Closed ───────────────────▶ Open   (terminal for this component)
//!     │ ▲
//!     │ │ cleanup_engine (ok)
//!     │ │
//!     ▼ │
//!   ConflictDetected ◀── open_engine (EngineExists)
//! ```
//!
//! Recovery from a conflict is bounded: [`EngineSession::open_with_recovery`]
//! cleans up and reopens at most [`MAX_CONFLICT_RECOVERIES`] times, after
//! which `EngineExists` is returned to the caller as fatal.

use std::sync::Arc;

use lightning_core::{EngineId, Error, Result, SessionId};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::rpc::{call_with_cancel, ImportService};

/// Number of cleanup-and-reopen attempts after an `EngineExists` conflict
pub const MAX_CONFLICT_RECOVERIES: u32 = 1;

/// Local view of the remote engine's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No engine held by this session
    Closed,
    /// Engine created by this session and accepting writes
    Open,
    /// Open was refused because the engine already exists; cleanup required
    ConflictDetected,
}

/// Lifecycle owner of one remote staging engine
pub struct EngineSession {
    id: SessionId,
    engine_id: EngineId,
    state: SessionState,
    service: Arc<dyn ImportService>,
}

impl EngineSession {
    /// Create a closed session for `id` over `service`
    pub fn new(service: Arc<dyn ImportService>, id: SessionId) -> Self {
        Self {
            id,
            engine_id: id.engine_id(),
            state: SessionState::Closed,
            service,
        }
    }

    /// Session identifier
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// Remote engine identifier
    pub fn engine_id(&self) -> EngineId {
        self.engine_id
    }

    /// Current state
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns true if the engine is open for writes
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    pub(crate) fn service(&self) -> &Arc<dyn ImportService> {
        &self.service
    }

    /// Create the remote engine
    ///
    /// # Errors
    /// - `Error::EngineExists`: the engine already exists; state moves to
    ///   `ConflictDetected`
    /// - `Error::InvalidState`: the session is not `Closed`
    /// - transport errors leave the state `Closed`
    pub async fn open_engine(&mut self, cancel: &CancellationToken) -> Result<()> {
        match self.state {
            SessionState::Closed => {}
            SessionState::Open => {
                return Err(Error::InvalidState {
                    reason: format!("engine {} is already open", self.engine_id),
                })
            }
            SessionState::ConflictDetected => {
                return Err(Error::InvalidState {
                    reason: format!("engine {} needs cleanup before reopening", self.engine_id),
                })
            }
        }

        match call_with_cancel(cancel, self.service.open_engine(self.engine_id)).await {
            Ok(()) => {
                self.state = SessionState::Open;
                info!(session = %self.id, engine = %self.engine_id, "engine opened");
                Ok(())
            }
            Err(e) if e.is_engine_exists() => {
                self.state = SessionState::ConflictDetected;
                warn!(engine = %self.engine_id, "engine already exists");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Forcibly delete the remote engine
    ///
    /// Resolves a `ConflictDetected` state back to `Closed`; the caller must
    /// then call [`open_engine`](Self::open_engine) again.
    ///
    /// # Errors
    /// `Error::InvalidState` if this session holds the engine open.
    pub async fn cleanup_engine(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.state == SessionState::Open {
            return Err(Error::InvalidState {
                reason: format!("refusing to clean up open engine {}", self.engine_id),
            });
        }

        call_with_cancel(cancel, self.service.cleanup_engine(self.engine_id)).await?;
        self.state = SessionState::Closed;
        info!(engine = %self.engine_id, "engine cleaned up");
        Ok(())
    }

    /// Open the engine, recovering from a leftover engine at most
    /// [`MAX_CONFLICT_RECOVERIES`] times
    pub async fn open_with_recovery(&mut self, cancel: &CancellationToken) -> Result<()> {
        let mut recoveries = 0;
        loop {
            match self.open_engine(cancel).await {
                Err(e) if e.is_engine_exists() && recoveries < MAX_CONFLICT_RECOVERIES => {
                    recoveries += 1;
                    warn!(engine = %self.engine_id, "engine exists, cleanup now");
                    self.cleanup_engine(cancel).await?;
                }
                other => return other,
            }
        }
    }

    /// Forget local state without contacting the engine
    pub fn reset(&mut self) {
        self.state = SessionState::Closed;
    }
}

impl std::fmt::Debug for EngineSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineSession")
            .field("id", &self.id)
            .field("engine_id", &self.engine_id)
            .field("state", &self.state)
            .finish()
    }
}

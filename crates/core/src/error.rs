//! Error types for Lightning
//!
//! All failures of the ingestion pipeline are represented by the [`Error`] enum.
//! Variants are structured (typed `reason` fields) and cheap to clone so the
//! orchestrator can both log an error and hand it back to the shell.
//!
//! # Categories
//!
//! | Category | Variants | Handling |
//! |----------|----------|----------|
//! | Configuration | `Config` | Fatal before any RPC |
//! | Transport | `Connection`, `Serialization` | Fatal for the run, never retried by the core |
//! | Conflict | `EngineExists` | Recovered exactly once via cleanup |
//! | Input | `InvalidMutation` | Rejected without touching buffer state |
//! | Remote | `RemoteWrite`, `Remote` | Fatal, no automatic retry (at-most-once) |
//! | Lifecycle | `NotOpen`, `InvalidState` | Caller bug, fatal |

use thiserror::Error;

/// Result type alias for Lightning operations
pub type Result<T> = std::result::Result<T, Error>;

/// Lightning error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // ==================== Configuration ====================
    /// Bad or missing configuration
    #[error("config error: {reason}")]
    Config { reason: String },

    // ==================== Transport ====================
    /// Remote engine unreachable, timed out, or the call was cancelled
    #[error("connection error: {reason}")]
    Connection { reason: String },

    /// Malformed frame on the wire
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    // ==================== Conflict ====================
    /// The remote engine already exists for this engine id
    #[error("engine already exists: {engine}")]
    EngineExists { engine: String },

    // ==================== Input ====================
    /// Malformed mutation (for example an empty key)
    #[error("invalid mutation: {reason}")]
    InvalidMutation { reason: String },

    // ==================== Remote ====================
    /// The remote engine rejected a write batch
    #[error("remote write error: {reason}")]
    RemoteWrite { reason: String },

    /// The remote engine rejected a control call (open, cleanup, close)
    #[error("remote {op} failed: {reason}")]
    Remote { op: String, reason: String },

    // ==================== Lifecycle ====================
    /// Writer used before the session (or the writer itself) was opened
    #[error("engine not open: {engine}")]
    NotOpen { engine: String },

    /// Operation not allowed in the current session state
    #[error("invalid state: {reason}")]
    InvalidState { reason: String },
}

impl Error {
    /// Build a connection error from anything displayable
    pub fn connection(reason: impl ToString) -> Self {
        Error::Connection {
            reason: reason.to_string(),
        }
    }

    /// Connection error reported when a cancellation token fires mid-call
    pub fn cancelled() -> Self {
        Error::Connection {
            reason: "cancelled".to_string(),
        }
    }

    /// Returns true for the one error the orchestrator recovers from
    pub fn is_engine_exists(&self) -> bool {
        matches!(self, Error::EngineExists { .. })
    }

    /// Returns true if this error came from a fired cancellation token
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Connection { reason } if reason == "cancelled")
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Connection {
            reason: e.to_string(),
        }
    }
}

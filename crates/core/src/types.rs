//! Core types for Lightning
//!
//! This module defines the data model shared by the client and the shell:
//! - SessionId: Operator-facing identifier of one ingestion session
//! - EngineId: Remote staging engine identifier derived from a SessionId
//! - Mutation: A single Put or Delete over a key-value pair
//! - WriteBatch: Atomic unit of mutations submitted with a commit timestamp

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Unique identifier for an ingestion session
///
/// A SessionId is a wrapper around a UUID. It is usually supplied by the
/// operator in textual form so that a crashed run can be resumed (or cleaned
/// up) against the same remote engine, but a random one can be generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Create a new random SessionId using UUID v4
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a SessionId from raw bytes
    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Parse a SessionId from its textual UUID form
    ///
    /// # Errors
    /// Returns `Error::Config` if the string is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|e| Error::Config {
                reason: format!("invalid session id '{}': {}", s, e),
            })
    }

    /// Get the raw bytes of this SessionId
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// The remote engine this session writes into
    pub fn engine_id(&self) -> EngineId {
        EngineId(*self.0.as_bytes())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one remote staging engine
///
/// Derived 1:1 from a [`SessionId`]: the remote side names the engine by the
/// session's raw 16 bytes, so at most one live engine exists per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineId([u8; 16]);

impl EngineId {
    /// Raw bytes as sent on the wire
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<SessionId> for EngineId {
    fn from(id: SessionId) -> Self {
        id.engine_id()
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Uuid::from_bytes(self.0))
    }
}

/// Kind of a single mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutationOp {
    /// Insert or overwrite a key
    Put,
    /// Remove a key
    Delete,
}

/// A single key-value operation
///
/// Keys within a [`WriteBatch`] need not be sorted; ordering is the remote
/// engine's job. Keys must be non-empty. Fields are private so a mutation
/// cannot change after construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Mutation {
    op: MutationOp,
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Mutation {
    /// Create a Put mutation
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            op: MutationOp::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a Delete mutation (carries an empty value)
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self {
            op: MutationOp::Delete,
            key: key.into(),
            value: Vec::new(),
        }
    }

    /// Operation kind
    pub fn op(&self) -> MutationOp {
        self.op
    }

    /// Key bytes
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Value bytes (empty for deletes)
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Check that the mutation is well formed
    ///
    /// # Errors
    /// Returns `Error::InvalidMutation` for an empty key.
    pub fn validate(&self) -> Result<()> {
        if self.key.is_empty() {
            return Err(Error::InvalidMutation {
                reason: "key must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Approximate payload size in bytes
    pub fn size(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// Atomic unit of mutations accepted or rejected as a whole by the remote engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    /// Commit timestamp; non-decreasing across batches of one session
    pub commit_ts: u64,
    /// Mutations in append order
    pub mutations: Vec<Mutation>,
}

impl WriteBatch {
    /// Create a batch
    pub fn new(commit_ts: u64, mutations: Vec<Mutation>) -> Self {
        Self {
            commit_ts,
            mutations,
        }
    }

    /// Number of mutations in the batch
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Returns true if the batch carries no mutations
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }
}

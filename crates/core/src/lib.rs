//! Core types for Lightning
//!
//! This crate defines the foundational types shared by the ingestion client
//! and the process shell:
//! - SessionId / EngineId: Session handle and the remote engine it names
//! - Mutation / MutationOp: A single Put or Delete
//! - WriteBatch: Atomic unit of mutations with a commit timestamp
//! - Error: Error taxonomy of the ingestion pipeline

#![warn(clippy::all)]

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{EngineId, Mutation, MutationOp, SessionId, WriteBatch};

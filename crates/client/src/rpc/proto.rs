//! Wire protocol to the import engine.
//!
//! Each message is one length-delimited frame (4-byte big-endian length,
//! `tokio-util` [`LengthDelimitedCodec`]) whose payload is a MessagePack
//! encoded [`Envelope`]. The client tags every request with a fresh id and
//! the engine echoes it back, so a response left over from an abandoned call
//! can be told apart from the one being awaited.

use bytes::Bytes;
use lightning_core::{EngineId, Error, Result, WriteBatch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio_util::codec::LengthDelimitedCodec;

/// Largest accepted frame (64 MiB).
pub const MAX_FRAME_LENGTH: usize = 64 * 1024 * 1024;

/// A request or response tagged with its correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub id: u64,
    pub body: T,
}

/// Calls understood by the import engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    OpenEngine { engine: EngineId },
    CleanupEngine { engine: EngineId },
    WriteEngine { engine: EngineId, batch: WriteBatch },
    CloseWriter { engine: EngineId },
}

impl Request {
    /// Short operation name used in logs and errors.
    pub fn op(&self) -> &'static str {
        match self {
            Request::OpenEngine { .. } => "open_engine",
            Request::CleanupEngine { .. } => "cleanup_engine",
            Request::WriteEngine { .. } => "write_engine",
            Request::CloseWriter { .. } => "close_writer",
        }
    }

    /// Engine the request targets.
    pub fn engine(&self) -> EngineId {
        match self {
            Request::OpenEngine { engine }
            | Request::CleanupEngine { engine }
            | Request::WriteEngine { engine, .. }
            | Request::CloseWriter { engine } => *engine,
        }
    }
}

/// Outcome reported by the import engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Response {
    Ok,
    EngineExists,
    Error { message: String },
}

impl Response {
    /// Build the response the engine sends for a call result.
    pub fn from_result(result: &Result<()>) -> Self {
        match result {
            Ok(()) => Response::Ok,
            Err(Error::EngineExists { .. }) => Response::EngineExists,
            Err(Error::RemoteWrite { reason }) | Err(Error::Remote { reason, .. }) => {
                Response::Error {
                    message: reason.clone(),
                }
            }
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        }
    }

    /// Map the response to the caller-side result for `request`.
    pub fn into_result(self, request: &Request) -> Result<()> {
        match (self, request) {
            (Response::Ok, _) => Ok(()),
            (Response::EngineExists, Request::OpenEngine { engine }) => Err(Error::EngineExists {
                engine: engine.to_string(),
            }),
            (Response::Error { message }, Request::WriteEngine { .. }) => {
                Err(Error::RemoteWrite { reason: message })
            }
            (Response::EngineExists, other) => Err(Error::Serialization {
                reason: format!("unexpected EngineExists response to {}", other.op()),
            }),
            (Response::Error { message }, other) => Err(Error::Remote {
                op: other.op().to_string(),
                reason: message,
            }),
        }
    }
}

/// Frame codec shared by client and stub servers.
pub fn codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_codec()
}

/// Encode an envelope into a frame payload.
pub fn encode<T: Serialize>(envelope: &Envelope<T>) -> Result<Bytes> {
    rmp_serde::to_vec_named(envelope)
        .map(Bytes::from)
        .map_err(|e| Error::Serialization {
            reason: e.to_string(),
        })
}

/// Decode a frame payload into an envelope.
pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<Envelope<T>> {
    rmp_serde::from_slice(payload).map_err(|e| Error::Serialization {
        reason: e.to_string(),
    })
}

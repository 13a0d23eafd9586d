//! TCP client for the import engine protocol.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use lightning_core::{EngineId, Error, Result, WriteBatch};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::debug;

use super::proto::{self, Envelope, Request, Response};
use super::ImportService;

/// One persistent connection to an import engine.
///
/// Requests are serialized over the connection: a call holds the stream until
/// its response arrives (or the call times out or is dropped). Responses whose
/// id does not match the pending request belong to abandoned calls and are
/// discarded.
pub struct TcpImportClient {
    addr: String,
    framed: Mutex<Framed<TcpStream, LengthDelimitedCodec>>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl TcpImportClient {
    /// Connect to `addr`, failing with [`Error::Connection`] after `connect_timeout`.
    pub async fn connect(
        addr: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let stream = time::timeout(connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::connection(format!("connect to {} timed out", addr)))?
            .map_err(|e| Error::connection(format!("connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;
        debug!(addr, "connected to import engine");

        Ok(Self {
            addr: addr.to_string(),
            framed: Mutex::new(Framed::new(stream, proto::codec())),
            next_id: AtomicU64::new(1),
            request_timeout,
        })
    }

    /// Address this client is connected to.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn call(&self, request: Request) -> Result<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let frame = proto::encode(&Envelope {
            id,
            body: request.clone(),
        })?;

        let mut framed = self.framed.lock().await;
        let exchange = async {
            framed
                .send(frame)
                .await
                .map_err(|e| Error::connection(format!("send {}: {}", request.op(), e)))?;
            loop {
                let payload = framed
                    .next()
                    .await
                    .ok_or_else(|| Error::connection("connection closed by import engine"))?
                    .map_err(|e| Error::connection(format!("recv {}: {}", request.op(), e)))?;
                let envelope: Envelope<Response> = proto::decode(&payload)?;
                if envelope.id == id {
                    return Ok::<Response, Error>(envelope.body);
                }
                debug!(expected = id, got = envelope.id, "discarding stale response");
            }
        };

        let response = time::timeout(self.request_timeout, exchange)
            .await
            .map_err(|_| {
                Error::connection(format!(
                    "{} to {} timed out after {:?}",
                    request.op(),
                    self.addr,
                    self.request_timeout
                ))
            })??;
        response.into_result(&request)
    }
}

#[async_trait]
impl ImportService for TcpImportClient {
    async fn open_engine(&self, engine: EngineId) -> Result<()> {
        self.call(Request::OpenEngine { engine }).await
    }

    async fn cleanup_engine(&self, engine: EngineId) -> Result<()> {
        self.call(Request::CleanupEngine { engine }).await
    }

    async fn write_engine(&self, engine: EngineId, batch: &WriteBatch) -> Result<()> {
        self.call(Request::WriteEngine {
            engine,
            batch: batch.clone(),
        })
        .await
    }

    async fn close_writer(&self, engine: EngineId) -> Result<()> {
        self.call(Request::CloseWriter { engine }).await
    }
}

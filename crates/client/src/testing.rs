//! Test support: an in-memory import engine.
//!
//! [`MemoryImporter`] implements [`ImportService`] with a call log and fault
//! injection; [`serve`] / [`spawn_server`] expose it over the wire protocol so
//! the TCP client and connection manager can be exercised end to end.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use lightning_core::{EngineId, Error, Mutation, Result, WriteBatch};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::debug;

use crate::rpc::proto::{self, Envelope, Request, Response};
use crate::rpc::ImportService;

/// One call observed by a [`MemoryImporter`]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    OpenEngine(EngineId),
    CleanupEngine(EngineId),
    WriteEngine(EngineId, WriteBatch),
    CloseWriter(EngineId),
}

#[derive(Default)]
struct ImporterState {
    engines: HashMap<EngineId, Vec<WriteBatch>>,
    calls: Vec<Call>,
    forced_conflicts: usize,
    fail_write_at: Option<usize>,
    writes: usize,
    unreachable: bool,
    write_delay: Option<Duration>,
    close_delay: Option<Duration>,
}

/// In-memory import engine
#[derive(Default)]
pub struct MemoryImporter {
    state: Mutex<ImporterState>,
}

impl MemoryImporter {
    /// Create an importer with no engines
    pub fn new() -> Self {
        Self::default()
    }

    /// Pretend an engine was left behind by an earlier run
    pub fn with_existing_engine(self, engine: EngineId) -> Self {
        self.state.lock().engines.insert(engine, Vec::new());
        self
    }

    /// Report `EngineExists` for the next `n` opens, even after a cleanup
    pub fn with_forced_conflicts(self, n: usize) -> Self {
        self.state.lock().forced_conflicts = n;
        self
    }

    /// Reject the write call with zero-based index `index`
    pub fn with_failing_write(self, index: usize) -> Self {
        self.state.lock().fail_write_at = Some(index);
        self
    }

    /// Delay every write call by `delay`
    pub fn with_write_delay(self, delay: Duration) -> Self {
        self.state.lock().write_delay = Some(delay);
        self
    }

    /// Delay every close-writer call by `delay`
    pub fn with_close_delay(self, delay: Duration) -> Self {
        self.state.lock().close_delay = Some(delay);
        self
    }

    /// Make every call fail with a connection error
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unreachable = unreachable;
    }

    /// All calls in arrival order
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Number of calls matching `pred`
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    /// Number of `CloseWriter` calls
    pub fn close_writer_calls(&self) -> usize {
        self.count(|c| matches!(c, Call::CloseWriter(_)))
    }

    /// Returns true if the engine is live
    pub fn engine_exists(&self, engine: EngineId) -> bool {
        self.state.lock().engines.contains_key(&engine)
    }

    /// Batches accepted by `engine`, in commit order
    pub fn batches(&self, engine: EngineId) -> Vec<WriteBatch> {
        self.state
            .lock()
            .engines
            .get(&engine)
            .cloned()
            .unwrap_or_default()
    }

    /// Every mutation accepted by `engine`, flattened
    pub fn mutations(&self, engine: EngineId) -> Vec<Mutation> {
        self.batches(engine)
            .into_iter()
            .flat_map(|b| b.mutations)
            .collect()
    }

    fn record(&self, call: Call) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.unreachable {
            return Err(Error::connection("import engine unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl ImportService for MemoryImporter {
    async fn open_engine(&self, engine: EngineId) -> Result<()> {
        self.record(Call::OpenEngine(engine))?;
        let mut state = self.state.lock();
        if state.forced_conflicts > 0 {
            state.forced_conflicts -= 1;
            state.engines.entry(engine).or_default();
            return Err(Error::EngineExists {
                engine: engine.to_string(),
            });
        }
        if state.engines.contains_key(&engine) {
            return Err(Error::EngineExists {
                engine: engine.to_string(),
            });
        }
        state.engines.insert(engine, Vec::new());
        Ok(())
    }

    async fn cleanup_engine(&self, engine: EngineId) -> Result<()> {
        self.record(Call::CleanupEngine(engine))?;
        self.state.lock().engines.remove(&engine);
        Ok(())
    }

    async fn write_engine(&self, engine: EngineId, batch: &WriteBatch) -> Result<()> {
        self.record(Call::WriteEngine(engine, batch.clone()))?;
        let delay = self.state.lock().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        let index = state.writes;
        state.writes += 1;
        if state.fail_write_at == Some(index) {
            return Err(Error::RemoteWrite {
                reason: format!("batch {} rejected", index),
            });
        }
        match state.engines.get_mut(&engine) {
            Some(batches) => {
                batches.push(batch.clone());
                Ok(())
            }
            None => Err(Error::RemoteWrite {
                reason: format!("engine {} not found", engine),
            }),
        }
    }

    async fn close_writer(&self, engine: EngineId) -> Result<()> {
        self.record(Call::CloseWriter(engine))?;
        let delay = self.state.lock().close_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(())
    }
}

/// Serve `importer` over the wire protocol until the listener fails
pub async fn serve(listener: TcpListener, importer: Arc<MemoryImporter>) -> Result<()> {
    loop {
        let (socket, _) = listener.accept().await?;
        let importer = importer.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_conn(socket, importer).await {
                debug!(error = %err, "stub import connection closed");
            }
        });
    }
}

/// Bind an ephemeral local port and serve `importer` on it
pub async fn spawn_server(
    importer: Arc<MemoryImporter>,
) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(serve(listener, importer));
    Ok((addr, handle))
}

async fn handle_conn(socket: TcpStream, importer: Arc<MemoryImporter>) -> Result<()> {
    let mut framed = Framed::new(socket, proto::codec());
    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let request: Envelope<Request> = proto::decode(&frame)?;
        let result = match &request.body {
            Request::OpenEngine { engine } => importer.open_engine(*engine).await,
            Request::CleanupEngine { engine } => importer.cleanup_engine(*engine).await,
            Request::WriteEngine { engine, batch } => importer.write_engine(*engine, batch).await,
            Request::CloseWriter { engine } => importer.close_writer(*engine).await,
        };
        let response = proto::encode(&Envelope {
            id: request.id,
            body: Response::from_result(&result),
        })?;
        framed.send(response).await?;
    }
    Ok(())
}

//! Reusable connections per import engine address.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use lightning_core::Result;
use parking_lot::Mutex;
use tracing::info;

use super::tcp::TcpImportClient;
use super::ImportService;

/// Resolves an address to a reusable [`TcpImportClient`].
///
/// At most one connection is cached per address. The manager neither retries
/// nor pools; a failed connect is reported to the caller, which owns any
/// retry/backoff policy.
pub struct ConnectionManager {
    connect_timeout: Duration,
    request_timeout: Duration,
    conns: Mutex<HashMap<String, Arc<TcpImportClient>>>,
}

impl ConnectionManager {
    /// Create a manager with the given connect and per-request timeouts.
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            request_timeout,
            conns: Mutex::new(HashMap::new()),
        }
    }

    /// Get the connection for `addr`, dialing it on first use.
    pub async fn get_connection(&self, addr: &str) -> Result<Arc<dyn ImportService>> {
        let cached = self.conns.lock().get(addr).cloned();
        if let Some(conn) = cached {
            let conn: Arc<dyn ImportService> = conn;
            return Ok(conn);
        }

        let dialed = Arc::new(
            TcpImportClient::connect(addr, self.connect_timeout, self.request_timeout).await?,
        );
        // A concurrent caller may have dialed the same address meanwhile; keep theirs.
        let conn = self
            .conns
            .lock()
            .entry(addr.to_string())
            .or_insert(dialed)
            .clone();
        info!(addr, "import engine connection established");
        let conn: Arc<dyn ImportService> = conn;
        Ok(conn)
    }

    /// Drop the cached connection for `addr`. Returns true if one was cached.
    pub fn release(&self, addr: &str) -> bool {
        let released = self.conns.lock().remove(addr).is_some();
        if released {
            info!(addr, "import engine connection released");
        }
        released
    }

    /// Number of cached connections.
    pub fn len(&self) -> usize {
        self.conns.lock().len()
    }

    /// Returns true if no connection is cached.
    pub fn is_empty(&self) -> bool {
        self.conns.lock().is_empty()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(5), Duration::from_secs(30))
    }
}

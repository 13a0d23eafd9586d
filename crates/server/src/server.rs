//! Server lifecycle around one import client
//!
//! The shell calls [`Server::start`], then [`Server::ingest`] with the
//! configured workload, and finally [`Server::close`]. Every transition is
//! mirrored on the [`StatusBoard`].

use std::sync::Arc;

use lightning_client::{ClientOptions, ConnectionManager, ImportClient, IngestSummary, SessionState};
use lightning_core::{Error, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ShellConfig;
use crate::status::{ServerState, StatusBoard};
use crate::workload::Workload;

/// Owns the connection manager, the import client and the status board
pub struct Server {
    config: ShellConfig,
    options: ClientOptions,
    manager: Arc<ConnectionManager>,
    client: Option<ImportClient>,
    status: StatusBoard,
    closed: bool,
}

impl Server {
    pub fn new(config: ShellConfig) -> Self {
        let options = config.client_options();
        Self::with_options(config, options)
    }

    /// Create a server with explicit client options
    pub fn with_options(config: ShellConfig, options: ClientOptions) -> Self {
        let manager = Arc::new(ConnectionManager::new(
            options.connect_timeout,
            options.request_timeout,
        ));
        let status = StatusBoard::new(config.session_id, config.importer_addr.clone());
        Server {
            config,
            options,
            manager,
            client: None,
            status,
            closed: false,
        }
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Status board shared with the HTTP endpoint
    pub fn status(&self) -> StatusBoard {
        self.status.clone()
    }

    /// Connect to the import engine and open the session's engine
    ///
    /// Calling again after success is a no-op. After a failure the client is
    /// kept and a later call retries the open.
    pub async fn start(&mut self, cancel: &CancellationToken) -> Result<()> {
        if self.closed {
            return Err(Error::InvalidState {
                reason: "server is closed".to_string(),
            });
        }
        if self.client.as_ref().map_or(false, |c| c.state() == SessionState::Open) {
            return Ok(());
        }

        self.status.set_state(ServerState::Starting);
        info!(
            importer = %self.config.importer_addr,
            session = %self.config.session_id,
            "starting server"
        );
        let result = self.start_client(cancel).await;
        match &result {
            Ok(()) => {
                self.status.set_state(ServerState::Ready);
                info!(engine = %self.status.engine(), "engine open");
            }
            Err(e) => {
                self.status.set_state(ServerState::Failed(e.to_string()));
                error!(error = %e, "fail to start server");
            }
        }
        result
    }

    async fn start_client(&mut self, cancel: &CancellationToken) -> Result<()> {
        let client = match self.client.take() {
            Some(client) => client,
            None => ImportClient::connect(
                self.manager.clone(),
                &self.config.importer_addr,
                self.config.session_id,
                self.options.clone(),
            )
            .await?
            .with_progress(self.status.progress()),
        };
        self.client.insert(client).start(cancel).await
    }

    /// Stream `workload` into the open engine
    pub async fn ingest(&self, workload: Workload, cancel: &CancellationToken) -> Result<IngestSummary> {
        let client = self.client.as_ref().ok_or_else(|| Error::NotOpen {
            engine: self.status.engine().to_string(),
        })?;

        let total = workload.total();
        self.status.set_state(ServerState::Ingesting);
        info!(mutations = total, batch_size = self.options.batch_size, "ingesting workload");
        let result = client.ingest(workload, cancel).await;
        match &result {
            Ok(_) => self.status.set_state(ServerState::Idle),
            Err(e) => {
                self.status.set_state(ServerState::Failed(e.to_string()));
                error!(error = %e, "fail to ingest workload");
            }
        }
        result
    }

    /// Release the client and its connection; only the first call does anything
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        let result = match self.client.as_mut() {
            Some(client) => client.close(),
            None => Ok(()),
        };
        self.status.set_state(ServerState::Closed);
        info!(session = %self.config.session_id, "server closed");
        result
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

//! Process lifecycle
//!
//! ```text
//! start server -> bind status endpoint -> ingest workload -> wait for signal
//!                                              |                    |
//!                                              +---- on signal -----+
//!                                                        |
//!                           cancel ingestion, stop status endpoint, close server
//! ```
//!
//! A failed start or a failed ingestion ends the run with an error. After a
//! successful ingestion the session is held open until the shutdown signal.

use std::future::Future;
use std::io;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use lightning_client::ClientOptions;
use lightning_core::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::ShellConfig;
use crate::http::HttpServer;
use crate::server::Server;

/// Time in-flight work gets after a shutdown signal, on top of the writer
/// close timeout
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Run until SIGINT or SIGTERM
pub async fn run(config: ShellConfig) -> Result<()> {
    let shutdown = shutdown_signal().context("fail to install signal handlers")?;
    run_with_shutdown(config, shutdown).await
}

/// Run until `shutdown` resolves
pub async fn run_with_shutdown<F>(config: ShellConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    run_server(Server::new(config), shutdown).await
}

/// Drive `server` through start, ingestion and shutdown
///
/// `shutdown` is watched from the first connect on. A signal while starting
/// cancels the open and ends the run with the start error.
pub async fn run_server<F>(mut server: Server, shutdown: F) -> Result<()>
where
    F: Future<Output = io::Result<()>>,
{
    let config = server.config().clone();
    info!(config = ?config, "starting lightning");
    let cancel = CancellationToken::new();
    let grace = ingest_grace(server.options());
    tokio::pin!(shutdown);
    let mut signalled = false;

    let started = {
        let start = server.start(&cancel);
        tokio::pin!(start);
        tokio::select! {
            result = &mut start => result,
            signal = &mut shutdown => {
                signalled = true;
                log_signal(signal);
                cancel.cancel();
                match tokio::time::timeout(grace, &mut start).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::connection(
                        "start did not stop within the shutdown grace period",
                    )),
                }
            }
        }
    };
    if let Err(e) = started {
        close_server(&mut server);
        return Err(e).context("fail to create server service");
    }
    if signalled {
        // the open raced the signal and won; nothing left to ingest
        close_server(&mut server);
        return Err(anyhow!(Error::cancelled()).context("shutdown during start"));
    }

    let http = match HttpServer::bind(config.addr, server.status()).await {
        Ok(http) => http,
        Err(e) => {
            close_server(&mut server);
            return Err(e);
        }
    };
    let (http_tx, http_rx) = watch::channel(false);
    let http_task = tokio::spawn(http.serve(http_rx, SHUTDOWN_GRACE));

    let ingested = {
        let ingest = server.ingest(config.workload(), &cancel);
        tokio::pin!(ingest);
        tokio::select! {
            result = &mut ingest => result,
            signal = &mut shutdown => {
                signalled = true;
                log_signal(signal);
                cancel.cancel();
                match tokio::time::timeout(grace, &mut ingest).await {
                    Ok(result) => result,
                    Err(_) => Err(Error::connection(
                        "ingestion did not stop within the shutdown grace period",
                    )),
                }
            }
        }
    };

    let result = match ingested {
        Ok(summary) => {
            info!(
                batches = summary.batches,
                mutations = summary.mutations,
                last_commit_ts = ?summary.last_commit_ts,
                "workload ingested"
            );
            if !signalled {
                info!("holding session open until shutdown signal");
                log_signal((&mut shutdown).await);
            }
            Ok(())
        }
        Err(e) => Err(anyhow!(e).context("ingestion failed")),
    };

    info!("shutting down");
    let _ = http_tx.send(true);
    match http_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "status server stopped with error"),
        Err(e) => warn!(error = %e, "status server task failed"),
    }
    close_server(&mut server);
    result
}

/// How long a cancelled start or ingestion may take to wind down
///
/// Cancellation aborts the in-flight request at once, but the writer close
/// that follows runs under its own timeout and must fit inside the grace.
pub fn ingest_grace(options: &ClientOptions) -> Duration {
    options.close_timeout.saturating_add(SHUTDOWN_GRACE)
}

/// Install SIGINT and SIGTERM handlers, resolving on the first signal
///
/// Handlers are registered before this returns, so a signal that arrives
/// before the future is first polled is not lost.
pub fn shutdown_signal() -> io::Result<impl Future<Output = io::Result<()>>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        Ok(async move {
            tokio::select! {
                _ = interrupt.recv() => {}
                _ = terminate.recv() => {}
            }
            Ok::<(), io::Error>(())
        })
    }
    #[cfg(windows)]
    {
        let mut ctrl_c = tokio::signal::windows::ctrl_c()?;
        Ok(async move {
            ctrl_c.recv().await;
            Ok::<(), io::Error>(())
        })
    }
}

fn log_signal(signal: io::Result<()>) {
    match signal {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => warn!(error = %e, "fail to listen for shutdown signal, shutting down"),
    }
}

fn close_server(server: &mut Server) {
    if let Err(e) = server.close() {
        error!(error = %e, "fail to close server");
    }
}

//! Minimal HTTP status endpoint
//!
//! Routes:
//! - `GET /live` - `live`
//! - `GET /status`, `GET /` - [`StatusBoard::render`]
//!
//! Anything else is 404 (405 for non-GET methods). Each connection serves one
//! request and is closed.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::status::StatusBoard;

/// Read and write deadline per connection
pub const IO_TIMEOUT: Duration = Duration::from_secs(15);

const MAX_REQUEST_HEAD: usize = 4096;

/// Bound status listener
pub struct HttpServer {
    listener: TcpListener,
    status: StatusBoard,
}

impl HttpServer {
    /// Bind the listener; port 0 picks a free port
    pub async fn bind(addr: SocketAddr, status: StatusBoard) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind status server {addr}"))?;
        Ok(HttpServer { listener, status })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener
            .local_addr()
            .context("status server local address")
    }

    /// Serve until `shutdown` flips to true or its sender is dropped
    ///
    /// After shutdown no new connections are accepted. In-flight requests get
    /// `grace` to finish and are aborted after that.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>, grace: Duration) -> Result<()> {
        let HttpServer { listener, status } = self;
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "status server listening");
        }

        let mut conns = JoinSet::new();
        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
                accept = listener.accept() => {
                    let (stream, peer) = accept.context("accept status connection")?;
                    let status = status.clone();
                    conns.spawn(async move {
                        if let Err(e) = handle_connection(stream, status).await {
                            debug!(%peer, error = %e, "status connection failed");
                        }
                    });
                }
                Some(_) = conns.join_next(), if !conns.is_empty() => {}
            }
        }
        drop(listener);

        let drain = async { while conns.join_next().await.is_some() {} };
        if tokio::time::timeout(grace, drain).await.is_err() {
            warn!(pending = conns.len(), "status requests still running after grace period, aborting");
            conns.abort_all();
        }
        info!("status server closed");
        Ok(())
    }
}

async fn handle_connection(mut stream: TcpStream, status: StatusBoard) -> Result<()> {
    let mut buf = vec![0u8; MAX_REQUEST_HEAD];
    let n = tokio::time::timeout(IO_TIMEOUT, stream.read(&mut buf))
        .await
        .context("read status request timed out")?
        .context("read status request")?;
    let req = String::from_utf8_lossy(&buf[..n]);
    let mut request_line = req.lines().next().unwrap_or("").split_whitespace();
    let method = request_line.next().unwrap_or("");
    let target = request_line.next().unwrap_or("/");
    let path = target.split('?').next().unwrap_or("/");

    let (code, body) = route(method, path, &status);
    let response = format!(
        "HTTP/1.1 {code} {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        reason_phrase(code),
        body.len(),
        body
    );

    tokio::time::timeout(IO_TIMEOUT, async {
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await
    })
    .await
    .context("write status response timed out")?
    .context("write status response")?;
    Ok(())
}

fn route(method: &str, path: &str, status: &StatusBoard) -> (u16, String) {
    if method != "GET" {
        return (405, "method-not-allowed\n".to_string());
    }
    match path {
        "/live" => (200, "live\n".to_string()),
        "/status" | "/" => (200, status.render()),
        _ => (404, "not-found\n".to_string()),
    }
}

fn reason_phrase(code: u16) -> &'static str {
    match code {
        200 => "OK",
        404 => "Not Found",
        405 => "Method Not Allowed",
        _ => "Unknown",
    }
}

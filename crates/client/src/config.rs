//! Client configuration
//!
//! Tunables for batching and RPC deadlines of an [`ImportClient`](crate::ImportClient).

use std::time::Duration;

use lightning_core::{Error, Result};

/// Default number of mutations per write batch
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// Import client options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Mutations per write batch
    pub batch_size: usize,
    /// Deadline for dialing the import engine
    pub connect_timeout: Duration,
    /// Deadline for one request/response exchange
    pub request_timeout: Duration,
    /// Deadline for releasing the writer handle
    ///
    /// Independent of the run's cancellation token so the release still
    /// happens after a cancelled run.
    pub close_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            batch_size: DEFAULT_BATCH_SIZE,
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            close_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientOptions {
    /// Options for tests: small batches, short deadlines
    pub fn for_testing() -> Self {
        ClientOptions {
            batch_size: 2,
            connect_timeout: Duration::from_secs(1),
            request_timeout: Duration::from_secs(2),
            close_timeout: Duration::from_secs(1),
        }
    }

    /// Set batch size
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set per-request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set writer close timeout
    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Validate options
    ///
    /// # Errors
    /// Returns `Error::Config` for a zero batch size or a zero deadline.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(Error::Config {
                reason: "batch size must be at least 1".to_string(),
            });
        }
        for (name, value) in [
            ("connect timeout", self.connect_timeout),
            ("request timeout", self.request_timeout),
            ("close timeout", self.close_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Config {
                    reason: format!("{} must be non-zero", name),
                });
            }
        }
        Ok(())
    }
}

//! Ingestion progress counters
//!
//! [`IngestProgress`] is updated by the engine writer after every acknowledged
//! batch and read concurrently by status reporting. [`IngestSummary`] is the
//! per-run result handed back by the orchestrator.

use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative, lock-free progress of one import client
#[derive(Debug, Default)]
pub struct IngestProgress {
    batches: AtomicU64,
    mutations: AtomicU64,
    last_commit_ts: AtomicU64,
    failed_batches: AtomicU64,
}

impl IngestProgress {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an acknowledged batch
    pub fn record_batch(&self, mutations: usize, commit_ts: u64) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.mutations.fetch_add(mutations as u64, Ordering::Relaxed);
        self.last_commit_ts.fetch_max(commit_ts, Ordering::Relaxed);
    }

    /// Record a batch the engine did not acknowledge
    pub fn record_failure(&self) {
        self.failed_batches.fetch_add(1, Ordering::Relaxed);
    }

    /// Acknowledged batches so far
    pub fn batches(&self) -> u64 {
        self.batches.load(Ordering::Relaxed)
    }

    /// Acknowledged mutations so far
    pub fn mutations(&self) -> u64 {
        self.mutations.load(Ordering::Relaxed)
    }

    /// Highest acknowledged commit timestamp, 0 if none
    pub fn last_commit_ts(&self) -> u64 {
        self.last_commit_ts.load(Ordering::Relaxed)
    }

    /// Batches that failed
    pub fn failed_batches(&self) -> u64 {
        self.failed_batches.load(Ordering::Relaxed)
    }
}

/// Receipt for one acknowledged write batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReceipt {
    /// Commit timestamp the batch was written with
    pub commit_ts: u64,
    /// Mutations carried by the batch
    pub mutations: usize,
}

/// Result of one completed ingestion run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    /// Batches written
    pub batches: u64,
    /// Mutations written
    pub mutations: u64,
    /// Commit timestamp of the last batch, if any was written
    pub last_commit_ts: Option<u64>,
}

impl IngestSummary {
    /// Fold a batch receipt into the summary
    pub fn record(&mut self, receipt: BatchReceipt) {
        self.batches += 1;
        self.mutations += receipt.mutations as u64;
        self.last_commit_ts = Some(receipt.commit_ts);
    }
}

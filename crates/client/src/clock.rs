//! Commit timestamp allocation
//!
//! A writer stamps every batch with a commit timestamp. Plain wall-clock
//! seconds collide for two flushes within one second and go backwards when
//! the system clock is stepped, so [`CommitClock`] is a hybrid: it follows
//! wall time when wall time moves forward and otherwise counts up from the
//! last timestamp it handed out.
//!
//! ```text
//! next = max(last + 1, wall_seconds)
//! ```

use chrono::Utc;

/// Source of wall-clock seconds
pub trait TimeSource: Send + Sync {
    /// Current wall time in whole seconds since the Unix epoch
    fn now_secs(&self) -> u64;
}

/// System wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTime;

impl TimeSource for SystemTime {
    fn now_secs(&self) -> u64 {
        Utc::now().timestamp().max(0) as u64
    }
}

/// Strictly increasing commit timestamp generator owned by one writer
pub struct CommitClock {
    source: Box<dyn TimeSource>,
    last: u64,
}

impl CommitClock {
    /// Clock seeded from the system wall clock
    pub fn new() -> Self {
        Self::with_source(SystemTime)
    }

    /// Clock seeded from a custom time source
    pub fn with_source(source: impl TimeSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            last: 0,
        }
    }

    /// Continue after `last`, e.g. the final timestamp of an earlier writer
    pub fn resume_after(mut self, last: u64) -> Self {
        self.last = self.last.max(last);
        self
    }

    /// Allocate the next commit timestamp
    ///
    /// Always greater than every timestamp previously returned by this clock.
    pub fn next(&mut self) -> u64 {
        let ts = self.source.now_secs().max(self.last.saturating_add(1));
        self.last = ts;
        ts
    }

    /// Last timestamp handed out, 0 if none
    pub fn last(&self) -> u64 {
        self.last
    }
}

impl Default for CommitClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CommitClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitClock").field("last", &self.last).finish()
    }
}

//! Mutations generated from the shell configuration
//!
//! A workload is the optional `--key`/`--value` put followed by `--key-num`
//! puts keyed by a random UUID v4, with the same 16 bytes as the value. It is
//! produced lazily so a large `key-num` never sits in memory at once.

use lightning_core::Mutation;
use uuid::Uuid;

/// Lazy iterator of the mutations to ingest
#[derive(Debug, Clone)]
pub struct Workload {
    single: Option<(String, String)>,
    remaining: u64,
}

impl Workload {
    /// `single` is put first, then `random` generated puts
    pub fn new(single: Option<(String, String)>, random: u64) -> Self {
        Workload {
            single,
            remaining: random,
        }
    }

    /// Number of mutations left to yield, saturating at `u64::MAX`
    pub fn total(&self) -> u64 {
        self.remaining.saturating_add(u64::from(self.single.is_some()))
    }
}

impl Iterator for Workload {
    type Item = Mutation;

    fn next(&mut self) -> Option<Mutation> {
        if let Some((key, value)) = self.single.take() {
            return Some(Mutation::put(key, value));
        }
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let id = Uuid::new_v4();
        Some(Mutation::put(id.as_bytes().to_vec(), id.as_bytes().to_vec()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let exact = usize::try_from(self.remaining)
            .ok()
            .and_then(|n| n.checked_add(usize::from(self.single.is_some())));
        match exact {
            Some(n) => (n, Some(n)),
            None => (usize::MAX, None),
        }
    }
}

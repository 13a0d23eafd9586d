//! Mutation batch buffer
//!
//! Accumulates mutations between flushes. The buffer is owned by exactly one
//! [`EngineWriter`](crate::EngineWriter); [`BatchBuffer::drain`] hands its
//! whole content to a single flush, so a mutation is sent once or not at all.

use lightning_core::{Mutation, Result};

/// Ordered, bounded sequence of pending mutations
#[derive(Debug)]
pub struct BatchBuffer {
    mutations: Vec<Mutation>,
    batch_size: usize,
}

impl BatchBuffer {
    /// Create a buffer that reports full at `batch_size` mutations
    ///
    /// A zero batch size is treated as 1.
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            mutations: Vec::with_capacity(batch_size),
            batch_size,
        }
    }

    /// Append a mutation
    ///
    /// # Errors
    /// Returns `Error::InvalidMutation` for a malformed mutation; the buffer
    /// is left untouched.
    pub fn append(&mut self, mutation: Mutation) -> Result<()> {
        mutation.validate()?;
        self.mutations.push(mutation);
        Ok(())
    }

    /// Returns true once the buffer holds at least `batch_size` mutations
    pub fn is_full(&self) -> bool {
        self.mutations.len() >= self.batch_size
    }

    /// Take every buffered mutation, leaving the buffer empty
    pub fn drain(&mut self) -> Vec<Mutation> {
        std::mem::replace(&mut self.mutations, Vec::with_capacity(self.batch_size))
    }

    /// Number of buffered mutations
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// Returns true if nothing is buffered
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Configured flush threshold
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

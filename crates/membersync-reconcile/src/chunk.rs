//! Splitting identifier lists into bounded batches.

use crate::config::DEFAULT_MAX_BATCH_SIZE;

/// Splits a list into contiguous batches of at most `max_size` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_size: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_BATCH_SIZE)
    }
}

impl Chunker {
    /// A size of zero is treated as one.
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size: max_size.max(1),
        }
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.max_size
    }

    /// Batches in order. Empty input yields no batches.
    pub fn split<'a, T>(&self, items: &'a [T]) -> std::slice::Chunks<'a, T> {
        items.chunks(self.max_size)
    }

    /// Number of batches `split` yields for `len` items.
    #[must_use]
    pub fn batch_count(&self, len: usize) -> usize {
        len.div_ceil(self.max_size)
    }
}

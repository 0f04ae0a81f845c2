//! Thread-safe hand-off queue from generation workers to the consuming thread

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// FIFO of finished work, ordered by completion time.
///
/// Workers `push` from any thread. The single consumer calls `drain` (or
/// `process`) once per tick; the lock is only held while entries are moved
/// out, so anything pushed while the consumer is handling a batch waits for
/// the next tick.
pub struct CompletionQueue<T> {
    entries: Mutex<VecDeque<T>>,
}

impl<T> Default for CompletionQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CompletionQueue<T> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
        }
    }

    // Entries are plain data, so a panic elsewhere cannot leave them half-written
    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a finished entry
    pub fn push(&self, entry: T) {
        self.lock().push_back(entry);
    }

    /// Take every entry queued so far, oldest first
    pub fn drain(&self) -> Vec<T> {
        let mut entries = self.lock();
        entries.drain(..).collect()
    }

    /// Drain, then hand each entry to `handler` without holding the lock.
    ///
    /// Returns the number of entries handled.
    pub fn process(&self, mut handler: impl FnMut(T)) -> usize {
        let batch = self.drain();
        let count = batch.len();
        for entry in batch {
            handler(entry);
        }
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::operation::{Batch, Operation};

/// Thread-safe accumulator of operations waiting to be dispatched.
///
/// The pending queue and the running size counter are updated under one
/// lock, so a concurrent reader can never observe a count that disagrees
/// with the queue contents. Extraction removes operations from the front,
/// preserving submission order.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    inner: Mutex<BufferInner>,
}

#[derive(Debug, Default)]
struct BufferInner {
    pending: VecDeque<Operation>,
    estimated_size_in_bytes: u64,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an operation and bump the size counter.
    pub fn add(&self, operation: Operation) {
        let mut inner = self.inner.lock().expect("buffer lock poisoned");
        inner.estimated_size_in_bytes += operation.estimated_size_in_bytes();
        inner.pending.push_back(operation);
    }

    /// Atomically remove up to `n` operations from the front and return them
    /// as a detached batch, subtracting exactly their sizes from the
    /// counter. Returns fewer than `n` when fewer are pending.
    pub fn take(&self, n: usize) -> Batch {
        let mut inner = self.inner.lock().expect("buffer lock poisoned");
        inner.take(n)
    }

    /// Atomically drain every pending operation. Equivalent to
    /// `take(number_of_actions())` evaluated under the same lock, so
    /// operations added concurrently are either fully included or left for
    /// the next drain.
    pub fn take_all(&self) -> Batch {
        let mut inner = self.inner.lock().expect("buffer lock poisoned");
        let n = inner.pending.len();
        inner.take(n)
    }

    pub fn number_of_actions(&self) -> usize {
        self.inner.lock().expect("buffer lock poisoned").pending.len()
    }

    pub fn estimated_size_in_bytes(&self) -> u64 {
        self.inner
            .lock()
            .expect("buffer lock poisoned")
            .estimated_size_in_bytes
    }
}

impl BufferInner {
    fn take(&mut self, n: usize) -> Batch {
        let n = n.min(self.pending.len());
        let mut taken = Vec::with_capacity(n);
        let mut taken_size = 0;
        for _ in 0..n {
            let operation = self
                .pending
                .pop_front()
                .expect("pending count checked above");
            taken_size += operation.estimated_size_in_bytes();
            taken.push(operation);
        }
        self.estimated_size_in_bytes -= taken_size;
        Batch::from_operations(taken)
    }
}

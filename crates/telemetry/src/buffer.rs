/// Errors from [`RingBuffer::append_batch`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("batch size {batch_size} exceeds buffer capacity {capacity}")]
    BatchTooLarge { batch_size: usize, capacity: usize },
}

/// How an incoming batch was fitted to the declared batch size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFit {
    /// The batch had exactly the declared length.
    Exact,
    /// The batch was short; this many zero samples were appended.
    Padded { missing: usize },
    /// The batch was long; this many trailing samples were dropped.
    Truncated { dropped: usize },
}

/// Fixed-capacity circular buffer that is always full.
///
/// Slots start at a fill value and every write overwrites the oldest slot,
/// so `len() == capacity()` at all times. Backed by a `Vec` plus a head
/// cursor; writes are O(1) and never shift elements. Iteration order is
/// oldest → newest.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    /// Index of the oldest slot.
    head: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a buffer of `capacity` slots holding `T::default()`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self::filled(capacity, T::default())
    }

    /// Create a buffer of `capacity` slots holding `value`.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn filled(capacity: usize, value: T) -> Self {
        assert!(capacity > 0, "RingBuffer capacity must be > 0");
        Self {
            slots: vec![value; capacity],
            head: 0,
        }
    }

    /// Overwrite the oldest slot with `value`.
    pub fn push(&mut self, value: T) {
        self.slots[self.head] = value;
        self.head = (self.head + 1) % self.slots.len();
    }

    /// Evict the `batch_size` oldest slots and append a batch in their place.
    ///
    /// Exactly `batch_size` values are written regardless of `samples.len()`:
    /// a short batch is padded with `T::default()`, a long one is truncated.
    /// A `batch_size` larger than the capacity leaves the buffer untouched.
    pub fn append_batch(
        &mut self,
        batch_size: usize,
        samples: &[T],
    ) -> Result<BatchFit, BufferError> {
        if batch_size > self.capacity() {
            return Err(BufferError::BatchTooLarge {
                batch_size,
                capacity: self.capacity(),
            });
        }

        let fit = match samples.len() {
            n if n == batch_size => BatchFit::Exact,
            n if n < batch_size => BatchFit::Padded {
                missing: batch_size - n,
            },
            n => BatchFit::Truncated {
                dropped: n - batch_size,
            },
        };

        for i in 0..batch_size {
            self.push(samples.get(i).copied().unwrap_or_default());
        }
        Ok(fit)
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let (newer, older) = self.slots.split_at(self.head);
        older.iter().chain(newer.iter())
    }

    /// Copy the contents, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().copied().collect()
    }

    /// The most recently written value.
    pub fn last(&self) -> &T {
        let idx = (self.head + self.slots.len() - 1) % self.slots.len();
        &self.slots[idx]
    }

    /// Number of slots; always equal to [`capacity`](Self::capacity).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Always `false`; a ring buffer has at least one slot.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Maximum number of elements the buffer can hold.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

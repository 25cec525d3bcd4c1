//! Fixed-capacity ring buffer backing the serial log.

/// Capacity used when none (or zero) is requested.
pub const DEFAULT_CAPACITY: usize = 300;

/// A fixed-capacity buffer that overwrites its oldest element once full.
///
/// Pushing is O(1) and never fails; the backing store never grows. A
/// requested capacity of zero falls back to [`DEFAULT_CAPACITY`].
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Create a buffer with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a buffer holding at most `capacity` elements.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    /// Append a value, evicting the oldest element if the buffer is full.
    pub fn push(&mut self, value: T) {
        let capacity = self.capacity();
        self.slots[self.head] = Some(value);
        self.head = (self.head + 1) % capacity;
        if self.len < capacity {
            self.len += 1;
        }
    }

    /// Append a value if present; `None` is a no-op.
    pub fn push_opt(&mut self, value: Option<T>) {
        if let Some(value) = value {
            self.push(value);
        }
    }

    /// Maximum number of live elements.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer holds no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop all elements, keeping the capacity.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }

    /// Snapshot of the live elements, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        let capacity = self.capacity();
        (0..self.len)
            .filter_map(|i| {
                let index = (self.head + capacity - self.len + i) % capacity;
                self.slots[index].clone()
            })
            .collect()
    }
}

impl<T> Default for RingBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

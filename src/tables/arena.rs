//! Fixed-capacity slot arena
//!
//! Allocation pops a free-list instead of scanning for an empty slot, so
//! acquire cost does not grow with capacity. Indices stay stable for the
//! lifetime of an entry.

/// Fixed-capacity arena with a free-list allocator
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<usize>,
}

impl<T> Arena<T> {
    /// Arena holding at most `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        // popped in ascending index order
        let free = (0..capacity).rev().collect();
        Self { slots, free }
    }

    /// Insert an entry, returning its index, or `None` when full
    pub fn insert(&mut self, value: T) -> Option<usize> {
        let idx = self.free.pop()?;
        self.slots[idx] = Some(value);
        Some(idx)
    }

    /// Remove and return the entry at `idx`
    pub fn remove(&mut self, idx: usize) -> Option<T> {
        let value = self.slots.get_mut(idx)?.take()?;
        self.free.push(idx);
        Some(value)
    }

    pub fn get(&self, idx: usize) -> Option<&T> {
        self.slots.get(idx)?.as_ref()
    }

    pub fn get_mut(&mut self, idx: usize) -> Option<&mut T> {
        self.slots.get_mut(idx)?.as_mut()
    }

    /// Occupied entries with their indices
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|v| (i, v)))
    }

    /// Indices of occupied entries
    pub fn indices(&self) -> Vec<usize> {
        self.iter().map(|(i, _)| i).collect()
    }

    /// Number of occupied entries
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

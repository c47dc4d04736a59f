//! # Record Recycler
//!
//! Free-list recycling for short-lived records. Queues that churn through
//! operation records obtain them here instead of allocating fresh ones.

/// A record that can be recycled through a [`Recycler`].
///
/// `reset` is invoked when the record is released back to the free list.
/// Implementations must drop every held reference there, so a recycled
/// record never pins objects that the rest of the engine has let go of.
pub trait Poolable {
    /// Clears all held references and transient state.
    fn reset(&mut self);
}

/// A free-list recycler for fixed-type records.
///
/// Released records are reset and kept for reuse. Obtaining a record is
/// O(1): it pops the free list, falling back to `Default` construction
/// only when the list is empty.
///
/// # Thread Safety
///
/// Not thread-safe. Use one recycler per owning queue.
pub struct Recycler<T: Poolable + Default> {
    /// Records available for reuse.
    free: Vec<T>,
}

impl<T: Poolable + Default> Recycler<T> {
    /// Creates an empty recycler.
    #[must_use]
    pub fn new() -> Self {
        Self { free: Vec::new() }
    }

    /// Returns the number of records currently on the free list.
    #[inline]
    #[must_use]
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Obtains a record, reusing a released one when available.
    #[inline]
    pub fn obtain(&mut self) -> T {
        self.free.pop().unwrap_or_default()
    }

    /// Releases a record back to the free list.
    ///
    /// The record is reset before it becomes available for reuse.
    #[inline]
    pub fn release(&mut self, mut record: T) {
        record.reset();
        self.free.push(record);
    }
}

impl<T: Poolable + Default> Default for Recycler<T> {
    fn default() -> Self {
        Self::new()
    }
}

use alloc::vec::Vec;

use super::handle::Handle;
use crate::error::{Error, Result};

/// Slot storage that owns every node (or value) of a tree.
///
/// Freed slots are recycled through a free list, so handles stay stable for
/// the lifetime of the element they name.
pub(crate) struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<Handle>,
    limit: Option<usize>,
}

impl<T> Arena<T> {
    pub(crate) const fn new(limit: Option<usize>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            limit,
        }
    }

    pub(crate) const fn len(&self) -> usize {
        self.slots.len().saturating_sub(self.free.len())
    }

    /// Guarantees that the next `additional` calls to [`alloc`](Self::alloc) succeed.
    ///
    /// Nothing is mutated observably on failure.
    pub(crate) fn reserve(&mut self, additional: usize) -> Result<()> {
        if let Some(limit) = self.limit
            && self.len() + additional > limit
        {
            return Err(Error::NodeLimitExceeded { limit });
        }

        let fresh = additional.saturating_sub(self.free.len());
        if self.slots.len() + fresh > Handle::MAX {
            return Err(Error::HandleSpaceExhausted);
        }
        self.slots.try_reserve(fresh)?;
        Ok(())
    }

    pub(crate) fn alloc(&mut self, element: T) -> Handle {
        debug_assert!(
            self.limit.is_none_or(|limit| self.len() < limit),
            "`Arena::alloc()` - called without a successful `reserve()`"
        );
        if let Some(h) = self.free.pop() {
            self.slots[h.to_index()] = Some(element);
            h
        } else {
            assert!(
                self.slots.len() < Handle::MAX,
                "`Arena::alloc()` - arena is at maximum capacity ({})",
                Handle::MAX
            );
            self.slots.push(Some(element));
            Handle::from_index(self.slots.len() - 1)
        }
    }

    #[inline]
    pub(crate) fn get(&self, handle: Handle) -> &T {
        self.slots[handle.to_index()].as_ref().expect("`Arena::get()` - `handle` is invalid!")
    }

    /// Returns a reference to an element by handle from a raw pointer.
    ///
    /// # Safety
    /// - `ptr` must point to a valid, allocated `Arena<T>`.
    #[inline]
    pub(crate) unsafe fn get_ptr<'a>(ptr: *const Self, handle: Handle) -> &'a T {
        // SAFETY: Caller guarantees ptr is valid. Only the `slots` field is read.
        unsafe { (&(*ptr).slots)[handle.to_index()].as_ref().expect("`Arena::get_ptr()` - `handle` is invalid!") }
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, handle: Handle) -> &mut T {
        self.slots[handle.to_index()].as_mut().expect("`Arena::get_mut()` - `handle` is invalid!")
    }

    pub(crate) fn take(&mut self, handle: Handle) -> T {
        let element = self.slots[handle.to_index()].take().expect("`Arena::take()` - `handle` is invalid!");
        self.free.push(handle);
        element
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

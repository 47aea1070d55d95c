//! # Parent Allocators
//!
//! Registries never talk to the system heap after startup. At `start` they ask
//! a [`ParentAllocator`] for one [`MemoryBlock`] and carve everything out of it.

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use thiserror::Error;

/// Alignment of every block handed out by a parent allocator.
pub const BLOCK_ALIGN: usize = 16;

/// Errors raised by a parent allocator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocError {
    /// Zero-sized pools are rejected.
    #[error("cannot carve a zero-sized block")]
    ZeroSize,

    /// The requested size cannot be expressed as a layout.
    #[error("invalid block layout for {size} bytes")]
    InvalidLayout {
        /// Bytes requested.
        size: usize,
    },

    /// A budgeted parent has no room left.
    #[error("memory budget exceeded: requested {requested} bytes, {remaining} remaining")]
    BudgetExceeded {
        /// Bytes requested.
        requested: usize,
        /// Bytes left in the budget.
        remaining: usize,
    },

    /// The global allocator refused the request.
    #[error("system allocator out of memory: requested {requested} bytes")]
    SystemOutOfMemory {
        /// Bytes requested.
        requested: usize,
    },
}

/// An owned, zero-initialised, [`BLOCK_ALIGN`]-aligned region of memory.
///
/// Dropping the block returns it to the global allocator. This is how a
/// registry "releases" its arena on `stop`.
pub struct MemoryBlock {
    ptr: NonNull<u8>,
    len: usize,
}

impl MemoryBlock {
    /// Allocates a zeroed block of `len` bytes from the global allocator.
    ///
    /// # Errors
    ///
    /// [`AllocError::ZeroSize`] for `len == 0`, [`AllocError::InvalidLayout`]
    /// when `len` overflows a layout, [`AllocError::SystemOutOfMemory`] when the
    /// global allocator fails.
    pub fn zeroed(len: usize) -> Result<Self, AllocError> {
        if len == 0 {
            return Err(AllocError::ZeroSize);
        }

        let layout = Layout::from_size_align(len, BLOCK_ALIGN)
            .map_err(|_| AllocError::InvalidLayout { size: len })?;

        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let ptr = NonNull::new(raw).ok_or(AllocError::SystemOutOfMemory { requested: len })?;

        Ok(Self { ptr, len })
    }

    /// Size of the block in bytes.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Always `false`: empty blocks cannot be constructed.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Base address of the block.
    #[inline]
    #[must_use]
    pub const fn as_ptr(&self) -> NonNull<u8> {
        self.ptr
    }
}

impl Drop for MemoryBlock {
    fn drop(&mut self) {
        // SAFETY: `ptr` came from `alloc_zeroed` with exactly this layout, which
        // was validated in `zeroed`.
        unsafe {
            let layout = Layout::from_size_align_unchecked(self.len, BLOCK_ALIGN);
            alloc::dealloc(self.ptr.as_ptr(), layout);
        }
    }
}

impl std::fmt::Debug for MemoryBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlock")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}

/// Source of backing memory for arenas.
///
/// Called exactly once per `start`; never called back afterwards.
pub trait ParentAllocator {
    /// Carves a block of at least `size` bytes.
    ///
    /// # Errors
    ///
    /// Implementation specific, see [`AllocError`].
    fn allocate(&mut self, size: usize) -> Result<MemoryBlock, AllocError>;
}

/// Parent allocator backed directly by the global heap.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemAllocator;

impl ParentAllocator for SystemAllocator {
    fn allocate(&mut self, size: usize) -> Result<MemoryBlock, AllocError> {
        MemoryBlock::zeroed(size)
    }
}

/// Parent allocator with a fixed lifetime budget.
///
/// Models the engine's total memory envelope: every pool handed out is charged
/// against the budget and nothing is ever credited back, since registries do
/// not call their parent again after `start`.
#[derive(Debug)]
pub struct BudgetAllocator {
    budget: usize,
    handed_out: usize,
}

impl BudgetAllocator {
    /// Creates a parent with `budget` bytes to distribute.
    #[must_use]
    pub const fn new(budget: usize) -> Self {
        Self {
            budget,
            handed_out: 0,
        }
    }

    /// Bytes already handed out.
    #[inline]
    #[must_use]
    pub const fn handed_out(&self) -> usize {
        self.handed_out
    }

    /// Bytes still available.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.budget - self.handed_out
    }
}

impl ParentAllocator for BudgetAllocator {
    fn allocate(&mut self, size: usize) -> Result<MemoryBlock, AllocError> {
        if size > self.remaining() {
            return Err(AllocError::BudgetExceeded {
                requested: size,
                remaining: self.remaining(),
            });
        }

        let block = MemoryBlock::zeroed(size)?;
        self.handed_out += size;
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_is_aligned_and_zeroed() {
        let block = MemoryBlock::zeroed(256).unwrap();
        assert_eq!(block.len(), 256);
        assert_eq!(block.as_ptr().as_ptr() as usize % BLOCK_ALIGN, 0);

        // SAFETY: the block is 256 initialised bytes.
        let bytes = unsafe { std::slice::from_raw_parts(block.as_ptr().as_ptr(), block.len()) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_zero_size_rejected() {
        assert_eq!(MemoryBlock::zeroed(0).unwrap_err(), AllocError::ZeroSize);
        assert_eq!(SystemAllocator.allocate(0).unwrap_err(), AllocError::ZeroSize);
    }

    #[test]
    fn test_budget_is_charged_and_enforced() {
        let mut parent = BudgetAllocator::new(1024);
        let _a = parent.allocate(600).unwrap();
        assert_eq!(parent.handed_out(), 600);
        assert_eq!(parent.remaining(), 424);

        let err = parent.allocate(500).unwrap_err();
        assert_eq!(
            err,
            AllocError::BudgetExceeded {
                requested: 500,
                remaining: 424
            }
        );
    }

    #[test]
    fn test_budget_not_refunded_on_drop() {
        let mut parent = BudgetAllocator::new(512);
        drop(parent.allocate(512).unwrap());
        assert_eq!(parent.remaining(), 0);
        assert!(parent.allocate(16).is_err());
    }
}

//! # Memory Management
//!
//! Fixed pools carved once at startup. During gameplay:
//! - No calls back into the parent allocator
//! - O(1) reuse of freed regions through the free list
//! - Fragmentation is accepted, never compacted

mod arena;
mod block;

pub use arena::{ArenaError, ArenaStats, FitPolicy, FreeListArena, MIN_ARENA_SIZE};
pub use block::{AllocError, BudgetAllocator, MemoryBlock, ParentAllocator, SystemAllocator, BLOCK_ALIGN};

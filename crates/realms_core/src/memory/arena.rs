//! # Free-List Arena
//!
//! A fixed-capacity arena carved once from a parent allocator. Variable-size
//! requests are served from an address-ordered free list; freed regions are
//! merged with their neighbours. The arena never grows and never compacts.
//!
//! ## Layout
//!
//! ```text
//! | FreeNode | ...free... | pad | AllocHeader | object ... | FreeNode | ...
//! ^ region start (16-byte multiple)           ^ user pointer
//! ```
//!
//! All bookkeeping lives inside the block itself as `Pod` records, so the
//! conservation equation `used + free == capacity` holds exactly.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::mem::size_of;
use std::ptr::NonNull;
use std::slice;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::block::MemoryBlock;

/// Granularity of every region in the arena.
const REGION_ALIGN: usize = 16;

/// Header written just before every user pointer.
const HEADER_SIZE: usize = size_of::<AllocHeader>();

/// Smallest region that can sit on the free list.
const MIN_FREE: usize = size_of::<FreeNode>();

/// Smallest block an arena can be built over.
pub const MIN_ARENA_SIZE: usize = HEADER_SIZE + REGION_ALIGN;

/// End-of-list marker for `FreeNode::next`.
const NIL: u64 = u64::MAX;

/// A free region. Stored at the start of the region it describes.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct FreeNode {
    /// Region size in bytes, header included.
    size: u64,
    /// Offset of the next free region, or `NIL`.
    next: u64,
}

/// Bookkeeping for a live allocation. Stored immediately before the user pointer.
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
#[repr(C)]
struct AllocHeader {
    /// Size of the whole region.
    size: u64,
    /// Distance from region start to the user pointer.
    padding: u64,
}

/// Errors raised by the arena.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// No free region is large enough. The arena does not defragment.
    #[error("arena out of memory: requested {requested} bytes (align {align}), largest free block {largest_free}")]
    OutOfMemory {
        /// Bytes requested.
        requested: usize,
        /// Alignment requested.
        align: usize,
        /// Largest contiguous free region at the time of the request.
        largest_free: usize,
    },

    /// The backing block cannot hold even one allocation.
    #[error("arena block too small: {size} bytes, minimum {minimum}")]
    BlockTooSmall {
        /// Size of the supplied block.
        size: usize,
        /// Minimum usable size.
        minimum: usize,
    },

    /// The free list failed an integrity check.
    #[error("arena corrupted at offset {offset}: {reason}")]
    Corrupted {
        /// Offset of the offending record.
        offset: usize,
        /// What was wrong.
        reason: &'static str,
    },
}

/// How a free region is chosen for a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitPolicy {
    /// First region in address order that fits.
    #[default]
    FirstFit,
    /// Smallest region that fits.
    BestFit,
}

/// Point-in-time view of arena occupancy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Usable bytes in the arena.
    pub capacity: usize,
    /// Bytes held by live allocations, headers and padding included.
    pub used: usize,
    /// Bytes on the free list.
    pub free: usize,
    /// Largest contiguous free region.
    pub largest_free_block: usize,
    /// Number of free regions.
    pub free_block_count: usize,
    /// Number of live allocations.
    pub allocation_count: usize,
}

/// A region selected for an allocation.
struct Fit {
    prev: Option<usize>,
    offset: usize,
    node: FreeNode,
    padding: usize,
    needed: usize,
}

/// Free-list arena over a single [`MemoryBlock`].
///
/// # Thread Safety
///
/// Not thread-safe. One arena belongs to one registry on the game-loop thread.
///
/// # Example
///
/// ```rust,ignore
/// let block = SystemAllocator.allocate(4096)?;
/// let mut arena = FreeListArena::new(block, FitPolicy::FirstFit)?;
///
/// let ptr = arena.allocate(Layout::new::<[f32; 4]>())?;
/// unsafe { arena.deallocate(ptr) };
/// ```
pub struct FreeListArena {
    block: MemoryBlock,
    capacity: usize,
    head: Option<usize>,
    used: usize,
    allocations: usize,
    policy: FitPolicy,
}

impl FreeListArena {
    /// Builds an arena over `block`. The whole block starts as one free region.
    ///
    /// # Errors
    ///
    /// [`ArenaError::BlockTooSmall`] when the block cannot hold one allocation.
    pub fn new(block: MemoryBlock, policy: FitPolicy) -> Result<Self, ArenaError> {
        let capacity = block.len() - block.len() % REGION_ALIGN;
        if capacity < MIN_ARENA_SIZE {
            return Err(ArenaError::BlockTooSmall {
                size: block.len(),
                minimum: MIN_ARENA_SIZE,
            });
        }

        let mut arena = Self {
            block,
            capacity,
            head: Some(0),
            used: 0,
            allocations: 0,
            policy,
        };
        arena.write(
            0,
            &FreeNode {
                size: capacity as u64,
                next: NIL,
            },
        );
        Ok(arena)
    }

    /// Bytes a single allocation of `layout` consumes, header and padding
    /// included, in the worst case.
    ///
    /// For alignments up to 16 this is exact, so `n * footprint(layout)` bytes
    /// hold exactly `n` such allocations.
    #[must_use]
    pub const fn footprint(layout: Layout) -> usize {
        let align = if layout.align() > REGION_ALIGN {
            layout.align()
        } else {
            REGION_ALIGN
        };
        let size = if layout.size() == 0 { 1 } else { layout.size() };
        round_up(HEADER_SIZE + (align - REGION_ALIGN) + size, REGION_ALIGN)
    }

    /// Placement policy in use.
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> FitPolicy {
        self.policy
    }

    /// Usable bytes.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes held by live allocations.
    #[inline]
    #[must_use]
    pub const fn used(&self) -> usize {
        self.used
    }

    /// Bytes on the free list.
    #[inline]
    #[must_use]
    pub const fn free(&self) -> usize {
        self.capacity - self.used
    }

    /// Number of live allocations.
    #[inline]
    #[must_use]
    pub const fn allocation_count(&self) -> usize {
        self.allocations
    }

    /// Largest contiguous free region.
    #[must_use]
    pub fn largest_free_block(&self) -> usize {
        self.nodes().map(|(_, node)| node.size as usize).max().unwrap_or(0)
    }

    /// Number of free regions.
    #[must_use]
    pub fn free_block_count(&self) -> usize {
        self.nodes().count()
    }

    /// Snapshot of the arena's occupancy.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let (largest, count) = self
            .nodes()
            .fold((0, 0), |(largest, count), (_, node)| {
                (largest.max(node.size as usize), count + 1)
            });

        ArenaStats {
            capacity: self.capacity,
            used: self.used,
            free: self.free(),
            largest_free_block: largest,
            free_block_count: count,
            allocation_count: self.allocations,
        }
    }

    /// Hands out a region satisfying `layout`.
    ///
    /// Splits the chosen free region when the remainder can hold a free node;
    /// otherwise the whole region is handed out.
    ///
    /// # Errors
    ///
    /// [`ArenaError::OutOfMemory`] when no single free region is large enough.
    pub fn allocate(&mut self, layout: Layout) -> Result<NonNull<u8>, ArenaError> {
        let size = layout.size().max(1);
        let align = layout.align().max(REGION_ALIGN);

        let Some(fit) = self.find_fit(size, align) else {
            return Err(ArenaError::OutOfMemory {
                requested: layout.size(),
                align: layout.align(),
                largest_free: self.largest_free_block(),
            });
        };

        let region = fit.node.size as usize;
        let remainder = region - fit.needed;
        let (taken, next) = if remainder >= MIN_FREE {
            let split_at = fit.offset + fit.needed;
            self.write(
                split_at,
                &FreeNode {
                    size: remainder as u64,
                    next: fit.node.next,
                },
            );
            (fit.needed, split_at as u64)
        } else {
            (region, fit.node.next)
        };
        self.link(fit.prev, next);

        let user = fit.offset + fit.padding;
        self.write(
            user - HEADER_SIZE,
            &AllocHeader {
                size: taken as u64,
                padding: fit.padding as u64,
            },
        );

        self.used += taken;
        self.allocations += 1;

        // SAFETY: `user` lies inside the block.
        Ok(unsafe { NonNull::new_unchecked(self.base().add(user)) })
    }

    /// Returns a region to the free list, merging it with adjacent free regions.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
    /// arena and not deallocated since. Any object stored there must already
    /// have been dropped or moved out.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        let user = ptr.as_ptr() as usize - self.base() as usize;
        debug_assert!(user >= HEADER_SIZE && user <= self.capacity);

        let header: AllocHeader = self.read(user - HEADER_SIZE);
        let start = user - header.padding as usize;
        let size = header.size as usize;

        self.used -= size;
        self.allocations -= 1;
        self.insert_free(start, size);
    }

    /// Walks the free list and checks ordering, bounds, coalescing and the
    /// conservation equation.
    ///
    /// # Errors
    ///
    /// [`ArenaError::Corrupted`] describing the first violation found.
    pub fn check_integrity(&self) -> Result<(), ArenaError> {
        let mut free = 0;
        let mut last_end: Option<usize> = None;

        for (offset, node) in self.nodes() {
            let size = node.size as usize;
            if size < MIN_FREE || size % REGION_ALIGN != 0 {
                return Err(corrupted(offset, "free region has an invalid size"));
            }
            if offset + size > self.capacity {
                return Err(corrupted(offset, "free region runs past the arena"));
            }
            match last_end {
                Some(end) if offset < end => {
                    return Err(corrupted(offset, "free regions overlap or are out of order"));
                }
                Some(end) if offset == end => {
                    return Err(corrupted(offset, "adjacent free regions were not merged"));
                }
                _ => {}
            }
            last_end = Some(offset + size);
            free += size;
        }

        if free + self.used != self.capacity {
            return Err(corrupted(0, "free and used bytes do not add up to capacity"));
        }
        Ok(())
    }

    /// Releases the backing block.
    #[must_use]
    pub fn into_block(self) -> MemoryBlock {
        self.block
    }

    fn find_fit(&self, size: usize, align: usize) -> Option<Fit> {
        let base = self.base() as usize;
        let mut best: Option<Fit> = None;
        let mut prev = None;

        for (offset, node) in self.nodes() {
            let user = round_up(base + offset + HEADER_SIZE, align) - base;
            let padding = user - offset;
            let needed = round_up(padding + size, REGION_ALIGN);

            if needed <= node.size as usize {
                let fit = Fit {
                    prev,
                    offset,
                    node,
                    padding,
                    needed,
                };
                match self.policy {
                    FitPolicy::FirstFit => return Some(fit),
                    FitPolicy::BestFit => {
                        if best.as_ref().map_or(true, |b| node.size < b.node.size) {
                            best = Some(fit);
                        }
                    }
                }
            }
            prev = Some(offset);
        }

        best
    }

    fn insert_free(&mut self, start: usize, size: usize) {
        let mut prev = None;
        let mut cur = self.head;
        while let Some(offset) = cur {
            if offset > start {
                break;
            }
            prev = Some(offset);
            cur = next_of(self.read::<FreeNode>(offset).next);
        }

        let mut node = FreeNode {
            size: size as u64,
            next: cur.map_or(NIL, |c| c as u64),
        };

        if let Some(next) = cur {
            if start + size == next {
                let absorbed: FreeNode = self.read(next);
                node.size += absorbed.size;
                node.next = absorbed.next;
            }
        }

        match prev {
            Some(p) => {
                let mut before: FreeNode = self.read(p);
                if p + before.size as usize == start {
                    before.size += node.size;
                    before.next = node.next;
                    self.write(p, &before);
                    return;
                }
                before.next = start as u64;
                self.write(p, &before);
            }
            None => self.head = Some(start),
        }
        self.write(start, &node);
    }

    fn link(&mut self, prev: Option<usize>, next: u64) {
        match prev {
            Some(p) => {
                let mut node: FreeNode = self.read(p);
                node.next = next;
                self.write(p, &node);
            }
            None => self.head = next_of(next),
        }
    }

    fn nodes(&self) -> impl Iterator<Item = (usize, FreeNode)> + '_ {
        let mut cur = self.head;
        std::iter::from_fn(move || {
            let offset = cur?;
            let node: FreeNode = self.read(offset);
            cur = next_of(node.next);
            Some((offset, node))
        })
    }

    #[inline]
    fn base(&self) -> *mut u8 {
        self.block.as_ptr().as_ptr()
    }

    fn read<P: Pod>(&self, offset: usize) -> P {
        debug_assert!(offset + size_of::<P>() <= self.capacity);
        // SAFETY: bookkeeping records lie inside the block, in bytes no live
        // object occupies. The block was zeroed when carved.
        let bytes = unsafe { slice::from_raw_parts(self.base().add(offset), size_of::<P>()) };
        bytemuck::pod_read_unaligned(bytes)
    }

    fn write<P: Pod>(&mut self, offset: usize, value: &P) {
        debug_assert!(offset + size_of::<P>() <= self.capacity);
        // SAFETY: as in `read`; `&mut self` rules out other bookkeeping views.
        let bytes = unsafe { slice::from_raw_parts_mut(self.base().add(offset), size_of::<P>()) };
        bytes.copy_from_slice(bytemuck::bytes_of(value));
    }
}

impl std::fmt::Debug for FreeListArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreeListArena")
            .field("capacity", &self.capacity)
            .field("used", &self.used)
            .field("allocations", &self.allocations)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

#[inline]
const fn round_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[inline]
fn next_of(link: u64) -> Option<usize> {
    (link != NIL).then_some(link as usize)
}

fn corrupted(offset: usize, reason: &'static str) -> ArenaError {
    ArenaError::Corrupted { offset, reason }
}

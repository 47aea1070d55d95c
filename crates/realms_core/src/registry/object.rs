//! # Object Registry
//!
//! Maps opaque [`Handle`]s to objects constructed in place inside a
//! [`FreeListArena`]. Control flow:
//!
//! ```text
//! create:  arena.allocate -> write object -> handle = next++ -> map[handle] = ptr
//! access:  handle -> validate -> map lookup -> &T            (miss: count + log)
//! destroy: handle -> map lookup -> drop -> arena.deallocate -> map.remove
//! ```
//!
//! Every entry in the map points at a live, fully constructed object; the
//! entry is removed in the same call that drops and frees the object.
//!
//! The map is a handle-sorted `Vec` reserved at `start` for as many objects
//! as the arena could ever hold. Handles only grow, so `create` appends and
//! lookups binary-search; neither touches the heap while the registry runs.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::any::type_name;
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use std::sync::Arc;

use super::diagnostics::{DiagnosticEvent, Diagnostics};
use super::error::{HandleFault, Operation, RegistryError, RegistryResult};
use super::handle::Handle;
use crate::config::RegistryConfig;
use crate::memory::{
    ArenaError, ArenaStats, FitPolicy, FreeListArena, ParentAllocator, MIN_ARENA_SIZE,
};

/// Upper bound on live objects in an arena of `capacity` usable bytes: every
/// allocation costs at least the footprint of a single byte.
const fn max_live_objects(capacity: usize) -> usize {
    capacity / FreeListArena::footprint(Layout::new::<u8>())
}

/// Handle-indexed registry of objects stored in a private arena.
///
/// `T` may be unsized (`dyn Trait`), in which case objects are created with
/// [`create_with`](Self::create_with) and stored behind the trait object.
///
/// # Fault accounting
///
/// Lookups through a null, destroyed or never-issued handle do not fail the
/// caller's frame: they yield "no object", bump [`error_count`](Self::error_count)
/// by one, log an `error!` event and forward the fault to the shared
/// [`Diagnostics`] sink.
///
/// # Thread Safety
///
/// Single-threaded by construction (the registry is neither `Send` nor `Sync`).
/// Shard registries per thread instead of sharing one.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry: ObjectRegistry<Particle> = ObjectRegistry::new("Particles");
/// registry.start(&mut SystemAllocator, 64 * 1024)?;
///
/// let handle = registry.create(Particle::default())?;
/// if let Some(particle) = registry.get_mut(handle) {
///     particle.life -= dt;
/// }
/// registry.destroy(handle);
/// registry.stop();
/// ```
pub struct ObjectRegistry<T: ?Sized> {
    name: &'static str,
    policy: FitPolicy,
    arena: Option<FreeListArena>,
    /// Sorted by handle; never grows past the capacity reserved at `start`.
    entries: Vec<(Handle, NonNull<T>)>,
    /// Next raw handle value; `None` once the counter has run out.
    next_handle: Option<u64>,
    errors: Cell<u64>,
    diagnostics: Arc<Diagnostics>,
    _owns: PhantomData<T>,
}

impl<T: ?Sized> ObjectRegistry<T> {
    /// Creates a stopped registry with its own diagnostics sink.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self::with_diagnostics(name, Arc::new(Diagnostics::default()))
    }

    /// Creates a stopped registry reporting faults into `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(name: &'static str, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            name,
            policy: FitPolicy::default(),
            arena: None,
            entries: Vec::new(),
            next_handle: Some(1),
            errors: Cell::new(0),
            diagnostics,
            _owns: PhantomData,
        }
    }

    /// Name used in log events and diagnostics.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Placement policy for the next `start`.
    pub fn set_policy(&mut self, policy: FitPolicy) {
        self.policy = policy;
    }

    /// Shared diagnostics sink.
    #[inline]
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<Diagnostics> {
        &self.diagnostics
    }

    /// Whether the registry currently owns an arena.
    #[inline]
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.arena.is_some()
    }

    /// Number of live objects.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when no object is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handle faults since the last `start`.
    #[inline]
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.errors.get()
    }

    /// Arena occupancy, or `None` when stopped.
    #[must_use]
    pub fn arena_stats(&self) -> Option<ArenaStats> {
        self.arena.as_ref().map(FreeListArena::stats)
    }

    /// The arena itself, for integrity checks. `None` when stopped.
    #[must_use]
    pub fn arena(&self) -> Option<&FreeListArena> {
        self.arena.as_ref()
    }

    /// Carves a `pool_size` byte pool from `parent` and builds the arena over it.
    ///
    /// Resets the handle counter to 1 and the error counter to 0.
    ///
    /// # Errors
    ///
    /// - [`RegistryError::AlreadyStarted`] unless preceded by [`stop`](Self::stop)
    /// - [`RegistryError::Parent`] when the parent cannot supply the pool
    /// - [`RegistryError::Arena`] when the pool is too small to be an arena
    pub fn start(&mut self, parent: &mut dyn ParentAllocator, pool_size: usize) -> RegistryResult<()> {
        if self.is_started() {
            tracing::warn!(registry = self.name, "start called on a running registry");
            return Err(RegistryError::AlreadyStarted);
        }

        tracing::info!(registry = self.name, pool_size, policy = ?self.policy, "initializing");

        // Reject before the parent is charged.
        if pool_size < MIN_ARENA_SIZE {
            return Err(RegistryError::Arena(ArenaError::BlockTooSmall {
                size: pool_size,
                minimum: MIN_ARENA_SIZE,
            }));
        }

        let block = parent.allocate(pool_size)?;
        let arena = FreeListArena::new(block, self.policy)?;
        self.entries = Vec::with_capacity(max_live_objects(arena.capacity()));
        self.arena = Some(arena);
        self.next_handle = Some(1);
        self.errors.set(0);

        tracing::info!(registry = self.name, "initialized");
        Ok(())
    }

    /// [`start`](Self::start) with the pool size and policy taken from `config`.
    ///
    /// # Errors
    ///
    /// As for [`start`](Self::start).
    pub fn start_with_config(
        &mut self,
        parent: &mut dyn ParentAllocator,
        config: &RegistryConfig,
    ) -> RegistryResult<()> {
        self.set_policy(config.fit_policy);
        self.start(parent, config.pool_size)
    }

    /// Constructs `value` in the arena and stores it as a `T`.
    ///
    /// `upcast` turns the freshly placed `&mut U` into the registry's `&mut T`,
    /// typically a function whose body is an unsizing coercion:
    ///
    /// ```rust,ignore
    /// fn as_shape(square: &mut Square) -> &mut (dyn Shape + 'static) {
    ///     square
    /// }
    /// registry.create_with(Square(2.0), as_shape)?;
    /// ```
    ///
    /// # Errors
    ///
    /// - [`RegistryError::NotStarted`]
    /// - [`RegistryError::Arena`] with `OutOfMemory` when no region fits
    /// - [`RegistryError::HandlesExhausted`] when the counter has run out
    /// - [`RegistryError::UpcastMismatch`] when `upcast` returns another object
    pub fn create_with<U>(
        &mut self,
        value: U,
        upcast: impl FnOnce(&mut U) -> &mut T,
    ) -> RegistryResult<Handle> {
        let name = self.name;
        let Some(arena) = self.arena.as_mut() else {
            return Err(RegistryError::NotStarted);
        };
        let Some(raw) = self.next_handle else {
            tracing::warn!(registry = name, "handle space exhausted");
            return Err(RegistryError::HandlesExhausted);
        };

        let layout = Layout::new::<U>();
        let slot = arena.allocate(layout).map_err(|err| {
            tracing::warn!(registry = name, %err, object = type_name::<U>(), "allocation failed");
            RegistryError::from(err)
        })?;

        let placed = slot.cast::<U>();
        // SAFETY: `slot` is a fresh region sized and aligned for `U`.
        unsafe { placed.as_ptr().write(value) };

        // SAFETY: the object was just written and nothing else references it.
        let object = NonNull::from(upcast(unsafe { &mut *placed.as_ptr() }));
        if object.cast::<u8>() != slot {
            // SAFETY: the value is still owned here and its region came from `arena`.
            unsafe {
                ptr::drop_in_place(placed.as_ptr());
                arena.deallocate(slot);
            }
            return Err(RegistryError::UpcastMismatch {
                type_name: type_name::<U>(),
            });
        }

        let handle = Handle::from_raw(raw);
        self.next_handle = raw.checked_add(1);
        debug_assert!(self.entries.last().map_or(true, |&(last, _)| last < handle));
        debug_assert!(self.entries.len() < self.entries.capacity());
        self.entries.push((handle, object));

        tracing::debug!(
            registry = name,
            handle = raw,
            object = type_name::<U>(),
            bytes = layout.size(),
            "created"
        );
        Ok(handle)
    }

    /// Syntactic check only: non-null. Use [`get`](Self::get) for liveness.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self, handle: Handle) -> bool {
        handle.is_valid()
    }

    /// Whether `handle` maps to a live object. Never counts a fault.
    #[inline]
    #[must_use]
    pub fn contains(&self, handle: Handle) -> bool {
        self.position(handle).is_ok()
    }

    /// Resolves `handle`, reporting which fault occurred on a miss.
    ///
    /// # Errors
    ///
    /// [`HandleFault::InvalidHandle`] or [`HandleFault::NotFound`]; either one
    /// has already been counted and logged.
    pub fn lookup(&self, handle: Handle) -> Result<&T, HandleFault> {
        self.lookup_for(handle, Operation::Get)
    }

    /// As [`lookup`](Self::lookup), attributing any fault to `operation`.
    ///
    /// # Errors
    ///
    /// As for [`lookup`](Self::lookup).
    pub fn lookup_for(&self, handle: Handle, operation: Operation) -> Result<&T, HandleFault> {
        let ptr = self.resolve(handle, operation)?;
        // SAFETY: mapped pointers always refer to live objects, and `&self`
        // rules out a concurrent `&mut` to the same object.
        Ok(unsafe { ptr.as_ref() })
    }

    /// Exclusive variant of [`lookup`](Self::lookup).
    ///
    /// # Errors
    ///
    /// As for [`lookup`](Self::lookup).
    pub fn lookup_mut(&mut self, handle: Handle) -> Result<&mut T, HandleFault> {
        let mut ptr = self.resolve(handle, Operation::GetMut)?;
        // SAFETY: as in `lookup_for`, with `&mut self` guaranteeing uniqueness.
        Ok(unsafe { ptr.as_mut() })
    }

    /// Shared access, or `None` (counted) for a bad handle.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.lookup(handle).ok()
    }

    /// Exclusive access, or `None` (counted) for a bad handle.
    #[inline]
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.lookup_mut(handle).ok()
    }

    /// Live handles in ascending order.
    pub fn handles(&self) -> impl Iterator<Item = Handle> + '_ {
        self.entries.iter().map(|&(handle, _)| handle)
    }

    /// Live objects in handle order.
    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> + '_ {
        // SAFETY: mapped pointers always refer to live objects.
        self.entries
            .iter()
            .map(|(handle, ptr)| (*handle, unsafe { ptr.as_ref() }))
    }

    /// Live objects in handle order, mutably.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle, &mut T)> + '_ {
        // SAFETY: every entry is a distinct object, and `&mut self` is held
        // for as long as the iterator lives.
        self.entries
            .iter()
            .map(|&(handle, ptr)| (handle, unsafe { &mut *ptr.as_ptr() }))
    }

    /// Destroys the object behind `handle`.
    ///
    /// Returns `false` (after counting the fault) for a null, destroyed or
    /// unknown handle. Destroying twice is harmless beyond the second count.
    pub fn destroy(&mut self, handle: Handle) -> bool {
        self.retire(handle, |_| ()).is_some()
    }

    /// Destroys the object behind `handle`, first copying data out of it.
    ///
    /// `capture` runs before the destructor; its result is all that survives
    /// the object. Returns `None` (after counting the fault) for a bad handle.
    pub fn retire<R>(&mut self, handle: Handle, capture: impl FnOnce(&T) -> R) -> Option<R> {
        let ptr = self.resolve(handle, Operation::Destroy).ok()?;

        // SAFETY: mapped pointers always refer to live objects.
        let captured = capture(unsafe { ptr.as_ref() });

        // SAFETY: the object is live and owned by this registry; the entry is
        // removed right after so nothing can reach the freed memory.
        unsafe { self.release(ptr) };
        if let Ok(index) = self.position(handle) {
            self.entries.remove(index);
        }

        tracing::debug!(registry = self.name, handle = handle.raw(), "destroyed");
        Some(captured)
    }

    /// Destroys every live object and releases the arena.
    ///
    /// Returns the number of objects destroyed. Further lookups fault with
    /// `NotFound` and creation fails with `NotStarted` until the next `start`.
    pub fn stop(&mut self) -> usize {
        if !self.is_started() {
            return 0;
        }
        tracing::info!(registry = self.name, live = self.entries.len(), "stopping");

        let entries = std::mem::take(&mut self.entries);
        let destroyed = entries.len();
        for (_, ptr) in entries {
            // SAFETY: each mapped object is live and dropped exactly once here.
            unsafe { self.release(ptr) };
        }

        if let Some(arena) = self.arena.take() {
            debug_assert_eq!(arena.allocation_count(), 0);
            drop(arena.into_block());
        }

        tracing::info!(registry = self.name, destroyed, "stopped");
        destroyed
    }

    /// Counts and logs a fault discovered by a layer above the registry.
    pub fn record_fault(&self, operation: Operation, fault: HandleFault) -> HandleFault {
        self.errors.set(self.errors.get().saturating_add(1));
        self.diagnostics.record(DiagnosticEvent {
            registry: self.name,
            operation,
            fault,
        });
        tracing::error!(registry = self.name, %operation, %fault, "handle fault");
        fault
    }

    fn resolve(&self, handle: Handle, operation: Operation) -> Result<NonNull<T>, HandleFault> {
        tracing::trace!(registry = self.name, handle = handle.raw(), %operation, "resolving");

        if !handle.is_valid() {
            return Err(self.record_fault(operation, HandleFault::InvalidHandle(handle)));
        }
        self.position(handle)
            .ok()
            .and_then(|index| self.entries.get(index))
            .map(|&(_, ptr)| ptr)
            .ok_or_else(|| self.record_fault(operation, HandleFault::NotFound(handle)))
    }

    #[inline]
    fn position(&self, handle: Handle) -> Result<usize, usize> {
        self.entries.binary_search_by_key(&handle, |&(live, _)| live)
    }

    /// Drops the object and returns its region to the arena.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live object of this registry that is dropped nowhere else.
    unsafe fn release(&mut self, ptr: NonNull<T>) {
        ptr::drop_in_place(ptr.as_ptr());
        if let Some(arena) = self.arena.as_mut() {
            arena.deallocate(ptr.cast());
        }
    }

    #[cfg(test)]
    pub(crate) fn set_next_handle(&mut self, raw: u64) {
        self.next_handle = Some(raw);
    }
}

impl<T> ObjectRegistry<T> {
    /// Constructs `value` in the arena and returns its handle.
    ///
    /// # Errors
    ///
    /// As for [`create_with`](Self::create_with).
    pub fn create(&mut self, value: T) -> RegistryResult<Handle> {
        self.create_with(value, |object| object)
    }
}

impl<T: ?Sized> Drop for ObjectRegistry<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

impl<T: ?Sized> fmt::Debug for ObjectRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("name", &self.name)
            .field("started", &self.is_started())
            .field("live", &self.entries.len())
            .field("errors", &self.errors.get())
            .field("arena", &self.arena)
            .finish_non_exhaustive()
    }
}

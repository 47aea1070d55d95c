//! # Component Manager
//!
//! The component registry: an [`ObjectRegistry`] of `dyn Component` whose
//! destroy path keeps the owning entity's component list consistent.

use std::sync::Arc;

use super::component::Component;
use super::detach::{detach_from_owner, Detachment};
use super::directory::EntityDirectory;
use super::entity::EntityId;
use crate::config::RegistryConfig;
use crate::memory::{ArenaStats, ParentAllocator};
use crate::registry::{Diagnostics, Handle, ObjectRegistry, Operation, RegistryResult};

/// Registry name used in logs and diagnostics.
pub const COMPONENT_MANAGER: &str = "ComponentManager";

fn as_component<C: Component>(component: &mut C) -> &mut (dyn Component + 'static) {
    component
}

/// Owns every component of the world.
///
/// Entities are not stored here: a component only records its owner's id,
/// and the [`EntityDirectory`] passed to [`destroy`](Self::destroy) is told
/// when that reference must go.
///
/// # Example
///
/// ```rust,ignore
/// let mut components = ComponentManager::new();
/// components.start(&mut SystemAllocator, 1 << 20)?;
///
/// let health = components.create(Health { owner: player, points: 100 })?;
/// assert_eq!(components.owner(health), Some(player));
///
/// components.destroy(health, &mut entities);
/// ```
#[derive(Debug)]
pub struct ComponentManager {
    registry: ObjectRegistry<dyn Component>,
}

impl ComponentManager {
    /// Creates a stopped manager with its own diagnostics sink.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ObjectRegistry::new(COMPONENT_MANAGER),
        }
    }

    /// Creates a stopped manager reporting faults into `diagnostics`.
    #[must_use]
    pub fn with_diagnostics(diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            registry: ObjectRegistry::with_diagnostics(COMPONENT_MANAGER, diagnostics),
        }
    }

    /// Carves the component pool from `parent`.
    ///
    /// # Errors
    ///
    /// See [`ObjectRegistry::start`].
    pub fn start(&mut self, parent: &mut dyn ParentAllocator, pool_size: usize) -> RegistryResult<()> {
        self.registry.start(parent, pool_size)
    }

    /// Carves the component pool described by `config`.
    ///
    /// # Errors
    ///
    /// See [`ObjectRegistry::start`].
    pub fn start_with_config(
        &mut self,
        parent: &mut dyn ParentAllocator,
        config: &RegistryConfig,
    ) -> RegistryResult<()> {
        self.registry.start_with_config(parent, config)
    }

    /// Destroys every component and releases the pool.
    ///
    /// Entity directories are not notified: at shutdown both sides go away.
    pub fn stop(&mut self) -> usize {
        self.registry.stop()
    }

    /// Constructs `component` in the pool.
    ///
    /// The owner's component list is the caller's to update; the manager
    /// only reads the owner back at destroy time.
    ///
    /// # Errors
    ///
    /// See [`ObjectRegistry::create_with`]; out of memory is always surfaced.
    pub fn create<C: Component>(&mut self, component: C) -> RegistryResult<Handle> {
        self.registry.create_with(component, as_component::<C>)
    }

    /// Syntactic check: `false` only for the null handle.
    #[inline]
    #[must_use]
    pub const fn is_valid(&self, handle: Handle) -> bool {
        self.registry.is_valid(handle)
    }

    /// The component behind `handle`, or `None` (counted) for a bad handle.
    #[must_use]
    pub fn get(&self, handle: Handle) -> Option<&(dyn Component + 'static)> {
        self.registry.get(handle)
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut (dyn Component + 'static)> {
        self.registry.get_mut(handle)
    }

    /// The component behind `handle` as a `C`.
    ///
    /// A live component of another type yields `None` without a fault.
    #[must_use]
    pub fn get_as<C: Component>(&self, handle: Handle) -> Option<&C> {
        self.get(handle)?.downcast_ref::<C>()
    }

    /// Mutable variant of [`get_as`](Self::get_as).
    pub fn get_as_mut<C: Component>(&mut self, handle: Handle) -> Option<&mut C> {
        self.get_mut(handle)?.downcast_mut::<C>()
    }

    /// Owner recorded by the component, or `None` (counted) for a bad handle.
    #[must_use]
    pub fn owner(&self, handle: Handle) -> Option<EntityId> {
        self.registry
            .lookup_for(handle, Operation::Owner)
            .ok()
            .map(|component| component.owner())
    }

    /// Whether `handle` maps to a live component. Never counts a fault.
    #[inline]
    #[must_use]
    pub fn has_component(&self, handle: Handle) -> bool {
        self.registry.contains(handle)
    }

    /// Whether `handle` maps to a live component attached to some entity.
    /// Never counts a fault.
    #[must_use]
    pub fn has_owner(&self, handle: Handle) -> bool {
        self.registry.contains(handle) && self.owner(handle).is_some_and(|owner| !owner.is_null())
    }

    /// Destroys the component and detaches it from its owner.
    ///
    /// The owner id is copied out before the destructor runs; the directory is
    /// consulted only after the memory is back in the pool and the handle is
    /// gone from the registry. Returns `None` (counted) for a bad handle.
    pub fn destroy(&mut self, handle: Handle, directory: &mut dyn EntityDirectory) -> Option<Detachment> {
        let owner = self.registry.retire(handle, |component| component.owner())?;
        Some(detach_from_owner(directory, owner, handle))
    }

    /// Handle faults since the last `start`.
    #[inline]
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.registry.error_count()
    }

    /// Number of live components.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// `true` when no component is live.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Whether the pool is carved.
    #[inline]
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.registry.is_started()
    }

    /// Pool occupancy, or `None` when stopped.
    #[must_use]
    pub fn arena_stats(&self) -> Option<ArenaStats> {
        self.registry.arena_stats()
    }

    /// The underlying registry, for iteration and diagnostics.
    #[must_use]
    pub const fn registry(&self) -> &ObjectRegistry<dyn Component> {
        &self.registry
    }
}

impl Default for ComponentManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::SystemAllocator;
    use crate::registry::HandleFault;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::rc::Rc;

    struct Health {
        owner: EntityId,
        points: u32,
    }

    impl Component for Health {
        fn owner(&self) -> EntityId {
            self.owner
        }
    }

    struct Velocity {
        owner: EntityId,
        value: [f32; 3],
    }

    impl Component for Velocity {
        fn owner(&self) -> EntityId {
            self.owner
        }
    }

    /// Directory stub recording every call it receives.
    #[derive(Default)]
    struct StubDirectory {
        live: Vec<EntityId>,
        components: HashMap<EntityId, Vec<Handle>>,
        removals: Vec<(EntityId, Handle)>,
    }

    impl StubDirectory {
        fn with_live(owner: EntityId) -> Self {
            Self {
                live: vec![owner],
                ..Self::default()
            }
        }
    }

    impl EntityDirectory for StubDirectory {
        fn exists(&self, owner: EntityId) -> bool {
            self.live.contains(&owner)
        }

        fn remove_component_reference(&mut self, owner: EntityId, component: Handle) {
            self.removals.push((owner, component));
            if let Some(list) = self.components.get_mut(&owner) {
                list.retain(|h| *h != component);
            }
        }
    }

    fn started() -> ComponentManager {
        let mut manager = ComponentManager::new();
        manager.start(&mut SystemAllocator, 4096).unwrap();
        manager
    }

    #[test]
    fn test_owner_round_trip() {
        let mut manager = started();
        let owner = EntityId::new(7);
        let handle = manager.create(Health { owner, points: 10 }).unwrap();

        assert_eq!(manager.owner(handle), Some(owner));
        assert!(manager.has_component(handle));
        assert!(manager.has_owner(handle));
        assert_eq!(manager.error_count(), 0);
    }

    #[test]
    fn test_destroy_detaches_live_owner_once() {
        let mut manager = started();
        let owner = EntityId::new(7);
        let handle = manager.create(Health { owner, points: 10 }).unwrap();
        let other = manager.create(Health { owner, points: 5 }).unwrap();

        let mut directory = StubDirectory::with_live(owner);
        directory.components.insert(owner, vec![handle, other]);

        assert_eq!(
            manager.destroy(handle, &mut directory),
            Some(Detachment::Detached(owner))
        );
        assert_eq!(directory.removals, vec![(owner, handle)]);
        assert_eq!(directory.components[&owner], vec![other]);
        assert!(!manager.has_component(handle));
    }

    type Journal = Rc<RefCell<Vec<&'static str>>>;

    /// Component that journals its own destruction and tracks how many
    /// instances are alive.
    struct Tracked {
        owner: EntityId,
        journal: Journal,
        alive: Rc<Cell<usize>>,
    }

    impl Tracked {
        fn new(owner: EntityId, journal: &Journal, alive: &Rc<Cell<usize>>) -> Self {
            alive.set(alive.get() + 1);
            Self {
                owner,
                journal: Rc::clone(journal),
                alive: Rc::clone(alive),
            }
        }
    }

    impl Component for Tracked {
        fn owner(&self) -> EntityId {
            self.owner
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.alive.set(self.alive.get() - 1);
            self.journal.borrow_mut().push("dropped");
        }
    }

    /// Directory that journals its calls and snapshots the live instance
    /// count at the moment it is asked to detach.
    struct JournalingDirectory {
        journal: Journal,
        alive: Rc<Cell<usize>>,
        alive_at_detach: Option<usize>,
    }

    impl EntityDirectory for JournalingDirectory {
        fn exists(&self, _owner: EntityId) -> bool {
            self.journal.borrow_mut().push("exists");
            true
        }

        fn remove_component_reference(&mut self, _owner: EntityId, _component: Handle) {
            self.journal.borrow_mut().push("detached");
            self.alive_at_detach = Some(self.alive.get());
        }
    }

    #[test]
    fn test_destroy_drops_and_frees_before_detaching() {
        let mut manager = started();
        let owner = EntityId::new(3);
        let journal = Journal::default();
        let alive = Rc::new(Cell::new(0));

        let doomed = manager.create(Tracked::new(owner, &journal, &alive)).unwrap();
        let kept = manager.create(Tracked::new(owner, &journal, &alive)).unwrap();
        assert_eq!(alive.get(), 2);
        assert_eq!(manager.arena_stats().unwrap().allocation_count, 2);

        let mut directory = JournalingDirectory {
            journal: Rc::clone(&journal),
            alive: Rc::clone(&alive),
            alive_at_detach: None,
        };
        assert_eq!(
            manager.destroy(doomed, &mut directory),
            Some(Detachment::Detached(owner))
        );

        // The destructor ran before the directory heard anything.
        assert_eq!(*journal.borrow(), vec!["dropped", "exists", "detached"]);
        assert_eq!(directory.alive_at_detach, Some(1));
        assert_eq!(manager.arena_stats().unwrap().allocation_count, 1);
        assert!(!manager.has_component(doomed));
        assert!(manager.has_component(kept));
        assert_eq!(manager.error_count(), 0);
    }

    #[test]
    fn test_destroy_skips_missing_owner() {
        let mut manager = started();
        let owner = EntityId::new(7);
        let handle = manager.create(Health { owner, points: 10 }).unwrap();

        let mut directory = StubDirectory::default();
        assert_eq!(
            manager.destroy(handle, &mut directory),
            Some(Detachment::OwnerGone(owner))
        );
        assert!(directory.removals.is_empty());
    }

    #[test]
    fn test_destroy_bad_handle_counts_and_skips_directory() {
        let mut manager = started();
        let owner = EntityId::new(1);
        let mut directory = StubDirectory::with_live(owner);

        assert_eq!(manager.destroy(Handle::NULL, &mut directory), None);
        assert_eq!(manager.destroy(Handle::from_raw(42), &mut directory), None);
        assert_eq!(manager.error_count(), 2);
        assert!(directory.removals.is_empty());
    }

    #[test]
    fn test_double_destroy_detaches_once() {
        let mut manager = started();
        let owner = EntityId::new(3);
        let handle = manager.create(Health { owner, points: 1 }).unwrap();
        let mut directory = StubDirectory::with_live(owner);

        manager.destroy(handle, &mut directory);
        manager.destroy(handle, &mut directory);
        assert_eq!(directory.removals.len(), 1);
        assert_eq!(manager.error_count(), 1);
    }

    #[test]
    fn test_typed_access() {
        let mut manager = started();
        let owner = EntityId::new(2);
        let health = manager.create(Health { owner, points: 10 }).unwrap();
        let velocity = manager
            .create(Velocity {
                owner,
                value: [0.0, 1.0, 0.0],
            })
            .unwrap();

        manager.get_as_mut::<Health>(health).unwrap().points += 5;
        assert_eq!(manager.get_as::<Health>(health).unwrap().points, 15);
        assert_eq!(manager.get_as::<Velocity>(velocity).unwrap().value[1], 1.0);

        // Wrong type is not a handle fault.
        assert!(manager.get_as::<Velocity>(health).is_none());
        assert_eq!(manager.error_count(), 0);
    }

    #[test]
    fn test_owner_of_bad_handle_is_counted_fault() {
        let diagnostics = Diagnostics::shared(4);
        let mut manager = ComponentManager::with_diagnostics(Arc::clone(&diagnostics));
        manager.start(&mut SystemAllocator, 1024).unwrap();

        assert_eq!(manager.owner(Handle::from_raw(5)), None);
        assert_eq!(manager.error_count(), 1);

        let event = diagnostics.recent()[0];
        assert_eq!(event.registry, COMPONENT_MANAGER);
        assert_eq!(event.operation, Operation::Owner);
        assert_eq!(event.fault, HandleFault::NotFound(Handle::from_raw(5)));
    }

    #[test]
    fn test_unowned_component() {
        let mut manager = started();
        let handle = manager
            .create(Health {
                owner: EntityId::NULL,
                points: 0,
            })
            .unwrap();
        assert!(!manager.has_owner(handle));
        assert!(!manager.has_owner(Handle::from_raw(99)));
        assert_eq!(manager.error_count(), 0);

        let mut directory = StubDirectory::default();
        assert_eq!(manager.destroy(handle, &mut directory), Some(Detachment::Unowned));
    }

    #[test]
    fn test_stop_clears_components() {
        let mut manager = started();
        let handle = manager
            .create(Health {
                owner: EntityId::new(1),
                points: 0,
            })
            .unwrap();

        assert_eq!(manager.stop(), 1);
        assert!(manager.get(handle).is_none());
        assert_eq!(manager.error_count(), 1);
    }
}

//! # Cross-Reference Resolver
//!
//! Keeps an entity's component list consistent after one of its components
//! is destroyed. Invoked by [`ComponentManager::destroy`](super::ComponentManager::destroy)
//! once the object is gone, with identifiers copied out beforehand.

use super::directory::EntityDirectory;
use super::entity::EntityId;
use crate::registry::Handle;

/// What happened to the owner's back-reference after a destroy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detachment {
    /// The owner was live and has been told to drop the reference.
    Detached(EntityId),
    /// The owner no longer exists; nothing to update.
    OwnerGone(EntityId),
    /// The component was not attached to any entity.
    Unowned,
}

impl Detachment {
    /// `true` when the directory was asked to remove a reference.
    #[must_use]
    pub const fn is_detached(self) -> bool {
        matches!(self, Self::Detached(_))
    }
}

/// Tells `directory` that `owner` no longer has the component `handle`.
///
/// The directory is asked for liveness first and only a live owner receives
/// `remove_component_reference`, exactly once.
pub fn detach_from_owner(
    directory: &mut dyn EntityDirectory,
    owner: EntityId,
    handle: Handle,
) -> Detachment {
    if owner.is_null() {
        return Detachment::Unowned;
    }
    if !directory.exists(owner) {
        tracing::debug!(%owner, handle = handle.raw(), "owner already gone, nothing to detach");
        return Detachment::OwnerGone(owner);
    }

    directory.remove_component_reference(owner, handle);
    tracing::trace!(%owner, handle = handle.raw(), "detached component from owner");
    Detachment::Detached(owner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    #[derive(Default)]
    struct Directory {
        lists: HashMap<EntityId, HashSet<Handle>>,
    }

    impl EntityDirectory for Directory {
        fn exists(&self, owner: EntityId) -> bool {
            self.lists.contains_key(&owner)
        }

        fn remove_component_reference(&mut self, owner: EntityId, component: Handle) {
            if let Some(list) = self.lists.get_mut(&owner) {
                list.remove(&component);
            }
        }
    }

    #[test]
    fn test_live_owner_is_detached() {
        let owner = EntityId::new(1);
        let handle = Handle::from_raw(3);
        let mut directory = Directory::default();
        directory.lists.insert(owner, HashSet::from([handle, Handle::from_raw(4)]));

        assert_eq!(
            detach_from_owner(&mut directory, owner, handle),
            Detachment::Detached(owner)
        );
        assert_eq!(directory.lists[&owner], HashSet::from([Handle::from_raw(4)]));
    }

    #[test]
    fn test_missing_owner_untouched() {
        let mut directory = Directory::default();
        let outcome = detach_from_owner(&mut directory, EntityId::new(9), Handle::from_raw(1));
        assert_eq!(outcome, Detachment::OwnerGone(EntityId::new(9)));
        assert!(!outcome.is_detached());
    }

    #[test]
    fn test_null_owner_is_unowned() {
        let mut directory = Directory::default();
        assert_eq!(
            detach_from_owner(&mut directory, EntityId::NULL, Handle::from_raw(1)),
            Detachment::Unowned
        );
    }
}

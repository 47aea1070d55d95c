//! # Entity Directory Boundary
//!
//! The component manager and the entity directory own disjoint collections
//! that reference each other only by id. This trait is everything the
//! manager needs from the other side.

use super::entity::EntityId;
use crate::registry::Handle;

/// External collection of entities and the component handles they list.
pub trait EntityDirectory {
    /// Whether `owner` is currently a live entity.
    fn exists(&self, owner: EntityId) -> bool;

    /// Removes `component` from the component list of `owner`.
    ///
    /// `component` identifies an object that has already been destroyed; it
    /// must only be compared, never resolved.
    fn remove_component_reference(&mut self, owner: EntityId, component: Handle);
}

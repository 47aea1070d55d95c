//! # Component Trait
//!
//! Components are arbitrary gameplay objects owned by the component manager
//! and attached, by id, to one entity. Unlike plain data stores they may hold
//! heap state and run destructors; the manager drops them in place.

use std::any::Any;

use super::entity::EntityId;

/// Upcast to [`Any`], so components stored as `dyn Component` can be
/// downcast back to their concrete type.
///
/// Implemented automatically for every `'static` type.
pub trait AsAny: Any {
    /// `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A component attached to an entity.
///
/// # Example
///
/// ```rust,ignore
/// struct Health {
///     owner: EntityId,
///     points: u32,
/// }
///
/// impl Component for Health {
///     fn owner(&self) -> EntityId {
///         self.owner
///     }
/// }
/// ```
pub trait Component: AsAny {
    /// Entity this component is attached to, or [`EntityId::NULL`].
    fn owner(&self) -> EntityId;
}

impl dyn Component {
    /// Downcasts to the concrete component type.
    #[must_use]
    pub fn downcast_ref<C: Component>(&self) -> Option<&C> {
        self.as_any().downcast_ref::<C>()
    }

    /// Mutable variant of [`downcast_ref`](Self::downcast_ref).
    pub fn downcast_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.as_any_mut().downcast_mut::<C>()
    }

    /// Whether the concrete type is `C`.
    #[must_use]
    pub fn is<C: Component>(&self) -> bool {
        self.as_any().is::<C>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Health {
        owner: EntityId,
        points: u32,
    }

    impl Component for Health {
        fn owner(&self) -> EntityId {
            self.owner
        }
    }

    struct Tag;

    impl Component for Tag {
        fn owner(&self) -> EntityId {
            EntityId::NULL
        }
    }

    #[test]
    fn test_downcast() {
        let mut health = Health {
            owner: EntityId::new(2),
            points: 10,
        };
        let component: &mut dyn Component = &mut health;

        assert!(component.is::<Health>());
        assert!(!component.is::<Tag>());
        component.downcast_mut::<Health>().unwrap().points -= 3;
        assert_eq!(component.downcast_ref::<Health>().unwrap().points, 7);
        assert_eq!(component.owner(), EntityId::new(2));
    }
}

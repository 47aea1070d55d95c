//! # Entity Identifiers
//!
//! Components refer back to the entity they are attached to by id only.
//! The component manager never owns or validates entities itself; liveness
//! is answered by an [`EntityDirectory`](super::EntityDirectory).

use std::fmt;

/// Identifier of an entity in the external entity directory.
///
/// `0` is reserved as the null entity ("attached to nothing").
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// The "no owner" id.
    pub const NULL: Self = Self(0);

    /// Wraps a raw entity id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Checks if this is the null entity.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl From<u32> for EntityId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

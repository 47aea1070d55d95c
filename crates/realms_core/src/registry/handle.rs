//! # Handles
//!
//! Opaque identifiers for objects living in a registry. Handles are issued
//! from a counter seeded at 1; `0` is reserved as the null handle.

use std::fmt;

/// Opaque, copyable identity of an object in an [`ObjectRegistry`](super::ObjectRegistry).
///
/// Only equality, ordering and hashing are exposed: handles are names, not
/// numbers to compute with. A handle is never reissued within one
/// `start`/`stop` bracket, even after its object is destroyed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Handle(u64);

impl Handle {
    /// The reserved "no object" handle.
    pub const NULL: Self = Self(0);

    /// Rebuilds a handle from its raw value (e.g. read back from a save or a
    /// network message).
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw value of the handle.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Syntactic validity: `true` for every non-null handle.
    ///
    /// This does NOT mean the handle maps to a live object.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }

    /// `true` for [`Handle::NULL`].
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

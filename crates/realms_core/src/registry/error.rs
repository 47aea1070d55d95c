//! # Registry Error Types
//!
//! Two families, propagated differently:
//! - [`RegistryError`]: hard failures surfaced to the caller (`start`, `create`).
//! - [`HandleFault`]: bad handles, absorbed into the fault counter and logged.

use std::fmt;

use thiserror::Error;

use super::handle::Handle;
use crate::memory::{AllocError, ArenaError};

/// Hard failures of registry lifecycle and creation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The registry has not been started, or has been stopped.
    #[error("registry is not started")]
    NotStarted,

    /// `start` was called twice without an intervening `stop`.
    #[error("registry is already started")]
    AlreadyStarted,

    /// The arena refused the request. Out of memory lands here.
    #[error(transparent)]
    Arena(#[from] ArenaError),

    /// The parent allocator could not supply the pool.
    #[error(transparent)]
    Parent(#[from] AllocError),

    /// Every handle value has been issued in this `start`/`stop` bracket.
    #[error("handle space exhausted")]
    HandlesExhausted,

    /// The upcast passed to `create_with` did not return the object it was given.
    #[error("upcast of {type_name} did not return the constructed object")]
    UpcastMismatch {
        /// Concrete type being created.
        type_name: &'static str,
    },
}

impl RegistryError {
    /// `true` when the arena had no region large enough.
    #[must_use]
    pub const fn is_out_of_memory(&self) -> bool {
        matches!(self, Self::Arena(ArenaError::OutOfMemory { .. }))
    }
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// A handle that could not be resolved.
///
/// Every fault increments the owning registry's error counter exactly once.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleFault {
    /// The null handle.
    #[error("handle {0} is invalid")]
    InvalidHandle(Handle),

    /// A valid handle that maps to no live object: already destroyed, never
    /// issued, or issued before the last `stop`.
    #[error("handle {0} is not taken by a live object")]
    NotFound(Handle),

    /// A caller-chosen key (e.g. a mesh type id) with no object behind it.
    #[error("no object registered under key {key}")]
    UnknownKey {
        /// The key that was looked up.
        key: u64,
    },
}

/// Registry operation during which a fault occurred.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Shared access.
    Get,
    /// Exclusive access.
    GetMut,
    /// Owner lookup.
    Owner,
    /// Destruction.
    Destroy,
}

impl Operation {
    /// Stable lowercase name, used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::GetMut => "get_mut",
            Self::Owner => "owner",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_memory_detection() {
        let oom = RegistryError::from(ArenaError::OutOfMemory {
            requested: 64,
            align: 8,
            largest_free: 16,
        });
        assert!(oom.is_out_of_memory());
        assert!(!RegistryError::NotStarted.is_out_of_memory());
        assert!(oom.to_string().contains("requested 64 bytes"));
    }

    #[test]
    fn test_fault_messages() {
        let fault = HandleFault::NotFound(Handle::from_raw(7));
        assert_eq!(fault.to_string(), "handle #7 is not taken by a live object");
        assert_eq!(Operation::Destroy.to_string(), "destroy");
    }
}

//! # Object Registry
//!
//! Handle-indexed storage over a private free-list arena.
//!
//! ## Design
//! - One arena per registry, carved from a parent allocator at `start`
//! - Objects are constructed in place and addressed only through [`Handle`]s
//! - Bad handles are counted and logged, never fatal
//! - Handles are never reissued between `start` and `stop`

mod diagnostics;
mod error;
mod handle;
mod object;

pub use diagnostics::{DiagnosticEvent, Diagnostics};
pub use error::{HandleFault, Operation, RegistryError, RegistryResult};
pub use handle::Handle;
pub use object::ObjectRegistry;

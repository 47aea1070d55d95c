//! # Realms Core
//!
//! Handle-indexed object storage for a real-time game loop:
//! - Each registry carves one fixed pool at startup and never grows it
//! - Objects are built in place inside a free-list arena
//! - Bad handles are counted and logged instead of stalling the frame
//!
//! ## Architecture Rules
//!
//! 1. **No heap traffic after `start`** - the arena recycles its own regions
//! 2. **Handles, not pointers** - objects are only reachable through a [`Handle`]
//! 3. **Only out-of-memory is fatal** - handle faults yield "no object"
//!
//! ## Example
//!
//! ```rust,ignore
//! use realms_core::{ComponentManager, MemoryConfig, SystemAllocator};
//!
//! let config = MemoryConfig::load("config/memory.toml")?;
//! let mut components = ComponentManager::new();
//! components.start_with_config(&mut SystemAllocator, &config.components)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod memory;
pub mod registry;

pub use config::{ConfigError, MemoryConfig, RegistryConfig};
pub use ecs::{Component, ComponentManager, Detachment, EntityDirectory, EntityId};
pub use memory::{
    AllocError, ArenaError, ArenaStats, BudgetAllocator, FitPolicy, FreeListArena, MemoryBlock,
    ParentAllocator, SystemAllocator,
};
pub use registry::{
    DiagnosticEvent, Diagnostics, Handle, HandleFault, ObjectRegistry, Operation, RegistryError,
    RegistryResult,
};

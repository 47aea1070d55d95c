//! # Components
//!
//! First instantiation of the object registry: components attached by id to
//! entities that live in an external directory.
//!
//! ## Ownership
//! - The manager owns components, the directory owns entities
//! - A component records its owner's id; the directory lists component handles
//! - Destroying a component detaches it from a live owner, never the reverse

mod component;
mod detach;
mod directory;
mod entity;
mod manager;

pub use component::{AsAny, Component};
pub use detach::{detach_from_owner, Detachment};
pub use directory::EntityDirectory;
pub use entity::EntityId;
pub use manager::{ComponentManager, COMPONENT_MANAGER};

//! # Meshes
//!
//! Mesh types registered by id, reachable by alias, loaded in batch stages.

mod error;
mod mesh;
mod naming;
mod register;

pub use error::{MeshError, MeshResult};
pub use mesh::{Mesh, MeshTypeId, Stage, StageError};
pub use naming::{DefaultNaming, MeshNaming, MAX_ALIAS_LEN};
pub use register::{MeshRegister, MESH_REGISTER};

//! # Realms Graphics
//!
//! The mesh register: every mesh type of the game, built in place inside
//! its own arena and looked up by [`MeshTypeId`] or alias.
//!
//! Decoding `.vox` files and talking to the GPU belong to the [`Mesh`]
//! implementations; the register only sequences their stages.
//!
//! ## Example
//!
//! ```rust,ignore
//! use realms_core::{MemoryConfig, SystemAllocator};
//! use realms_graphics::{MeshRegister, MeshTypeId};
//!
//! let config = MemoryConfig::load("config/memory.toml")?;
//! let mut meshes = MeshRegister::new();
//! meshes.start_with_config(&mut SystemAllocator, &config.meshes)?;
//! meshes.register(MeshTypeId::new(1), VoxMesh::new("assets/models/oak.vox"))?;
//! meshes.imports()?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod mesh;

pub use mesh::{
    DefaultNaming, Mesh, MeshError, MeshNaming, MeshRegister, MeshResult, MeshTypeId, Stage,
    StageError,
};

//! # Mesh Register Errors

use realms_core::RegistryError;
use thiserror::Error;

use super::mesh::{MeshTypeId, Stage, StageError};

/// Errors raised by the [`MeshRegister`](super::MeshRegister).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    /// The mesh's source path is empty or does not name a mesh file.
    #[error("invalid mesh path {path:?}: {reason}")]
    InvalidPath {
        /// Offending path.
        path: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// An explicit alias sanitized down to nothing.
    #[error("alias {0:?} has no usable characters")]
    InvalidAlias(String),

    /// A mesh is already registered under this type id.
    #[error("mesh type id {0} is already registered")]
    TypeIdTaken(MeshTypeId),

    /// The alias already resolves to a mesh type.
    #[error("alias {alias} for mesh type id {requested} is already taken by mesh type id {taken_by}")]
    AliasTaken {
        /// Sanitized alias.
        alias: String,
        /// Type id that asked for the alias.
        requested: MeshTypeId,
        /// Type id that owns it.
        taken_by: MeshTypeId,
    },

    /// No mesh type is registered under the alias.
    #[error("no mesh registered under alias {0:?}")]
    AliasNotFound(String),

    /// No mesh is registered under the type id.
    #[error("no mesh registered under type id {0}")]
    UnknownTypeId(MeshTypeId),

    /// A batch stage failed on one mesh; later meshes were not visited.
    #[error("{stage} failed for mesh type id {type_id}: {source}")]
    Stage {
        /// Mesh that failed.
        type_id: MeshTypeId,
        /// Stage being run.
        stage: Stage,
        /// What the mesh reported.
        source: StageError,
    },

    /// The underlying registry refused (out of memory, not started, ...).
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Result type for mesh register operations.
pub type MeshResult<T> = Result<T, MeshError>;

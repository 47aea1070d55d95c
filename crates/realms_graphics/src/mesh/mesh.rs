//! # Mesh Trait
//!
//! A mesh is registered once per mesh type and walks four stages, each run
//! in batch over the whole register:
//!
//! ```text
//! import -> optimise -> load -> ... -> unload
//! (file)    (greedy)    (GPU)         (GPU release)
//! ```

use std::fmt;

use realms_core::ecs::AsAny;
use thiserror::Error;

/// Caller-chosen identifier of a mesh type (block kind, prop kind, ...).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct MeshTypeId(u16);

impl MeshTypeId {
    /// Wraps a raw mesh type id.
    #[inline]
    #[must_use]
    pub const fn new(raw: u16) -> Self {
        Self(raw)
    }

    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }
}

impl From<u16> for MeshTypeId {
    fn from(raw: u16) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MeshTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle stage of a mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Read and decode the source file.
    Import,
    /// Reduce the decoded geometry.
    Optimise,
    /// Upload to the GPU.
    Load,
    /// Release GPU resources.
    Unload,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Import => "import",
            Self::Optimise => "optimise",
            Self::Load => "load",
            Self::Unload => "unload",
        })
    }
}

/// Failure reported by a mesh stage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct StageError {
    message: String,
}

impl StageError {
    /// Creates a stage error with a human readable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A mesh stored in the [`MeshRegister`](super::MeshRegister).
pub trait Mesh: AsAny {
    /// Path of the file the mesh is imported from.
    fn source(&self) -> &str;

    /// Reads and decodes [`source`](Self::source).
    ///
    /// # Errors
    ///
    /// When the file is missing or malformed.
    fn import(&mut self) -> Result<(), StageError>;

    /// Optimises the imported geometry.
    ///
    /// # Errors
    ///
    /// Implementation specific.
    fn optimise(&mut self) -> Result<(), StageError>;

    /// Uploads the optimised geometry.
    ///
    /// # Errors
    ///
    /// Implementation specific.
    fn load(&mut self) -> Result<(), StageError>;

    /// Releases what [`load`](Self::load) acquired.
    ///
    /// # Errors
    ///
    /// Implementation specific.
    fn unload(&mut self) -> Result<(), StageError>;
}

impl dyn Mesh {
    /// Downcasts to the concrete mesh type.
    #[must_use]
    pub fn downcast_ref<M: Mesh>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    /// Mutable variant of [`downcast_ref`](Self::downcast_ref).
    pub fn downcast_mut<M: Mesh>(&mut self) -> Option<&mut M> {
        self.as_any_mut().downcast_mut::<M>()
    }

    /// Runs `stage` on this mesh.
    ///
    /// # Errors
    ///
    /// Whatever the stage reports.
    pub fn run(&mut self, stage: Stage) -> Result<(), StageError> {
        match stage {
            Stage::Import => self.import(),
            Stage::Optimise => self.optimise(),
            Stage::Load => self.load(),
            Stage::Unload => self.unload(),
        }
    }
}

//! # Mesh Register
//!
//! Second instantiation of the object registry. Meshes are owned by an
//! [`ObjectRegistry`] of `dyn Mesh`; on top of it sit two dictionaries:
//!
//! ```text
//! alias ("oak_tree") ──> MeshTypeId ──> Handle ──> dyn Mesh (in arena)
//! ```
//!
//! Several aliases may resolve to one type id; a type id holds one mesh.

use std::collections::BTreeMap;
use std::sync::Arc;

use realms_core::{
    ArenaStats, Diagnostics, Handle, HandleFault, ObjectRegistry, Operation, ParentAllocator,
    RegistryConfig, RegistryResult,
};

use super::error::{MeshError, MeshResult};
use super::mesh::{Mesh, MeshTypeId, Stage};
use super::naming::{DefaultNaming, MeshNaming};

/// Registry name used in logs and diagnostics.
pub const MESH_REGISTER: &str = "MeshRegister";

fn as_mesh<M: Mesh>(mesh: &mut M) -> &mut (dyn Mesh + 'static) {
    mesh
}

/// Owns every mesh type of the game.
///
/// # Example
///
/// ```rust,ignore
/// let mut meshes = MeshRegister::new();
/// meshes.start(&mut SystemAllocator, 4 << 20)?;
///
/// meshes.register(MeshTypeId::new(1), VoxMesh::new("assets/models/Oak Tree.vox"))?;
/// meshes.register_alias(MeshTypeId::new(1), "tree")?;
///
/// meshes.imports()?;
/// meshes.optimises()?;
/// meshes.loads()?;
///
/// let tree = meshes.get_by_alias("oak_tree")?;
/// ```
#[derive(Debug)]
pub struct MeshRegister<N: MeshNaming = DefaultNaming> {
    registry: ObjectRegistry<dyn Mesh>,
    types: BTreeMap<MeshTypeId, Handle>,
    aliases: BTreeMap<String, MeshTypeId>,
    naming: N,
}

impl MeshRegister {
    /// Creates a stopped register using [`DefaultNaming`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_naming(DefaultNaming)
    }
}

impl Default for MeshRegister {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: MeshNaming> MeshRegister<N> {
    /// Creates a stopped register deriving aliases with `naming`.
    #[must_use]
    pub fn with_naming(naming: N) -> Self {
        Self::with_parts(naming, Arc::new(Diagnostics::default()))
    }

    /// Creates a stopped register reporting faults into `diagnostics`.
    #[must_use]
    pub fn with_parts(naming: N, diagnostics: Arc<Diagnostics>) -> Self {
        Self {
            registry: ObjectRegistry::with_diagnostics(MESH_REGISTER, diagnostics),
            types: BTreeMap::new(),
            aliases: BTreeMap::new(),
            naming,
        }
    }

    /// Carves the mesh pool from `parent`.
    ///
    /// # Errors
    ///
    /// See [`ObjectRegistry::start`].
    pub fn start(&mut self, parent: &mut dyn ParentAllocator, pool_size: usize) -> RegistryResult<()> {
        self.registry.start(parent, pool_size)
    }

    /// Carves the mesh pool described by `config`.
    ///
    /// # Errors
    ///
    /// See [`ObjectRegistry::start`].
    pub fn start_with_config(
        &mut self,
        parent: &mut dyn ParentAllocator,
        config: &RegistryConfig,
    ) -> RegistryResult<()> {
        self.registry.start_with_config(parent, config)
    }

    /// Destroys every mesh, forgets every alias and releases the pool.
    pub fn stop(&mut self) -> usize {
        self.types.clear();
        self.aliases.clear();
        self.registry.stop()
    }

    /// Destroys every mesh and forgets every alias, keeping the pool.
    pub fn free(&mut self) -> usize {
        let freed = self.types.len();
        for handle in std::mem::take(&mut self.types).into_values() {
            self.registry.destroy(handle);
        }
        self.aliases.clear();
        tracing::info!(registry = MESH_REGISTER, freed, "meshes freed");
        freed
    }

    /// Registers `mesh` under `type_id`, aliased by its source file name.
    ///
    /// # Errors
    ///
    /// - [`MeshError::InvalidPath`] when no alias can be derived from the path
    /// - [`MeshError::TypeIdTaken`] / [`MeshError::AliasTaken`] on collisions
    /// - [`MeshError::Registry`] when the pool is full or not started
    ///
    /// Nothing is allocated unless registration succeeds.
    pub fn register<M: Mesh>(&mut self, type_id: MeshTypeId, mesh: M) -> MeshResult<Handle> {
        let path = mesh.source();
        if path.is_empty() {
            return Err(invalid_path(path, "empty path"));
        }
        let alias = self
            .naming
            .alias_from_path(path)
            .filter(|alias| !alias.is_empty())
            .ok_or_else(|| invalid_path(path, "no alias can be derived"))?;

        self.insert(type_id, mesh, alias)
    }

    /// Registers `mesh` under `type_id` with an explicit alias.
    ///
    /// # Errors
    ///
    /// As for [`register`](Self::register), plus [`MeshError::InvalidAlias`].
    pub fn register_with_alias<M: Mesh>(
        &mut self,
        type_id: MeshTypeId,
        mesh: M,
        alias: &str,
    ) -> MeshResult<Handle> {
        if mesh.source().is_empty() {
            return Err(invalid_path(mesh.source(), "empty path"));
        }
        let sanitized = self.naming.sanitize(alias);
        if sanitized.is_empty() {
            return Err(MeshError::InvalidAlias(alias.to_string()));
        }

        self.insert(type_id, mesh, sanitized)
    }

    /// Adds another alias for an already registered type id.
    ///
    /// # Errors
    ///
    /// [`MeshError::UnknownTypeId`], [`MeshError::InvalidAlias`] or
    /// [`MeshError::AliasTaken`].
    pub fn register_alias(&mut self, type_id: MeshTypeId, name: &str) -> MeshResult<()> {
        if !self.types.contains_key(&type_id) {
            return Err(MeshError::UnknownTypeId(type_id));
        }
        let alias = self.naming.sanitize(name);
        if alias.is_empty() {
            return Err(MeshError::InvalidAlias(name.to_string()));
        }
        self.check_alias(&alias, type_id)?;

        tracing::debug!(registry = MESH_REGISTER, %type_id, %alias, "alias registered");
        self.aliases.insert(alias, type_id);
        Ok(())
    }

    /// Adds an alias for `type_id`, stepping through
    /// [`MeshNaming::increment_alias`] until a free one is found.
    ///
    /// Returns the alias actually stored. An alias that already resolves to
    /// `type_id` is returned as is.
    ///
    /// # Errors
    ///
    /// [`MeshError::UnknownTypeId`], [`MeshError::InvalidAlias`], or
    /// [`MeshError::AliasTaken`] for the last candidate once the suffix
    /// counter cannot grow.
    pub fn register_next_alias(&mut self, type_id: MeshTypeId, name: &str) -> MeshResult<String> {
        if !self.types.contains_key(&type_id) {
            return Err(MeshError::UnknownTypeId(type_id));
        }
        let mut alias = self.naming.sanitize(name);
        if alias.is_empty() {
            return Err(MeshError::InvalidAlias(name.to_string()));
        }

        loop {
            match self.aliases.get(&alias) {
                None => break,
                Some(&taken_by) if taken_by == type_id => return Ok(alias),
                Some(_) => match self.naming.increment_alias(&alias) {
                    Some(next) => alias = next,
                    None => {
                        self.check_alias(&alias, type_id)?;
                        break;
                    }
                },
            }
        }

        tracing::debug!(registry = MESH_REGISTER, %type_id, %alias, "alias registered");
        self.aliases.insert(alias.clone(), type_id);
        Ok(alias)
    }

    /// Imports every mesh, in type id order.
    ///
    /// # Errors
    ///
    /// [`MeshError::Stage`] for the first mesh that fails; later meshes are
    /// not visited.
    pub fn imports(&mut self) -> MeshResult<()> {
        self.run_stage(Stage::Import)
    }

    /// Optimises every mesh, in type id order.
    ///
    /// # Errors
    ///
    /// As for [`imports`](Self::imports).
    pub fn optimises(&mut self) -> MeshResult<()> {
        self.run_stage(Stage::Optimise)
    }

    /// Loads every mesh, in type id order.
    ///
    /// # Errors
    ///
    /// As for [`imports`](Self::imports).
    pub fn loads(&mut self) -> MeshResult<()> {
        self.run_stage(Stage::Load)
    }

    /// Unloads every mesh, in type id order.
    ///
    /// # Errors
    ///
    /// As for [`imports`](Self::imports).
    pub fn unloads(&mut self) -> MeshResult<()> {
        self.run_stage(Stage::Unload)
    }

    /// The mesh registered under `type_id`.
    ///
    /// An unknown id yields `None` and is counted as a fault.
    #[must_use]
    pub fn get(&self, type_id: MeshTypeId) -> Option<&(dyn Mesh + 'static)> {
        let handle = self.handle_for(type_id, Operation::Get)?;
        self.registry.get(handle)
    }

    /// Mutable variant of [`get`](Self::get).
    pub fn get_mut(&mut self, type_id: MeshTypeId) -> Option<&mut (dyn Mesh + 'static)> {
        let handle = self.handle_for(type_id, Operation::GetMut)?;
        self.registry.get_mut(handle)
    }

    /// The mesh an alias resolves to. `alias` is sanitized before lookup.
    ///
    /// # Errors
    ///
    /// [`MeshError::AliasNotFound`].
    pub fn get_by_alias(&self, alias: &str) -> MeshResult<&(dyn Mesh + 'static)> {
        let type_id = self
            .type_id_of(alias)
            .ok_or_else(|| MeshError::AliasNotFound(alias.to_string()))?;
        self.get(type_id).ok_or(MeshError::UnknownTypeId(type_id))
    }

    /// Type id an alias resolves to. `alias` is sanitized before lookup.
    #[must_use]
    pub fn type_id_of(&self, alias: &str) -> Option<MeshTypeId> {
        self.aliases.get(&self.naming.sanitize(alias)).copied()
    }

    /// Every alias of `type_id`, sorted.
    #[must_use]
    pub fn aliases_of(&self, type_id: MeshTypeId) -> Vec<&str> {
        self.aliases
            .iter()
            .filter(|(_, id)| **id == type_id)
            .map(|(alias, _)| alias.as_str())
            .collect()
    }

    /// Whether a mesh is registered under `type_id`. Never counts a fault.
    #[must_use]
    pub fn contains(&self, type_id: MeshTypeId) -> bool {
        self.types.contains_key(&type_id)
    }

    /// Registered type ids, ascending.
    pub fn type_ids(&self) -> impl Iterator<Item = MeshTypeId> + '_ {
        self.types.keys().copied()
    }

    /// Number of registered meshes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// `true` when no mesh is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Whether the pool is carved.
    #[must_use]
    pub const fn is_started(&self) -> bool {
        self.registry.is_started()
    }

    /// Handle and key faults since the last `start`.
    #[must_use]
    pub fn error_count(&self) -> u64 {
        self.registry.error_count()
    }

    /// Pool occupancy, or `None` when stopped.
    #[must_use]
    pub fn arena_stats(&self) -> Option<ArenaStats> {
        self.registry.arena_stats()
    }

    fn insert<M: Mesh>(&mut self, type_id: MeshTypeId, mesh: M, alias: String) -> MeshResult<Handle> {
        if self.types.contains_key(&type_id) {
            tracing::warn!(registry = MESH_REGISTER, %type_id, "mesh type id already registered");
            return Err(MeshError::TypeIdTaken(type_id));
        }
        self.check_alias(&alias, type_id)?;

        tracing::info!(
            registry = MESH_REGISTER,
            %type_id,
            %alias,
            source = mesh.source(),
            "registering mesh"
        );
        let handle = self.registry.create_with(mesh, as_mesh::<M>)?;
        self.types.insert(type_id, handle);
        self.aliases.insert(alias, type_id);
        Ok(handle)
    }

    fn check_alias(&self, alias: &str, requested: MeshTypeId) -> MeshResult<()> {
        match self.aliases.get(alias) {
            Some(&taken_by) => {
                tracing::warn!(
                    registry = MESH_REGISTER,
                    alias,
                    %requested,
                    %taken_by,
                    "alias already taken"
                );
                Err(MeshError::AliasTaken {
                    alias: alias.to_string(),
                    requested,
                    taken_by,
                })
            }
            None => Ok(()),
        }
    }

    fn handle_for(&self, type_id: MeshTypeId, operation: Operation) -> Option<Handle> {
        let handle = self.types.get(&type_id).copied();
        if handle.is_none() {
            self.registry.record_fault(
                operation,
                HandleFault::UnknownKey {
                    key: u64::from(type_id.raw()),
                },
            );
        }
        handle
    }

    fn run_stage(&mut self, stage: Stage) -> MeshResult<()> {
        tracing::debug!(registry = MESH_REGISTER, %stage, meshes = self.types.len(), "running stage");

        for (&type_id, &handle) in &self.types {
            let Some(mesh) = self.registry.get_mut(handle) else {
                continue;
            };
            mesh.run(stage).map_err(|source| {
                tracing::error!(registry = MESH_REGISTER, %type_id, %stage, %source, "mesh stage failed");
                MeshError::Stage {
                    type_id,
                    stage,
                    source,
                }
            })?;
        }
        Ok(())
    }
}

fn invalid_path(path: &str, reason: &'static str) -> MeshError {
    tracing::error!(registry = MESH_REGISTER, path, reason, "invalid mesh path");
    MeshError::InvalidPath {
        path: path.to_string(),
        reason,
    }
}

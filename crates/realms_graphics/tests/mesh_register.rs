//! Integration test for the mesh register driving real files through its stages.

use std::path::{Path, PathBuf};

use realms_core::{ComponentManager, Diagnostics, HandleFault, MemoryConfig, SystemAllocator};
use realms_graphics::{DefaultNaming, Mesh, MeshError, MeshRegister, MeshTypeId, Stage, StageError};

const VOX_MAGIC: &[u8; 4] = b"VOX ";

/// Minimal `.vox` mesh: checks the magic number and counts voxel bytes.
struct VoxMesh {
    path: String,
    bytes: Vec<u8>,
    optimised: bool,
    resident: bool,
}

impl VoxMesh {
    fn new(path: &Path) -> Self {
        Self {
            path: path.display().to_string(),
            bytes: Vec::new(),
            optimised: false,
            resident: false,
        }
    }
}

impl Mesh for VoxMesh {
    fn source(&self) -> &str {
        &self.path
    }

    fn import(&mut self) -> Result<(), StageError> {
        let bytes = std::fs::read(&self.path).map_err(|e| StageError::new(e.to_string()))?;
        if !bytes.starts_with(VOX_MAGIC) {
            return Err(StageError::new("missing VOX magic"));
        }
        self.bytes = bytes;
        Ok(())
    }

    fn optimise(&mut self) -> Result<(), StageError> {
        self.bytes.truncate(VOX_MAGIC.len() + 4);
        self.optimised = true;
        Ok(())
    }

    fn load(&mut self) -> Result<(), StageError> {
        if !self.optimised {
            return Err(StageError::new("load before optimise"));
        }
        self.resident = true;
        Ok(())
    }

    fn unload(&mut self) -> Result<(), StageError> {
        self.resident = false;
        Ok(())
    }
}

fn asset_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("realms_meshes_{}_{name}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

fn write_vox(dir: &Path, file: &str, valid: bool) -> PathBuf {
    let path = dir.join(file);
    let mut bytes = if valid { VOX_MAGIC.to_vec() } else { b"RIFF".to_vec() };
    bytes.extend_from_slice(&150u32.to_le_bytes());
    bytes.extend_from_slice(&[0; 32]);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_full_pipeline() {
    let dir = asset_dir("pipeline");
    let oak = write_vox(&dir, "Oak Tree.vox", true);
    let rock = write_vox(&dir, "rock.vox", true);

    let config = MemoryConfig::default();
    let mut meshes = MeshRegister::new();
    meshes
        .start_with_config(&mut SystemAllocator, &config.meshes)
        .unwrap();

    meshes.register(MeshTypeId::new(1), VoxMesh::new(&oak)).unwrap();
    meshes.register(MeshTypeId::new(2), VoxMesh::new(&rock)).unwrap();
    meshes.register_alias(MeshTypeId::new(2), "Boulder").unwrap();

    meshes.imports().unwrap();
    meshes.optimises().unwrap();
    meshes.loads().unwrap();

    let boulder = meshes
        .get_by_alias("boulder")
        .unwrap()
        .downcast_ref::<VoxMesh>()
        .unwrap();
    assert!(boulder.resident);
    assert_eq!(boulder.bytes.len(), 8);
    assert_eq!(meshes.type_id_of("oak_tree"), Some(MeshTypeId::new(1)));

    meshes.unloads().unwrap();
    assert!(!meshes
        .get(MeshTypeId::new(1))
        .unwrap()
        .downcast_ref::<VoxMesh>()
        .unwrap()
        .resident);

    assert_eq!(meshes.stop(), 2);
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_bad_file_reports_stage_and_type_id() {
    let dir = asset_dir("bad");
    let good = write_vox(&dir, "good.vox", true);
    let bad = write_vox(&dir, "bad.vox", false);

    let mut meshes = MeshRegister::new();
    meshes.start(&mut SystemAllocator, 64 * 1024).unwrap();
    meshes.register(MeshTypeId::new(1), VoxMesh::new(&good)).unwrap();
    meshes.register(MeshTypeId::new(5), VoxMesh::new(&bad)).unwrap();

    let err = meshes.imports().unwrap_err();
    assert_eq!(
        err,
        MeshError::Stage {
            type_id: MeshTypeId::new(5),
            stage: Stage::Import,
            source: StageError::new("missing VOX magic"),
        }
    );
    assert!(err.to_string().contains("import failed for mesh type id 5"));
    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_registries_share_one_diagnostics_sink() {
    let diagnostics = Diagnostics::shared(16);

    let mut components = ComponentManager::with_diagnostics(diagnostics.clone());
    components.start(&mut SystemAllocator, 1024).unwrap();
    let mut meshes = MeshRegister::with_parts(DefaultNaming, diagnostics.clone());
    meshes.start(&mut SystemAllocator, 1024).unwrap();

    assert!(components.get(realms_core::Handle::from_raw(3)).is_none());
    assert!(meshes.get(MeshTypeId::new(40)).is_none());

    assert_eq!(diagnostics.total(), 2);
    let events = diagnostics.drain_recent();
    assert_eq!(events[0].registry, "ComponentManager");
    assert_eq!(events[1].registry, "MeshRegister");
    assert_eq!(events[1].fault, HandleFault::UnknownKey { key: 40 });
    assert_eq!(components.error_count(), 1);
    assert_eq!(meshes.error_count(), 1);
}

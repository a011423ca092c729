//! Scene import: walk the scene graph, upload meshes, resolve material textures.

use std::path::{Path, PathBuf};

use asset::{
    ImageCrateDecoder, ImageDecoder, ImportError, ObjSceneSource, PostProcess, Scene,
    SceneSource, TextureKind,
};

use crate::backend::GpuBackend;
use crate::mesh::Mesh;
use crate::model::Model;
use crate::texture_cache::{Texture, TextureCache};

/// Turns a scene file into a [`Model`] through a scene reader and an image decoder.
#[derive(Clone, Debug)]
pub struct AssetImporter<S = ObjSceneSource, D = ImageCrateDecoder> {
    source: S,
    decoder: D,
    flags: PostProcess,
}

impl AssetImporter {
    /// OBJ reader and `image` decoder with [`PostProcess::MODEL_IMPORT`].
    pub fn new() -> Self {
        Self::with_parts(ObjSceneSource, ImageCrateDecoder)
    }
}

impl Default for AssetImporter {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SceneSource, D: ImageDecoder> AssetImporter<S, D> {
    pub fn with_parts(source: S, decoder: D) -> Self {
        Self {
            source,
            decoder,
            flags: PostProcess::MODEL_IMPORT,
        }
    }

    pub fn with_flags(mut self, flags: PostProcess) -> Self {
        self.flags = flags;
        self
    }

    /// Import `path`. Structural failures abort with [`ImportError`]; texture
    /// failures are logged and leave an invalid handle in the mesh's list.
    /// Meshes with non-triangle faces are logged and left out.
    pub fn import_scene<B: GpuBackend>(
        &self,
        backend: &mut B,
        path: impl AsRef<Path>,
    ) -> Result<Model<B>, ImportError> {
        let path = path.as_ref();
        let scene = self.source.read_scene(path, self.flags)?;
        scene.validate(path)?;

        let directory = base_directory(path);
        log::info!("model path : {}", path.display());
        log::info!("directory : {}", directory.display());

        let mut textures = TextureCache::new();
        let mut meshes = Vec::with_capacity(scene.meshes.len());
        for index in scene.mesh_order()? {
            let raw = &scene.meshes[index];
            if raw.faces.iter().any(|face| face.len() != 3) {
                log::warn!(
                    "skipping mesh '{}': faces are not triangulated (enable PostProcess::triangulate)",
                    raw.name
                );
                continue;
            }
            meshes.push(self.build_mesh(backend, &scene, index, &directory, &mut textures)?);
        }

        log::info!(
            "Imported {} meshes, {} textures ({} uploads)",
            meshes.len(),
            textures.len(),
            textures.upload_count()
        );
        Ok(Model::new(meshes, textures, directory))
    }

    fn build_mesh<B: GpuBackend>(
        &self,
        backend: &mut B,
        scene: &Scene,
        index: usize,
        directory: &Path,
        cache: &mut TextureCache<B::Texture>,
    ) -> Result<Mesh<B>, ImportError> {
        let raw = &scene.meshes[index];
        let material = scene.material_of(raw)?;

        let mut textures = Vec::with_capacity(material.texture_count());
        for kind in TextureKind::ALL {
            for relative in material.textures(kind) {
                let resolved = directory.join(relative);
                let texture = match cache.get_or_load(backend, &self.decoder, &resolved, kind) {
                    Ok(texture) => texture,
                    Err(err) => {
                        log::warn!("failed to load texture from {}: {}", relative, err);
                        Texture {
                            handle: backend.invalid_texture(),
                            kind,
                            path: resolved,
                        }
                    }
                };
                textures.push(texture);
            }
        }

        let label = if raw.name.is_empty() {
            format!("mesh{index}")
        } else {
            raw.name.clone()
        };
        Ok(Mesh::new(backend, &label, raw.to_mesh_data(), textures))
    }
}

/// Everything before the last path separator; empty for a bare file name.
fn base_directory(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

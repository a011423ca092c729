//! Renderable model: meshes from one import, in scene traversal order.

use std::path::{Path, PathBuf};

use crate::backend::GpuBackend;
use crate::mesh::Mesh;
use crate::texture_cache::TextureCache;

pub struct Model<B: GpuBackend> {
    meshes: Vec<Mesh<B>>,
    textures: TextureCache<B::Texture>,
    directory: PathBuf,
}

impl<B: GpuBackend> Model<B> {
    pub fn new(meshes: Vec<Mesh<B>>, textures: TextureCache<B::Texture>, directory: PathBuf) -> Self {
        Self {
            meshes,
            textures,
            directory,
        }
    }

    pub fn meshes(&self) -> &[Mesh<B>] {
        &self.meshes
    }

    pub fn textures(&self) -> &TextureCache<B::Texture> {
        &self.textures
    }

    /// Directory texture paths were resolved against.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices().len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.data().triangle_count()).sum()
    }

    /// Draw every mesh in order with `program`.
    pub fn draw(&self, backend: &mut B, program: &B::Program) {
        for mesh in &self.meshes {
            mesh.draw(backend, program);
        }
    }
}

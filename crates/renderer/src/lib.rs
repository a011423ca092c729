//! Renderer: scene import into GPU meshes, texture cache, wgpu + headless backends.
//! wgpu = 26.x

pub mod backend;
pub mod gpu;
pub mod import;
pub mod mesh;
pub mod model;
pub mod texture_cache;

pub use backend::{BufferId, Command, GpuBackend, HeadlessBackend, ProgramId, TextureId, TextureUpload};
pub use gpu::{ModelProgram, OffscreenTarget, WgpuBackend, WgpuTexture, MODEL_TEXTURE_SLOTS};
pub use import::AssetImporter;
pub use mesh::{texture_bindings, Mesh};
pub use model::Model;
pub use texture_cache::{Texture, TextureCache};

//! Asset loading/parsers (scenes, meshes, materials, textures).
//! Everything here is CPU-side; GPU upload lives in the renderer.

pub mod error;
pub mod mesh;
pub mod mtl;
pub mod obj;
pub mod scene;
pub mod texture;

pub use error::{ImportError, TextureLoadError};
pub use mesh::{MeshData, Vertex, VertexAttribute};
pub use obj::ObjSceneSource;
pub use scene::{Material, PostProcess, RawMesh, Scene, SceneNode, SceneSource};
pub use texture::{ImageCrateDecoder, ImageDecoder, TextureData, TextureKind};

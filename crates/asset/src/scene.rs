//! Scene graph as produced by an external scene reader.
//! Nodes form a strict owned tree; meshes and materials live in flat tables
//! addressed by index.

use std::path::Path;

use crate::error::ImportError;
use crate::mesh::{MeshData, Vertex};
use crate::texture::TextureKind;

/// Processing flags handed to the scene reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PostProcess {
    /// Split polygons into triangles.
    pub triangulate: bool,
    /// Flip texture coordinates vertically (v -> 1 - v).
    pub flip_uvs: bool,
    /// Generate per-vertex tangents and bitangents.
    pub calc_tangent_space: bool,
}

impl PostProcess {
    /// Flag set used for model imports.
    pub const MODEL_IMPORT: Self = Self {
        triangulate: true,
        flip_uvs: true,
        calc_tangent_space: true,
    };

    pub const NONE: Self = Self {
        triangulate: false,
        flip_uvs: false,
        calc_tangent_space: false,
    };
}

impl Default for PostProcess {
    fn default() -> Self {
        Self::MODEL_IMPORT
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneNode {
    pub name: String,
    /// Indices into [`Scene::meshes`].
    pub meshes: Vec<usize>,
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_meshes(mut self, meshes: impl IntoIterator<Item = usize>) -> Self {
        self.meshes.extend(meshes);
        self
    }

    pub fn with_child(mut self, child: SceneNode) -> Self {
        self.children.push(child);
        self
    }
}

/// Mesh as exposed by the reader. Attribute arrays are parallel to `positions`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawMesh {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    /// First UV channel, if the source provides one.
    pub tex_coords: Option<Vec<[f32; 2]>>,
    pub tangents: Vec<[f32; 3]>,
    pub bitangents: Vec<[f32; 3]>,
    pub faces: Vec<Vec<u32>>,
    /// Index into [`Scene::materials`].
    pub material: usize,
}

impl RawMesh {
    /// Read attributes element-wise into [`Vertex`] records and flatten faces.
    /// Missing attributes read as zero.
    pub fn to_mesh_data(&self) -> MeshData {
        let vertices = self
            .positions
            .iter()
            .enumerate()
            .map(|(i, &position)| Vertex {
                position,
                normal: self.normals.get(i).copied().unwrap_or_default(),
                uv: self
                    .tex_coords
                    .as_ref()
                    .and_then(|uvs| uvs.get(i).copied())
                    .unwrap_or([0.0, 0.0]),
                tangent: self.tangents.get(i).copied().unwrap_or_default(),
                bitangent: self.bitangents.get(i).copied().unwrap_or_default(),
            })
            .collect();
        let indices = self.faces.iter().flatten().copied().collect();
        MeshData::new(vertices, indices)
    }
}

/// Per-kind lists of texture paths, relative to the scene file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Material {
    pub name: String,
    textures: [Vec<String>; 4],
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn textures(&self, kind: TextureKind) -> &[String] {
        &self.textures[kind.index()]
    }

    pub fn add_texture(&mut self, kind: TextureKind, path: impl Into<String>) {
        self.textures[kind.index()].push(path.into());
    }

    pub fn with_texture(mut self, kind: TextureKind, path: impl Into<String>) -> Self {
        self.add_texture(kind, path);
        self
    }

    pub fn texture_count(&self) -> usize {
        self.textures.iter().map(Vec::len).sum()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub root: Option<SceneNode>,
    pub meshes: Vec<RawMesh>,
    pub materials: Vec<Material>,
    /// Set by the reader when it could not build a usable scene.
    pub incomplete: bool,
}

impl Scene {
    /// Reject scenes the reader flagged as unusable.
    pub fn validate(&self, path: &Path) -> Result<&SceneNode, ImportError> {
        if self.incomplete {
            return Err(ImportError::Incomplete {
                path: path.to_path_buf(),
            });
        }
        self.root.as_ref().ok_or_else(|| ImportError::MissingRoot {
            path: path.to_path_buf(),
        })
    }

    /// Mesh indices in draw order: depth-first pre-order, a node's own meshes
    /// before its children, children in their stored order.
    pub fn mesh_order(&self) -> Result<Vec<usize>, ImportError> {
        let mut order = Vec::new();
        if let Some(root) = &self.root {
            self.collect_meshes(root, &mut order)?;
        }
        Ok(order)
    }

    fn collect_meshes(&self, node: &SceneNode, order: &mut Vec<usize>) -> Result<(), ImportError> {
        log::debug!("start process node - {}", node.name);
        for &index in &node.meshes {
            if index >= self.meshes.len() {
                return Err(ImportError::InvalidMeshReference {
                    node: node.name.clone(),
                    index,
                    count: self.meshes.len(),
                });
            }
            order.push(index);
        }
        for child in &node.children {
            self.collect_meshes(child, order)?;
        }
        log::debug!("end process node - {}", node.name);
        Ok(())
    }

    /// Material of `mesh`, or an error if the mesh points past the table.
    pub fn material_of(&self, mesh: &RawMesh) -> Result<&Material, ImportError> {
        self.materials
            .get(mesh.material)
            .ok_or_else(|| ImportError::InvalidMaterialReference {
                mesh: mesh.name.clone(),
                index: mesh.material,
                count: self.materials.len(),
            })
    }
}

/// External scene-reading collaborator.
pub trait SceneSource {
    fn read_scene(&self, path: &Path, flags: PostProcess) -> Result<Scene, ImportError>;
}

impl<F> SceneSource for F
where
    F: Fn(&Path, PostProcess) -> Result<Scene, ImportError>,
{
    fn read_scene(&self, path: &Path, flags: PostProcess) -> Result<Scene, ImportError> {
        self(path, flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(name: &str) -> RawMesh {
        RawMesh {
            name: name.into(),
            positions: vec![[0.0; 3]; 3],
            faces: vec![vec![0, 1, 2]],
            ..RawMesh::default()
        }
    }

    #[test]
    fn self_meshes_come_before_children() {
        let root = SceneNode::new("R")
            .with_meshes([0, 1])
            .with_child(SceneNode::new("C1").with_meshes([2]))
            .with_child(SceneNode::new("C2").with_meshes([3]));
        let scene = Scene {
            root: Some(root),
            meshes: (0..4).map(|i| mesh(&format!("m{i}"))).collect(),
            ..Scene::default()
        };
        assert_eq!(scene.mesh_order().unwrap(), vec![0, 1, 2, 3]);
    }

    #[test]
    fn deep_subtrees_finish_before_later_siblings() {
        let root = SceneNode::new("R")
            .with_child(
                SceneNode::new("A")
                    .with_meshes([3])
                    .with_child(SceneNode::new("A1").with_meshes([1])),
            )
            .with_child(SceneNode::new("B").with_meshes([0, 2]));
        let scene = Scene {
            root: Some(root),
            meshes: (0..4).map(|i| mesh(&format!("m{i}"))).collect(),
            ..Scene::default()
        };
        assert_eq!(scene.mesh_order().unwrap(), vec![3, 1, 0, 2]);
    }

    #[test]
    fn dangling_mesh_reference_is_rejected() {
        let scene = Scene {
            root: Some(SceneNode::new("R").with_meshes([5])),
            meshes: vec![mesh("only")],
            ..Scene::default()
        };
        let err = scene.mesh_order().unwrap_err();
        assert!(matches!(
            err,
            ImportError::InvalidMeshReference { index: 5, count: 1, .. }
        ));
    }

    #[test]
    fn validate_reports_incomplete_before_root() {
        let path = Path::new("x.obj");
        let scene = Scene {
            incomplete: true,
            ..Scene::default()
        };
        assert!(matches!(scene.validate(path), Err(ImportError::Incomplete { .. })));
        let scene = Scene::default();
        assert!(matches!(scene.validate(path), Err(ImportError::MissingRoot { .. })));
    }

    #[test]
    fn missing_uvs_default_to_origin_and_faces_flatten() {
        let raw = RawMesh {
            positions: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
            normals: vec![[0.0, 0.0, 1.0]; 4],
            faces: vec![vec![0, 1, 2], vec![2, 1, 3]],
            ..RawMesh::default()
        };
        let data = raw.to_mesh_data();
        assert_eq!(data.vertices.len(), 4);
        assert!(data.vertices.iter().all(|v| v.uv == [0.0, 0.0]));
        assert_eq!(data.vertices[3].position, [1.0, 1.0, 0.0]);
        assert_eq!(data.indices, vec![0, 1, 2, 2, 1, 3]);
        assert!(data.is_triangle_list());
    }

    #[test]
    fn material_lookup_checks_bounds() {
        let mut scene = Scene {
            materials: vec![Material::new("default")],
            ..Scene::default()
        };
        let mut raw = mesh("m");
        assert_eq!(scene.material_of(&raw).unwrap().name, "default");
        raw.material = 2;
        assert!(scene.material_of(&raw).is_err());
        scene.materials.push(Material::new("a").with_texture(TextureKind::Diffuse, "a.png"));
        assert_eq!(scene.materials[1].texture_count(), 1);
    }
}

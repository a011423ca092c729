//! Wavefront OBJ scene reader: positions, normals, texture coordinates,
//! object/group nodes and MTL materials.

use std::{
    collections::HashMap,
    fs::File,
    io::{self, BufRead, BufReader},
    path::Path,
};

use anyhow::{Context, Result, anyhow};

use crate::error::ImportError;
use crate::mtl;
use crate::scene::{Material, PostProcess, RawMesh, Scene, SceneNode, SceneSource};

/// [`SceneSource`] reading `.obj` files and the `.mtl` libraries they reference.
#[derive(Clone, Copy, Debug, Default)]
pub struct ObjSceneSource;

impl SceneSource for ObjSceneSource {
    fn read_scene(&self, path: &Path, flags: PostProcess) -> Result<Scene, ImportError> {
        load_obj_from_path(path, flags).map_err(|source| ImportError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Load an OBJ scene from a file path. Material libraries resolve against the
/// file's directory; a library that cannot be read is skipped with a warning.
pub fn load_obj_from_path(path: impl AsRef<Path>, flags: PostProcess) -> Result<Scene> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open OBJ file: {}", path.display()))?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
    let root_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    parse_obj(BufReader::new(file), root_name, flags, |lib| {
        mtl::load_mtl_from_path(base_dir.join(lib))
    })
}

/// Load an OBJ scene from a [`BufRead`] implementation without material libraries.
pub fn load_obj_from_reader<R: BufRead>(reader: R, flags: PostProcess) -> Result<Scene> {
    parse_obj(reader, String::from("root"), flags, |lib| {
        Err(anyhow!("no search path for material library '{}'", lib))
    })
}

/// Convenience helper to parse an OBJ string literal.
pub fn load_obj_from_str(contents: &str, flags: PostProcess) -> Result<Scene> {
    load_obj_from_reader(io::Cursor::new(contents), flags)
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
struct Key(usize, Option<usize>, Option<usize>);

/// Mesh under construction: one per (node, material) run.
struct MeshBuilder {
    material: usize,
    unique: HashMap<Key, u32>,
    positions: Vec<[f32; 3]>,
    normals: Vec<[f32; 3]>,
    uvs: Vec<[f32; 2]>,
    has_uvs: bool,
    faces: Vec<Vec<u32>>,
}

impl MeshBuilder {
    fn new(material: usize) -> Self {
        Self {
            material,
            unique: HashMap::new(),
            positions: Vec::new(),
            normals: Vec::new(),
            uvs: Vec::new(),
            has_uvs: false,
            faces: Vec::new(),
        }
    }

    fn finish(self, name: String, flags: PostProcess) -> RawMesh {
        let mut mesh = RawMesh {
            name,
            positions: self.positions,
            normals: self.normals,
            tex_coords: self.has_uvs.then_some(self.uvs),
            faces: self.faces,
            material: self.material,
            ..RawMesh::default()
        };
        if flags.calc_tangent_space {
            compute_tangent_space(&mut mesh);
        }
        mesh
    }
}

struct NodeBuilder {
    name: String,
    meshes: Vec<MeshBuilder>,
}

impl NodeBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            meshes: Vec::new(),
        }
    }

    /// Current mesh for `material`, starting a new one when the material changes.
    fn mesh_for(&mut self, material: usize) -> &mut MeshBuilder {
        let reuse = self.meshes.last().is_some_and(|m| m.material == material);
        if !reuse {
            self.meshes.push(MeshBuilder::new(material));
        }
        let last = self.meshes.len() - 1;
        &mut self.meshes[last]
    }
}

fn parse_obj<R, L>(reader: R, root_name: String, flags: PostProcess, mut load_library: L) -> Result<Scene>
where
    R: BufRead,
    L: FnMut(&str) -> Result<Vec<Material>>,
{
    let mut positions: Vec<[f32; 3]> = Vec::new();
    let mut normals: Vec<[f32; 3]> = Vec::new();
    let mut texcoords: Vec<[f32; 2]> = Vec::new();

    let mut materials = vec![Material::new("DefaultMaterial")];
    let mut material_ids: HashMap<String, usize> = HashMap::new();
    let mut current_material = 0usize;

    // nodes[0] is the root; groups become its children.
    let mut nodes = vec![NodeBuilder::new(root_name)];
    let mut current_node = 0usize;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("Failed to read line {}", line_no + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let mut parts = trimmed.split_whitespace();
        let tag = parts
            .next()
            .ok_or_else(|| anyhow!("Malformed OBJ line {}: '{}'", line_no + 1, trimmed))?;

        match tag {
            "v" => {
                let x = parse_f32(parts.next(), line_no, "x coordinate")?;
                let y = parse_f32(parts.next(), line_no, "y coordinate")?;
                let z = parse_f32(parts.next(), line_no, "z coordinate")?;
                positions.push([x, y, z]);
            }
            "vt" => {
                let u = parse_f32(parts.next(), line_no, "u coordinate")?;
                // `vt u [v [w]]`, v defaults to 0
                let v = parts
                    .next()
                    .map(|t| parse_f32(Some(t), line_no, "v coordinate"))
                    .transpose()?
                    .unwrap_or(0.0);
                let v = if flags.flip_uvs { 1.0 - v } else { v };
                texcoords.push([u, v]);
            }
            "vn" => {
                let nx = parse_f32(parts.next(), line_no, "nx coordinate")?;
                let ny = parse_f32(parts.next(), line_no, "ny coordinate")?;
                let nz = parse_f32(parts.next(), line_no, "nz coordinate")?;
                normals.push([nx, ny, nz]);
            }
            "o" | "g" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                let name = if name.is_empty() {
                    format!("unnamed_{}", nodes.len())
                } else {
                    name
                };
                if nodes[current_node].name != name || current_node == 0 {
                    nodes.push(NodeBuilder::new(name));
                    current_node = nodes.len() - 1;
                }
            }
            "mtllib" => {
                for lib in parts {
                    match load_library(lib) {
                        Ok(loaded) => {
                            for material in loaded {
                                material_ids.insert(material.name.clone(), materials.len());
                                materials.push(material);
                            }
                        }
                        Err(err) => {
                            log::warn!("Skipping material library '{}': {:#}", lib, err);
                        }
                    }
                }
            }
            "usemtl" => {
                let name = parts.collect::<Vec<_>>().join(" ");
                current_material = match material_ids.get(&name) {
                    Some(&id) => id,
                    None => {
                        log::warn!(
                            "Unknown material '{}' on line {}, using default",
                            name,
                            line_no + 1
                        );
                        0
                    }
                };
            }
            "f" => {
                let mesh = nodes[current_node].mesh_for(current_material);
                let mut face_indices: Vec<u32> = Vec::new();
                for part in parts {
                    let (vi, vti, vni) = parse_face_vertex(
                        part,
                        positions.len(),
                        texcoords.len(),
                        normals.len(),
                        line_no,
                    )?;
                    let key = Key(vi, vti, vni);
                    let index = match mesh.unique.get(&key) {
                        Some(&idx) => idx,
                        None => {
                            let position = positions.get(vi).copied().ok_or_else(|| {
                                anyhow!("Position index out of bounds on line {}", line_no + 1)
                            })?;
                            let uv = vti.and_then(|i| texcoords.get(i).copied());
                            let normal = vni
                                .and_then(|i| normals.get(i).copied())
                                .unwrap_or([0.0, 0.0, 1.0]);

                            let idx = u32::try_from(mesh.positions.len())
                                .map_err(|_| anyhow!("Too many vertices in OBJ (>{})", u32::MAX))?;
                            mesh.positions.push(position);
                            mesh.normals.push(normal);
                            mesh.uvs.push(uv.unwrap_or([0.0, 0.0]));
                            mesh.has_uvs |= uv.is_some();
                            mesh.unique.insert(key, idx);
                            idx
                        }
                    };
                    face_indices.push(index);
                }

                if face_indices.len() < 3 {
                    continue;
                }
                if flags.triangulate {
                    // Triangulate fan
                    for tri in 1..(face_indices.len() - 1) {
                        mesh.faces.push(vec![
                            face_indices[0],
                            face_indices[tri],
                            face_indices[tri + 1],
                        ]);
                    }
                } else {
                    mesh.faces.push(face_indices);
                }
            }
            _ => {
                // Ignore other directives (s/l/p/etc.)
            }
        }
    }

    let mut scene = Scene {
        materials,
        ..Scene::default()
    };
    let mut built: Vec<SceneNode> = Vec::with_capacity(nodes.len());
    for node in nodes {
        let mut scene_node = SceneNode::new(node.name.clone());
        let count = node.meshes.len();
        for (i, mesh) in node.meshes.into_iter().enumerate() {
            if mesh.faces.is_empty() {
                continue;
            }
            let name = if count > 1 {
                format!("{}#{}", node.name, i)
            } else {
                node.name.clone()
            };
            scene_node.meshes.push(scene.meshes.len());
            scene.meshes.push(mesh.finish(name, flags));
        }
        built.push(scene_node);
    }

    let mut built = built.into_iter();
    let mut root = built.next().unwrap_or_default();
    root.children.extend(built);
    scene.root = Some(root);
    scene.incomplete = scene.meshes.is_empty();
    if scene.incomplete {
        log::warn!("OBJ contained no triangles");
    }

    Ok(scene)
}

fn parse_f32(value: Option<&str>, line_no: usize, what: &str) -> Result<f32> {
    let token = value.ok_or_else(|| anyhow!("Missing {} on line {}", what, line_no + 1))?;
    token
        .parse::<f32>()
        .with_context(|| format!("Failed to parse {} on line {}", what, line_no + 1))
}

fn parse_face_vertex(
    token: &str,
    pos_count: usize,
    tex_count: usize,
    norm_count: usize,
    line_no: usize,
) -> Result<(usize, Option<usize>, Option<usize>)> {
    let mut split = token.split('/');
    let pos = split
        .next()
        .ok_or_else(|| anyhow!("Malformed face element '{}' on line {}", token, line_no + 1))?;
    let pos_idx = resolve_index(pos, pos_count, line_no)?;

    let tex_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, tex_count, line_no)?),
        _ => None,
    };

    let norm_idx = match split.next() {
        Some(value) if !value.is_empty() => Some(resolve_index(value, norm_count, line_no)?),
        _ => None,
    };

    Ok((pos_idx, tex_idx, norm_idx))
}

fn resolve_index(token: &str, len: usize, line_no: usize) -> Result<usize> {
    let raw = token
        .parse::<i32>()
        .with_context(|| format!("Invalid index '{}' on line {}", token, line_no + 1))?;
    if raw == 0 {
        anyhow::bail!("OBJ indices are 1-based; found 0 on line {}", line_no + 1);
    }

    let idx = if raw > 0 {
        (raw - 1) as isize
    } else {
        (len as isize) + (raw as isize)
    };

    if idx < 0 || idx as usize >= len {
        anyhow::bail!(
            "OBJ index {} resolved out of bounds (len={}) on line {}",
            raw,
            len,
            line_no + 1
        );
    }

    Ok(idx as usize)
}

/// Per-vertex tangent frame from UV gradients, accumulated over every
/// triangle touching the vertex. Meshes without UVs get none.
fn compute_tangent_space(mesh: &mut RawMesh) {
    let Some(uvs) = mesh.tex_coords.as_ref() else {
        return;
    };
    let count = mesh.positions.len();
    if uvs.len() < count {
        return;
    }
    let mut tangents = vec![[0.0f32; 3]; count];
    let mut bitangents = vec![[0.0f32; 3]; count];

    for face in &mesh.faces {
        for k in 1..face.len().saturating_sub(1) {
            let tri = [face[0] as usize, face[k] as usize, face[k + 1] as usize];
            if tri.iter().any(|&i| i >= count) {
                continue;
            }
            let [p0, p1, p2] = tri.map(|i| mesh.positions[i]);
            let [uv0, uv1, uv2] = tri.map(|i| uvs[i]);

            let e1 = sub(p1, p0);
            let e2 = sub(p2, p0);
            let (du1, dv1) = (uv1[0] - uv0[0], uv1[1] - uv0[1]);
            let (du2, dv2) = (uv2[0] - uv0[0], uv2[1] - uv0[1]);

            let det = du1 * dv2 - du2 * dv1;
            if det.abs() <= f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let t = scale(sub(scale(e1, dv2), scale(e2, dv1)), r);
            let b = scale(sub(scale(e2, du1), scale(e1, du2)), r);
            for i in tri {
                tangents[i] = add(tangents[i], t);
                bitangents[i] = add(bitangents[i], b);
            }
        }
    }

    mesh.tangents = tangents.into_iter().map(normalize_or_zero).collect();
    mesh.bitangents = bitangents.into_iter().map(normalize_or_zero).collect();
}

fn sub(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn add(a: [f32; 3], b: [f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

fn scale(a: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

fn normalize_or_zero(a: [f32; 3]) -> [f32; 3] {
    let len = (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt();
    if len > 1e-8 { scale(a, 1.0 / len) } else { [0.0; 3] }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_TANGENTS: PostProcess = PostProcess {
        triangulate: true,
        flip_uvs: false,
        calc_tangent_space: false,
    };

    #[test]
    fn parse_simple_triangle() {
        let src = r#"
            v 0.0 0.0 0.0
            v 1.0 0.0 0.0
            v 0.0 1.0 0.0
            vn 0.0 0.0 1.0
            vt 0.0 0.0
            vt 1.0 0.0
            vt 0.0 1.0
            f 1/1/1 2/2/1 3/3/1
        "#;
        let scene = load_obj_from_str(src, NO_TANGENTS).expect("parse triangle");
        assert!(!scene.incomplete);
        assert_eq!(scene.meshes.len(), 1);
        let mesh = scene.meshes[0].to_mesh_data();
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.indices.len(), 3);
        assert!(mesh.is_valid());
    }

    #[test]
    fn quads_are_fanned_when_triangulating() {
        let src = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let scene = load_obj_from_str(src, NO_TANGENTS).unwrap();
        assert_eq!(scene.meshes[0].faces, vec![vec![0, 1, 2], vec![0, 2, 3]]);
        assert!(scene.meshes[0].tex_coords.is_none());

        let scene = load_obj_from_str(src, PostProcess::NONE).unwrap();
        assert_eq!(scene.meshes[0].faces, vec![vec![0, 1, 2, 3]]);
    }

    #[test]
    fn groups_become_children_of_root_in_file_order() {
        let src = r#"
            v 0 0 0
            v 1 0 0
            v 0 1 0
            f 1 2 3
            o first
            f 1 2 3
            g second
            f 3 2 1
        "#;
        let scene = load_obj_from_str(src, NO_TANGENTS).unwrap();
        let root = scene.root.as_ref().unwrap();
        assert_eq!(root.meshes, vec![0]);
        let names: Vec<&str> = root.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(root.children[0].meshes, vec![1]);
        assert_eq!(root.children[1].meshes, vec![2]);
        assert_eq!(scene.mesh_order().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn unknown_material_falls_back_to_default() {
        let src = "mtllib missing.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl metal\nf 1 2 3\n";
        let scene = load_obj_from_str(src, NO_TANGENTS).unwrap();
        assert_eq!(scene.materials.len(), 1);
        assert_eq!(scene.meshes[0].material, 0);
    }

    #[test]
    fn material_switch_splits_meshes_within_a_node() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\nusemtl x\nf 1 2 3\n";
        let libs = |_: &str| -> Result<Vec<Material>> { Ok(vec![Material::new("x")]) };
        let src = format!("mtllib lib.mtl\n{src}");
        let scene = parse_obj(io::Cursor::new(src), "r".into(), NO_TANGENTS, libs).unwrap();
        assert_eq!(scene.meshes.len(), 2);
        assert_eq!(scene.meshes[0].material, 0);
        assert_eq!(scene.meshes[1].material, 1);
        assert_eq!(scene.root.unwrap().meshes, vec![0, 1]);
    }

    #[test]
    fn flip_uvs_inverts_v() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.25 0.25\nf 1/1 2/1 3/1\n";
        let scene = load_obj_from_str(src, PostProcess::MODEL_IMPORT).unwrap();
        let uvs = scene.meshes[0].tex_coords.as_ref().unwrap();
        assert_eq!(uvs[0], [0.25, 0.75]);
    }

    #[test]
    fn tangent_frame_follows_uv_axes() {
        let src = r#"
            v 0 0 0
            v 1 0 0
            v 1 1 0
            v 0 1 0
            vt 0 0
            vt 1 0
            vt 1 1
            vt 0 1
            vn 0 0 1
            f 1/1/1 2/2/1 3/3/1 4/4/1
        "#;
        let flags = PostProcess {
            flip_uvs: false,
            ..PostProcess::MODEL_IMPORT
        };
        let scene = load_obj_from_str(src, flags).unwrap();
        let data = scene.meshes[0].to_mesh_data();
        for v in &data.vertices {
            assert!((v.tangent[0] - 1.0).abs() < 1e-5, "{:?}", v.tangent);
            assert!((v.bitangent[1] - 1.0).abs() < 1e-5, "{:?}", v.bitangent);
        }
    }

    #[test]
    fn texcoord_v_is_optional() {
        let src = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.5\nvt 0.25 0.75 0.0\nf 1/1 2/2 3/1\n";
        let scene = load_obj_from_str(src, NO_TANGENTS).unwrap();
        let uvs = scene.meshes[0].tex_coords.as_ref().unwrap();
        assert_eq!(uvs[0], [0.5, 0.0]);
        assert_eq!(uvs[1], [0.25, 0.75]);

        let flipped = load_obj_from_str(src, PostProcess::MODEL_IMPORT).unwrap();
        let uvs = flipped.meshes[0].tex_coords.as_ref().unwrap();
        assert_eq!(uvs[0], [0.5, 1.0]);
    }

    #[test]
    fn empty_file_is_incomplete() {
        let scene = load_obj_from_str("# nothing\nv 0 0 0\n", NO_TANGENTS).unwrap();
        assert!(scene.incomplete);
        assert!(scene.root.is_some());
    }

    #[test]
    fn missing_file_maps_to_parse_error() {
        let err = ObjSceneSource
            .read_scene(Path::new("no/such/model.obj"), PostProcess::MODEL_IMPORT)
            .unwrap_err();
        assert!(matches!(err, ImportError::Parse { .. }));
    }

    #[test]
    fn material_library_resolves_next_to_obj() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("box.mtl"),
            "newmtl painted\nmap_Kd -bm 1.0 paint.png\n",
        )
        .unwrap();
        let obj = dir.path().join("box.obj");
        std::fs::write(
            &obj,
            "mtllib box.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nusemtl painted\nf 1 2 3\n",
        )
        .unwrap();

        let scene = load_obj_from_path(&obj, NO_TANGENTS).unwrap();
        assert_eq!(scene.root.as_ref().unwrap().name, "box.obj");
        assert_eq!(scene.materials.len(), 2);
        let material = scene.material_of(&scene.meshes[0]).unwrap();
        assert_eq!(material.name, "painted");
        assert_eq!(material.textures(crate::TextureKind::Diffuse), ["paint.png"]);
    }
}

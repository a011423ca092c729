//! GPU mesh: immutable vertex/index data, its textures and owned buffers.

use asset::{MeshData, TextureKind, Vertex};

use crate::backend::GpuBackend;
use crate::texture_cache::Texture;

/// Uniform name and texture unit for each texture of a mesh, in list order.
/// Ordinals count per kind from 1 and restart for every call.
pub fn texture_bindings<T>(textures: &[Texture<T>]) -> Vec<(u32, String)> {
    let mut counters = [0u32; TextureKind::ALL.len()];
    textures
        .iter()
        .enumerate()
        .map(|(unit, texture)| {
            let ordinal = &mut counters[texture.kind.index()];
            *ordinal += 1;
            (unit as u32, texture.kind.uniform_name(*ordinal))
        })
        .collect()
}

pub struct Mesh<B: GpuBackend> {
    data: MeshData,
    textures: Vec<Texture<B::Texture>>,
    vertex_buffer: B::Buffer,
    index_buffer: B::Buffer,
}

impl<B: GpuBackend> Mesh<B> {
    /// Upload `data` into fresh vertex/index buffers.
    pub fn new(backend: &mut B, label: &str, data: MeshData, textures: Vec<Texture<B::Texture>>) -> Self {
        debug_assert!(data.is_triangle_list(), "mesh '{label}' is not a triangle list");
        let vertex_buffer = backend.create_vertex_buffer(&format!("{label} VB"), &data.vertices);
        let index_buffer = backend.create_index_buffer(&format!("{label} IB"), &data.indices);
        Self {
            data,
            textures,
            vertex_buffer,
            index_buffer,
        }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.data.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.data.indices
    }

    pub fn textures(&self) -> &[Texture<B::Texture>] {
        &self.textures
    }

    pub fn data(&self) -> &MeshData {
        &self.data
    }

    /// Bind textures to units 0.. under their `texture_<kind><n>` names, then draw.
    pub fn draw(&self, backend: &mut B, program: &B::Program) {
        for ((unit, name), texture) in texture_bindings(&self.textures).into_iter().zip(&self.textures) {
            backend.set_uniform_int(program, &name, unit as i32);
            backend.bind_texture(unit, &texture.handle);
        }
        backend.draw_indexed(
            program,
            &self.vertex_buffer,
            &self.index_buffer,
            self.data.indices.len() as u32,
        );
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::backend::{Command, HeadlessBackend, ProgramId, TextureId};

    fn tex(id: u32, kind: TextureKind) -> Texture<TextureId> {
        Texture {
            handle: TextureId(id),
            kind,
            path: PathBuf::from(format!("{id}.png")),
        }
    }

    #[test]
    fn ordinals_count_per_kind() {
        let textures = [
            tex(1, TextureKind::Diffuse),
            tex(2, TextureKind::Specular),
            tex(3, TextureKind::Diffuse),
            tex(4, TextureKind::Height),
            tex(5, TextureKind::Normal),
            tex(6, TextureKind::Specular),
        ];
        let names: Vec<String> = texture_bindings(&textures).into_iter().map(|(_, n)| n).collect();
        assert_eq!(
            names,
            vec![
                "texture_diffuse1",
                "texture_specular1",
                "texture_diffuse2",
                "texture_height1",
                "texture_normal1",
                "texture_specular2",
            ]
        );
    }

    #[test]
    fn draw_binds_sequential_units_then_draws() {
        let mut gpu = HeadlessBackend::new();
        let data = MeshData::new(vec![Vertex::default(); 3], vec![0, 1, 2]);
        let mesh = Mesh::new(
            &mut gpu,
            "tri",
            data,
            vec![tex(7, TextureKind::Diffuse), tex(8, TextureKind::Normal)],
        );
        let program = ProgramId(42);

        mesh.draw(&mut gpu, &program);
        mesh.draw(&mut gpu, &program);

        let cmds = gpu.commands();
        assert_eq!(cmds.len(), 10);
        assert_eq!(
            cmds[0],
            Command::SetInt {
                program,
                name: "texture_diffuse1".into(),
                value: 0
            }
        );
        assert_eq!(
            cmds[1],
            Command::BindTexture {
                unit: 0,
                texture: TextureId(7)
            }
        );
        assert_eq!(
            cmds[2],
            Command::SetInt {
                program,
                name: "texture_normal1".into(),
                value: 1
            }
        );
        assert!(matches!(cmds[4], Command::DrawIndexed { index_count: 3, .. }));
        // counters restart on the next draw
        assert_eq!(cmds[5], cmds[0]);
    }
}

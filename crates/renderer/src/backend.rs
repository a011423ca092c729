//! GPU seam used by meshes, the texture cache and model drawing.
//! `HeadlessBackend` records every call instead of talking to a device.

use asset::{TextureData, Vertex};

/// GPU resource interface: buffer/texture creation, uniform binding, indexed draws.
/// Resources are released when their handles drop.
pub trait GpuBackend {
    type Buffer;
    /// Shared by every mesh referencing the same texture path.
    type Texture: Clone;
    /// Linked shader program; owned by the caller.
    type Program: ?Sized;

    fn create_vertex_buffer(&mut self, label: &str, vertices: &[Vertex]) -> Self::Buffer;
    fn create_index_buffer(&mut self, label: &str, indices: &[u32]) -> Self::Buffer;
    /// 2D, mipmapped, repeat-wrapped, linearly filtered.
    fn create_texture(&mut self, label: &str, image: &TextureData) -> Self::Texture;
    /// Sentinel for a texture that failed to load; binds as "no texture".
    fn invalid_texture(&self) -> Self::Texture;

    fn set_uniform_int(&mut self, program: &Self::Program, name: &str, value: i32);
    fn bind_texture(&mut self, unit: u32, texture: &Self::Texture);
    fn draw_indexed(
        &mut self,
        program: &Self::Program,
        vertices: &Self::Buffer,
        indices: &Self::Buffer,
        index_count: u32,
    );
}

/// Opaque texture id handed out by [`HeadlessBackend`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

impl TextureId {
    pub const INVALID: TextureId = TextureId(0);

    #[inline]
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

/// One recorded texture upload.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureUpload {
    pub id: TextureId,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub mip_levels: u32,
}

/// Recorded draw-time call.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    SetInt {
        program: ProgramId,
        name: String,
        value: i32,
    },
    BindTexture {
        unit: u32,
        texture: TextureId,
    },
    DrawIndexed {
        program: ProgramId,
        vertices: BufferId,
        indices: BufferId,
        index_count: u32,
    },
}

/// Device-less backend that records uploads and commands.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_id: u32,
    buffers: Vec<(BufferId, String, u64)>,
    uploads: Vec<TextureUpload>,
    commands: Vec<Command>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        // 0 is reserved for TextureId::INVALID.
        self.next_id += 1;
        self.next_id
    }

    fn buffer(&mut self, label: &str, bytes: u64) -> BufferId {
        let id = BufferId(self.next());
        self.buffers.push((id, label.to_owned(), bytes));
        id
    }

    pub fn uploads(&self) -> &[TextureUpload] {
        &self.uploads
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Size in bytes of a created buffer.
    pub fn buffer_size(&self, id: BufferId) -> Option<u64> {
        self.buffers
            .iter()
            .find(|(b, _, _)| *b == id)
            .map(|(_, _, size)| *size)
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Drain recorded commands, e.g. once per frame.
    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    pub fn draw_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::DrawIndexed { .. }))
            .count()
    }
}

impl GpuBackend for HeadlessBackend {
    type Buffer = BufferId;
    type Texture = TextureId;
    type Program = ProgramId;

    fn create_vertex_buffer(&mut self, label: &str, vertices: &[Vertex]) -> BufferId {
        self.buffer(label, std::mem::size_of_val(vertices) as u64)
    }

    fn create_index_buffer(&mut self, label: &str, indices: &[u32]) -> BufferId {
        self.buffer(label, std::mem::size_of_val(indices) as u64)
    }

    fn create_texture(&mut self, label: &str, image: &TextureData) -> TextureId {
        let id = TextureId(self.next());
        self.uploads.push(TextureUpload {
            id,
            label: label.to_owned(),
            width: image.width,
            height: image.height,
            mip_levels: image.mip_level_count(),
        });
        id
    }

    fn invalid_texture(&self) -> TextureId {
        TextureId::INVALID
    }

    fn set_uniform_int(&mut self, program: &ProgramId, name: &str, value: i32) {
        self.commands.push(Command::SetInt {
            program: *program,
            name: name.to_owned(),
            value,
        });
    }

    fn bind_texture(&mut self, unit: u32, texture: &TextureId) {
        self.commands.push(Command::BindTexture {
            unit,
            texture: *texture,
        });
    }

    fn draw_indexed(
        &mut self,
        program: &ProgramId,
        vertices: &BufferId,
        indices: &BufferId,
        index_count: u32,
    ) {
        self.commands.push(Command::DrawIndexed {
            program: *program,
            vertices: *vertices,
            indices: *indices,
            index_count,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_never_collide_with_invalid() {
        let mut gpu = HeadlessBackend::new();
        let tex = gpu.create_texture("t", &TextureData::create_test_texture(8));
        assert!(tex.is_valid());
        assert!(!gpu.invalid_texture().is_valid());
        assert_eq!(gpu.uploads()[0].mip_levels, 4);
    }

    #[test]
    fn buffers_record_byte_sizes() {
        let mut gpu = HeadlessBackend::new();
        let vb = gpu.create_vertex_buffer("vb", &[Vertex::default(); 3]);
        let ib = gpu.create_index_buffer("ib", &[0, 1, 2]);
        assert_eq!(gpu.buffer_size(vb), Some(3 * Vertex::STRIDE));
        assert_eq!(gpu.buffer_size(ib), Some(12));
        assert_eq!(gpu.buffer_count(), 2);
    }
}

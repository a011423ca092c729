//! wgpu backend: offscreen device, model pipeline and recorded draws.
//! wgpu = 26.x

use std::collections::HashMap;
use std::mem::size_of;
use std::sync::Arc;

use anyhow::{Context, Result};
use asset::{TextureData, Vertex};
use bytemuck::{Pod, Zeroable};
use corelib::Camera;
use glam::Mat4;
use wgpu::{
    util::DeviceExt,
    AddressMode, BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry,
    BindingResource, BindingType, BlendState, Buffer, BufferBindingType, BufferUsages,
    ColorTargetState, ColorWrites, CommandEncoderDescriptor, DepthBiasState, DepthStencilState,
    Device, DeviceDescriptor, Extent3d, FilterMode, FragmentState, Instance, InstanceDescriptor,
    Limits, LoadOp, Operations, Origin3d, PipelineLayoutDescriptor, PowerPreference, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    Sampler, SamplerBindingType, SamplerDescriptor, ShaderModuleDescriptor, ShaderSource,
    ShaderStages, StoreOp, TexelCopyBufferLayout, TexelCopyTextureInfo, TextureAspect,
    TextureDescriptor, TextureDimension, TextureFormat, TextureSampleType, TextureUsages,
    TextureView, TextureViewDescriptor, TextureViewDimension, VertexBufferLayout, VertexFormat,
    VertexState, VertexStepMode,
};

use crate::backend::GpuBackend;

pub const COLOR_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const TEXTURE_FORMAT: TextureFormat = TextureFormat::Rgba8UnormSrgb;

/// Sampled texture uniforms of the model shader; slot `i` lives at binding `i + 1`.
pub const MODEL_TEXTURE_SLOTS: [&str; 4] = [
    "texture_diffuse1",
    "texture_specular1",
    "texture_normal1",
    "texture_height1",
];

pub struct GpuTexture {
    _texture: wgpu::Texture,
    view: TextureView,
}

/// Shared texture handle. `None` is the invalid sentinel and samples the white fallback.
pub struct WgpuTexture<G = GpuTexture>(Option<Arc<G>>);

impl<G> WgpuTexture<G> {
    pub fn is_valid(&self) -> bool {
        self.0.is_some()
    }

    fn or_fallback(&self, fallback: &Arc<G>) -> Arc<G> {
        self.0.clone().unwrap_or_else(|| fallback.clone())
    }
}

impl<G> Clone for WgpuTexture<G> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<G> Default for WgpuTexture<G> {
    fn default() -> Self {
        Self(None)
    }
}

/// Uniform -> unit -> texture bindings accumulated for the next draw.
struct SlotBindings<T> {
    units: HashMap<u32, T>,
    uniforms: HashMap<String, i32>,
}

impl<T: Clone> SlotBindings<T> {
    fn new() -> Self {
        Self {
            units: HashMap::new(),
            uniforms: HashMap::new(),
        }
    }

    /// Record `name = value`. Returns false for names outside [`MODEL_TEXTURE_SLOTS`].
    fn set_uniform(&mut self, name: &str, value: i32) -> bool {
        if !MODEL_TEXTURE_SLOTS.contains(&name) {
            return false;
        }
        self.uniforms.insert(name.to_owned(), value);
        true
    }

    fn bind(&mut self, unit: u32, texture: T) {
        self.units.insert(unit, texture);
    }

    /// Texture reaching each slot, `None` where the uniform or unit is missing.
    /// Bindings belong to one draw and are cleared.
    fn take(&mut self) -> [Option<T>; MODEL_TEXTURE_SLOTS.len()] {
        let resolved = MODEL_TEXTURE_SLOTS.map(|slot| {
            self.uniforms
                .get(slot)
                .and_then(|&unit| u32::try_from(unit).ok())
                .and_then(|unit| self.units.get(&unit))
                .cloned()
        });
        self.units.clear();
        self.uniforms.clear();
        resolved
    }
}

/// Camera UBO (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
}

/// Pipeline + bind group layouts for drawing imported models.
pub struct ModelProgram {
    pipeline: Arc<RenderPipeline>,
    texture_bgl: BindGroupLayout,
    camera_buf: Buffer,
    camera_bg: Arc<BindGroup>,
}

impl ModelProgram {
    pub fn new(gpu: &WgpuBackend) -> Self {
        let device = &gpu.device;

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Model WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/model.wgsl").into()),
        });

        // ==== Camera BGL/BG ====
        let camera_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Camera BGL"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(size_of::<CameraUniform>() as u64),
                },
                count: None,
            }],
        });
        let camera_init = CameraUniform {
            view_proj: Mat4::IDENTITY.to_cols_array_2d(),
            model: Mat4::IDENTITY.to_cols_array_2d(),
        };
        let camera_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera UBO"),
            contents: bytemuck::bytes_of(&camera_init),
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        });
        let camera_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera BG"),
            layout: &camera_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buf.as_entire_binding(),
            }],
        });

        // ==== Texture BGL: sampler + one view per slot ====
        let mut texture_entries = vec![BindGroupLayoutEntry {
            binding: 0,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Sampler(SamplerBindingType::Filtering),
            count: None,
        }];
        texture_entries.extend((0..MODEL_TEXTURE_SLOTS.len()).map(|slot| BindGroupLayoutEntry {
            binding: slot as u32 + 1,
            visibility: ShaderStages::FRAGMENT,
            ty: BindingType::Texture {
                sample_type: TextureSampleType::Float { filterable: true },
                view_dimension: TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }));
        let texture_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Material BGL"),
            entries: &texture_entries,
        });

        // ==== Pipeline ====
        let attributes = vertex_attributes();
        let vertex_layout = VertexBufferLayout {
            array_stride: Vertex::STRIDE,
            step_mode: VertexStepMode::Vertex,
            attributes: &attributes,
        };
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Model PipelineLayout"),
            bind_group_layouts: &[&camera_bgl, &texture_bgl],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Model Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex_layout],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: COLOR_FORMAT,
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline: Arc::new(pipeline),
            texture_bgl,
            camera_buf,
            camera_bg: Arc::new(camera_bg),
        }
    }

    /// Upload `camera`'s view-projection with an identity model transform.
    pub fn set_view(&self, gpu: &WgpuBackend, camera: &Camera, aspect: f32) {
        self.set_camera(gpu, camera.proj_view(aspect), Mat4::IDENTITY);
    }

    /// Upload the per-frame camera and model transform.
    pub fn set_camera(&self, gpu: &WgpuBackend, view_proj: Mat4, model: Mat4) {
        let cam = CameraUniform {
            view_proj: view_proj.to_cols_array_2d(),
            model: model.to_cols_array_2d(),
        };
        gpu.queue
            .write_buffer(&self.camera_buf, 0, bytemuck::bytes_of(&cam));
    }
}

/// Color + depth attachments rendered into without a window.
pub struct OffscreenTarget {
    _color: wgpu::Texture,
    color_view: TextureView,
    depth_view: TextureView,
    width: u32,
    height: u32,
}

impl OffscreenTarget {
    pub fn new(gpu: &WgpuBackend, width: u32, height: u32) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let size = Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color = gpu.device.create_texture(&TextureDescriptor {
            label: Some("OffscreenColor"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = gpu.device.create_texture(&TextureDescriptor {
            label: Some("DepthTex"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Self {
            color_view: color.create_view(&TextureViewDescriptor::default()),
            depth_view: depth.create_view(&TextureViewDescriptor::default()),
            _color: color,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

struct RecordedDraw {
    pipeline: Arc<RenderPipeline>,
    camera_bg: Arc<BindGroup>,
    material_bg: BindGroup,
    vertices: Arc<Buffer>,
    indices: Arc<Buffer>,
    index_count: u32,
}

/// [`GpuBackend`] over a wgpu device. Draws are recorded and replayed by
/// [`WgpuBackend::render_to`].
pub struct WgpuBackend {
    device: Device,
    queue: Queue,
    sampler: Sampler,
    fallback: Arc<GpuTexture>,
    bindings: SlotBindings<WgpuTexture>,
    draws: Vec<RecordedDraw>,
}

impl WgpuBackend {
    /// Create a device without a presentation surface.
    pub fn new_headless(backends: wgpu::Backends) -> Result<Self> {
        pollster::block_on(Self::request(backends))
    }

    async fn request(backends: wgpu::Backends) -> Result<Self> {
        let instance = Instance::new(&InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("Model Device"),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await
            .context("request_device failed")?;

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("Model Sampler"),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Linear,
            ..Default::default()
        });
        let fallback = upload_texture(&device, &queue, "Fallback White", &TextureData::white());

        Ok(Self {
            device,
            queue,
            sampler,
            fallback: Arc::new(fallback),
            bindings: SlotBindings::new(),
            draws: Vec::new(),
        })
    }

    /// Replay recorded draws into `target` and submit. Returns the number of draws.
    pub fn render_to(&mut self, target: &OffscreenTarget) -> usize {
        let draws = std::mem::take(&mut self.draws);
        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("ModelEncoder"),
            });

        {
            let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("ModelPass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &target.color_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.05,
                            b: 0.08,
                            a: 1.0,
                        }),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            for draw in &draws {
                rpass.set_pipeline(&draw.pipeline);
                rpass.set_bind_group(0, &*draw.camera_bg, &[]);
                rpass.set_bind_group(1, &draw.material_bg, &[]);
                rpass.set_vertex_buffer(0, draw.vertices.slice(..));
                rpass.set_index_buffer(draw.indices.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.queue.submit(Some(encoder.finish()));
        draws.len()
    }
}

impl GpuBackend for WgpuBackend {
    type Buffer = Arc<Buffer>;
    type Texture = WgpuTexture;
    type Program = ModelProgram;

    fn create_vertex_buffer(&mut self, label: &str, vertices: &[Vertex]) -> Arc<Buffer> {
        Arc::new(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: BufferUsages::VERTEX,
        }))
    }

    fn create_index_buffer(&mut self, label: &str, indices: &[u32]) -> Arc<Buffer> {
        Arc::new(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(indices),
            usage: BufferUsages::INDEX,
        }))
    }

    fn create_texture(&mut self, label: &str, image: &TextureData) -> WgpuTexture {
        let texture = upload_texture(&self.device, &self.queue, label, image);
        WgpuTexture(Some(Arc::new(texture)))
    }

    fn invalid_texture(&self) -> WgpuTexture {
        WgpuTexture(None)
    }

    fn set_uniform_int(&mut self, _program: &ModelProgram, name: &str, value: i32) {
        if !self.bindings.set_uniform(name, value) {
            log::trace!("uniform '{}' is not used by the model program", name);
        }
    }

    fn bind_texture(&mut self, unit: u32, texture: &WgpuTexture) {
        self.bindings.bind(unit, texture.clone());
    }

    fn draw_indexed(
        &mut self,
        program: &ModelProgram,
        vertices: &Arc<Buffer>,
        indices: &Arc<Buffer>,
        index_count: u32,
    ) {
        let fallback = &self.fallback;
        let slots = self
            .bindings
            .take()
            .map(|bound| bound.map_or_else(|| fallback.clone(), |tex| tex.or_fallback(fallback)));

        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: BindingResource::Sampler(&self.sampler),
        }];
        entries.extend(slots.iter().enumerate().map(|(i, tex)| wgpu::BindGroupEntry {
            binding: i as u32 + 1,
            resource: BindingResource::TextureView(&tex.view),
        }));
        let material_bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material BG"),
            layout: &program.texture_bgl,
            entries: &entries,
        });

        self.draws.push(RecordedDraw {
            pipeline: program.pipeline.clone(),
            camera_bg: program.camera_bg.clone(),
            material_bg,
            vertices: vertices.clone(),
            indices: indices.clone(),
            index_count,
        });
    }
}

/// Create a mipmapped RGBA texture and upload every level.
fn upload_texture(device: &Device, queue: &Queue, label: &str, image: &TextureData) -> GpuTexture {
    let mips = image.mip_chain();
    let texture = device.create_texture(&TextureDescriptor {
        label: Some(label),
        size: Extent3d {
            width: image.width.max(1),
            height: image.height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: mips.len() as u32,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TEXTURE_FORMAT,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (level, mip) in mips.iter().enumerate() {
        queue.write_texture(
            TexelCopyTextureInfo {
                texture: &texture,
                mip_level: level as u32,
                origin: Origin3d::ZERO,
                aspect: TextureAspect::All,
            },
            &mip.data,
            TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(mip.bytes_per_pixel() * mip.width),
                rows_per_image: Some(mip.height),
            },
            Extent3d {
                width: mip.width,
                height: mip.height,
                depth_or_array_layers: 1,
            },
        );
    }

    let view = texture.create_view(&TextureViewDescriptor::default());
    GpuTexture {
        _texture: texture,
        view,
    }
}

/// Vertex attributes from the layout table of [`Vertex`].
fn vertex_attributes() -> Vec<wgpu::VertexAttribute> {
    Vertex::ATTRIBUTES
        .iter()
        .map(|a| wgpu::VertexAttribute {
            format: match a.components {
                2 => VertexFormat::Float32x2,
                3 => VertexFormat::Float32x3,
                _ => VertexFormat::Float32x4,
            },
            offset: a.offset,
            shader_location: a.location,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_attributes_match_layout_table() {
        let attrs = vertex_attributes();
        assert_eq!(attrs.len(), 5);
        assert_eq!(attrs[2].format, VertexFormat::Float32x2);
        assert_eq!(attrs[4].offset, 44);
        let end = attrs[4].offset + attrs[4].format.size();
        assert_eq!(end, Vertex::STRIDE);
    }

    #[test]
    fn invalid_handle_samples_fallback() {
        let white = Arc::new(0u32);
        let invalid: WgpuTexture<u32> = WgpuTexture(None);
        let wood = WgpuTexture(Some(Arc::new(7u32)));
        assert!(!invalid.is_valid());
        assert!(wood.is_valid());
        assert_eq!(*invalid.or_fallback(&white), 0);
        assert_eq!(*wood.or_fallback(&white), 7);
        assert!(!WgpuTexture::<u32>::default().is_valid());
    }

    #[test]
    fn uniforms_route_units_to_slots() {
        let mut bindings = SlotBindings::new();
        assert!(bindings.set_uniform("texture_normal1", 0));
        assert!(bindings.set_uniform("texture_diffuse1", 1));
        bindings.bind(0, "normal.png");
        bindings.bind(1, "albedo.png");

        assert_eq!(
            bindings.take(),
            [Some("albedo.png"), None, Some("normal.png"), None]
        );
    }

    #[test]
    fn unknown_and_unbound_slots_resolve_to_none() {
        let mut bindings = SlotBindings::new();
        // second diffuse has no slot in the model program
        assert!(!bindings.set_uniform("texture_diffuse2", 0));
        bindings.bind(0, "b.png");
        // uniform pointing at a unit nothing was bound to
        assert!(bindings.set_uniform("texture_specular1", 3));
        assert!(bindings.set_uniform("texture_height1", -1));

        assert_eq!(bindings.take(), [None, None, None, None]);
    }

    #[test]
    fn bindings_do_not_leak_into_next_draw() {
        let mut bindings = SlotBindings::new();
        bindings.set_uniform("texture_diffuse1", 0);
        bindings.bind(0, 11u32);
        assert_eq!(bindings.take()[0], Some(11));

        // next draw sets the name but binds nothing
        bindings.set_uniform("texture_diffuse1", 0);
        assert_eq!(bindings.take(), [None; 4]);

        bindings.bind(0, 12);
        assert_eq!(bindings.take()[0], None);
    }
}

//! Entry point: import a model and fly the camera around it for a few frames.
//! Runs without a window, either recording into the headless backend or
//! rendering offscreen through wgpu.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use corelib::{Camera, CameraConfig, CameraMovement, vec3};
use renderer::{
    AssetImporter, GpuBackend, HeadlessBackend, Model, ModelProgram, OffscreenTarget, ProgramId,
    WgpuBackend,
};

/// Fixed step for the scripted fly-through.
const FRAME_DT: f32 = 1.0 / 60.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum BackendKind {
    Headless,
    Gpu,
}

fn parse_backend_kind_arg() -> BackendKind {
    // Accept: --backend=headless|gpu
    let mut kind = BackendKind::Headless;
    for arg in std::env::args() {
        if let Some(val) = arg.strip_prefix("--backend=") {
            kind = match val.to_ascii_lowercase().as_str() {
                "headless" | "none" => BackendKind::Headless,
                "gpu" | "wgpu" => BackendKind::Gpu,
                other => {
                    log::warn!("Unknown backend '{}', falling back to headless.", other);
                    BackendKind::Headless
                }
            };
        }
    }
    kind
}

fn parse_gpu_backend_arg() -> wgpu::Backends {
    // Accept: --gpu-backend=auto|vulkan|dx12|metal|gl
    let mut backends = wgpu::Backends::all(); // default = auto
    for arg in std::env::args() {
        if let Some(val) = arg.strip_prefix("--gpu-backend=") {
            backends = match val.to_ascii_lowercase().as_str() {
                "auto" => wgpu::Backends::all(),
                "vulkan" | "vk" => wgpu::Backends::VULKAN,
                "dx12" | "d3d12" => wgpu::Backends::DX12,
                "metal" | "mtl" => wgpu::Backends::METAL,
                "gl" | "opengl" | "gles" => wgpu::Backends::GL,
                other => {
                    log::warn!("Unknown GPU backend '{}', falling back to auto.", other);
                    wgpu::Backends::all()
                }
            };
        }
    }
    backends
}

fn parse_model_arg() -> Option<PathBuf> {
    // --model=PATH, or the first positional argument
    let mut positional = None;
    for arg in std::env::args().skip(1) {
        if let Some(v) = arg.strip_prefix("--model=") {
            return Some(PathBuf::from(v));
        }
        if !arg.starts_with("--") && positional.is_none() {
            positional = Some(PathBuf::from(arg));
        }
    }
    positional
}

fn parse_size_args() -> (u32, u32) {
    let mut w: Option<u32> = None;
    let mut h: Option<u32> = None;

    for arg in std::env::args() {
        if let Some(v) = arg.strip_prefix("--size=") {
            if let Some((sw, sh)) = v.split_once('x').or_else(|| v.split_once('X')) {
                if let (Ok(pw), Ok(ph)) = (sw.parse::<u32>(), sh.parse::<u32>()) {
                    w = Some(pw);
                    h = Some(ph);
                }
            }
        } else if let Some(v) = arg.strip_prefix("--width=") {
            if let Ok(pw) = v.parse::<u32>() {
                w = Some(pw);
            }
        } else if let Some(v) = arg.strip_prefix("--height=") {
            if let Ok(ph) = v.parse::<u32>() {
                h = Some(ph);
            }
        }
    }

    let ww = w.unwrap_or(1280).max(1);
    let hh = h.unwrap_or(720).max(1);
    (ww, hh)
}

fn parse_frames_arg() -> u32 {
    std::env::args()
        .filter_map(|arg| arg.strip_prefix("--frames=").and_then(|v| v.parse::<u32>().ok()))
        .last()
        .unwrap_or(120)
}

fn parse_locked_y_arg() -> bool {
    // --locked-y[=on|off], default off
    for arg in std::env::args() {
        if arg == "--locked-y" {
            return true;
        }
        if let Some(val) = arg.strip_prefix("--locked-y=") {
            return matches!(
                val.to_ascii_lowercase().as_str(),
                "1" | "true" | "on" | "yes"
            );
        }
    }
    false
}

/// One frame of the scripted fly-through: walk forward, strafe, then orbit the gaze.
fn fly_step(camera: &mut Camera, frame: u32) {
    let movement = match (frame / 30) % 4 {
        0 => CameraMovement::Forward,
        1 => CameraMovement::Right,
        2 => CameraMovement::Backward,
        _ => CameraMovement::Left,
    };
    camera.process_move(movement, FRAME_DT);
    camera.process_look(4.0, if frame % 60 < 30 { 1.0 } else { -1.0 }, true);
    if frame % 90 == 0 {
        camera.process_zoom(1.0);
    }
}

fn run_frames<B: GpuBackend>(
    model: &Model<B>,
    backend: &mut B,
    program: &B::Program,
    camera: &mut Camera,
    frames: u32,
    mut present: impl FnMut(&mut B, &Camera),
) {
    for frame in 0..frames {
        fly_step(camera, frame);
        model.draw(backend, program);
        present(backend, camera);
    }
}

fn run_headless(model_path: &Path, camera: &mut Camera, frames: u32, aspect: f32) -> Result<()> {
    let mut gpu = HeadlessBackend::new();
    let model = AssetImporter::new()
        .import_scene(&mut gpu, model_path)
        .with_context(|| format!("Failed to import {}", model_path.display()))?;
    log::info!(
        "Loaded {} meshes, {} vertices, {} triangles, {} textures",
        model.meshes().len(),
        model.vertex_count(),
        model.triangle_count(),
        model.textures().upload_count()
    );

    let mut draws = 0usize;
    let mut commands = 0usize;
    run_frames(&model, &mut gpu, &ProgramId(1), camera, frames, |gpu, camera| {
        log::trace!("view-projection {:?}", camera.proj_view(aspect));
        draws += gpu.draw_count();
        commands += gpu.take_commands().len();
    });
    log::info!(
        "Recorded {} draws ({} commands) over {} frames",
        draws,
        commands,
        frames
    );
    Ok(())
}

fn run_gpu(
    model_path: &Path,
    camera: &mut Camera,
    frames: u32,
    backends: wgpu::Backends,
    (width, height): (u32, u32),
) -> Result<()> {
    let mut gpu = WgpuBackend::new_headless(backends)?;
    let model = AssetImporter::new()
        .import_scene(&mut gpu, model_path)
        .with_context(|| format!("Failed to import {}", model_path.display()))?;
    log::info!(
        "Loaded {} meshes, {} triangles, {} textures",
        model.meshes().len(),
        model.triangle_count(),
        model.textures().upload_count()
    );

    let program = ModelProgram::new(&gpu);
    let target = OffscreenTarget::new(&gpu, width, height);
    let mut submitted = 0usize;
    let program_ref = &program;
    run_frames(&model, &mut gpu, program_ref, camera, frames, |gpu, camera| {
        program_ref.set_view(gpu, camera, target.aspect());
        submitted += gpu.render_to(&target);
    });
    log::info!("Submitted {} draws over {} frames", submitted, frames);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let Some(model_path) = parse_model_arg() else {
        bail!("usage: app [--model=]PATH [--backend=headless|gpu] [--gpu-backend=auto|vulkan|dx12|metal|gl] [--size=WxH] [--frames=N] [--locked-y]");
    };
    let kind = parse_backend_kind_arg();
    let (width, height) = parse_size_args();
    let frames = parse_frames_arg();

    let mut camera = Camera::new(CameraConfig {
        position: vec3(0.0, 1.0, 5.0),
        locked_to_ground: parse_locked_y_arg(),
        ..CameraConfig::default()
    });
    log::info!(
        "Starting viewer. Backend: {:?}, model={}, size={}x{}, frames={}",
        kind,
        model_path.display(),
        width,
        height,
        frames
    );

    match kind {
        BackendKind::Headless => {
            run_headless(&model_path, &mut camera, frames, width as f32 / height as f32)?
        }
        BackendKind::Gpu => run_gpu(
            &model_path,
            &mut camera,
            frames,
            parse_gpu_backend_arg(),
            (width, height),
        )?,
    }

    log::info!(
        "Camera ended at {:?} (yaw {:.1}, pitch {:.1}, zoom {:.1})",
        camera.position,
        camera.yaw(),
        camera.pitch(),
        camera.zoom()
    );
    log::info!("Graceful shutdown. Bye!");
    Ok(())
}

//! Free-fly Euler camera (right-handed, Y-up).

use crate::{Mat4, Vec3};

/// Hard pitch limit in degrees; stays short of 90 so `front x world_up` never degenerates.
pub const PITCH_LIMIT: f32 = 89.0;
pub const MIN_ZOOM: f32 = 1.0;
pub const MAX_ZOOM: f32 = 45.0;

/// Discrete movement directions fed by the input layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

/// Startup parameters for [`Camera`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraConfig {
    pub position: Vec3,
    pub world_up: Vec3,
    /// Degrees.
    pub yaw: f32,
    /// Degrees.
    pub pitch: f32,
    pub movement_speed: f32,
    pub look_sensitivity: f32,
    /// Vertical field of view in degrees.
    pub zoom: f32,
    /// Keep `position.y` pinned to 0 after every move.
    pub locked_to_ground: bool,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            world_up: Vec3::Y,
            yaw: -90.0,
            pitch: 0.0,
            movement_speed: 2.5,
            look_sensitivity: 0.1,
            zoom: 45.0,
            locked_to_ground: false,
            z_near: 0.1,
            z_far: 100.0,
        }
    }
}

/// Euler-angle camera. `front`, `up` and `right` are derived from `yaw`/`pitch`
/// and only change through [`Camera::process_look`].
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub position: Vec3,
    world_up: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    yaw: f32,
    pitch: f32,
    pub movement_speed: f32,
    pub look_sensitivity: f32,
    zoom: f32,
    pub locked_to_ground: bool,
    pub z_near: f32,
    pub z_far: f32,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        let mut camera = Self {
            position: config.position,
            world_up: config.world_up.normalize(),
            front: Vec3::NEG_Z,
            up: config.world_up.normalize(),
            right: Vec3::X,
            yaw: config.yaw,
            pitch: config.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT),
            movement_speed: config.movement_speed,
            look_sensitivity: config.look_sensitivity,
            zoom: config.zoom.clamp(MIN_ZOOM, MAX_ZOOM),
            locked_to_ground: config.locked_to_ground,
            z_near: config.z_near,
            z_far: config.z_far,
        };
        camera.update_basis();
        camera
    }

    /// Camera at `position` with every other setting defaulted.
    pub fn at(position: Vec3) -> Self {
        Self::new(CameraConfig {
            position,
            ..CameraConfig::default()
        })
    }

    #[inline]
    pub fn front(&self) -> Vec3 {
        self.front
    }

    #[inline]
    pub fn up(&self) -> Vec3 {
        self.up
    }

    #[inline]
    pub fn right(&self) -> Vec3 {
        self.right
    }

    #[inline]
    pub fn world_up(&self) -> Vec3 {
        self.world_up
    }

    #[inline]
    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    #[inline]
    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Current vertical field of view in degrees.
    #[inline]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Translate along the basis: `position += dir * movement_speed * dt`.
    pub fn process_move(&mut self, direction: CameraMovement, dt: f32) {
        let velocity = self.movement_speed * dt;
        let offset = match direction {
            CameraMovement::Forward => self.front,
            CameraMovement::Backward => -self.front,
            CameraMovement::Left => -self.right,
            CameraMovement::Right => self.right,
        };
        self.position += offset * velocity;
        if self.locked_to_ground {
            self.position.y = 0.0;
        }
    }

    /// Apply a look delta (e.g. mouse offset) scaled by `look_sensitivity`.
    pub fn process_look(&mut self, dx: f32, dy: f32, constrain_pitch: bool) {
        self.yaw += dx * self.look_sensitivity;
        self.pitch += dy * self.look_sensitivity;
        if constrain_pitch {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }
        self.update_basis();
    }

    /// Narrow (positive delta) or widen the field of view, clamped to `[1, 45]` degrees.
    pub fn process_zoom(&mut self, scroll_delta: f32) {
        self.zoom = (self.zoom - scroll_delta).clamp(MIN_ZOOM, MAX_ZOOM);
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Perspective projection from the zoom field of view, depth in `[0, 1]`.
    #[inline]
    pub fn projection(&self, aspect: f32) -> Mat4 {
        Mat4::perspective_rh(
            self.zoom.to_radians(),
            aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    #[inline]
    pub fn proj_view(&self, aspect: f32) -> Mat4 {
        self.projection(aspect) * self.view()
    }

    fn update_basis(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());
        let front = Vec3::new(yaw.cos() * pitch.cos(), pitch.sin(), yaw.sin() * pitch.cos());
        self.front = front.normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}

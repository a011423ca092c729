//! Core types: math re-exports and the fly camera.

pub use glam::{Mat4, Vec2, Vec3, vec3};

pub mod camera;

pub use camera::{Camera, CameraConfig, CameraMovement};

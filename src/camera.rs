//! Perspective camera.
//!
//! Uses a right-handed look-at view and a perspective projection with depth
//! in 0..1 (the wgpu convention), so the software rasterizer and the GPU
//! backend agree on clip space.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 30.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov: 45.0,
            near: 1.0,
            far: 100.0,
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            ..Default::default()
        }
    }

    pub fn with_fov(mut self, fov: f32) -> Self {
        self.fov = fov;
        self
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self, aspect: f32) -> Mat4 {
        let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
        Mat4::perspective_rh(
            self.fov.clamp(1.0, 179.0).to_radians(),
            aspect,
            self.near.max(1e-4),
            self.far.max(self.near + 1e-3),
        )
    }

    pub fn view_projection_matrix(&self, aspect: f32) -> Mat4 {
        self.projection_matrix(aspect) * self.view_matrix()
    }

    /// Rotate the camera position around its target about the world Y axis.
    pub fn orbit_y(&mut self, angle: f32) {
        let offset = self.position - self.target;
        let rotated = Mat4::from_rotation_y(angle).transform_vector3(offset);
        self.position = self.target + rotated;
    }

    /// Project a world-space point into clip space.
    pub fn to_clip(&self, aspect: f32, point: Vec3) -> Vec4 {
        self.view_projection_matrix(aspect) * point.extend(1.0)
    }
}

/// GPU-ready camera matrix.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct CameraUniforms {
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniforms {
    pub fn from_camera(camera: &Camera, width: u32, height: u32) -> Self {
        let aspect = width.max(1) as f32 / height.max(1) as f32;
        Self {
            view_proj: camera.view_projection_matrix(aspect).to_cols_array_2d(),
        }
    }
}

//! Renderer collaborator used by the compositor.
//!
//! A backend knows how to allocate pixel targets, draw a scene into one,
//! run the threshold/blur glow effect in place, blend two targets into a
//! third, and add further glow targets on top. The compositor drives these in a fixed order every frame.

use image::RgbaImage;

use crate::camera::Camera;
use crate::scene_graph::SceneGraph;

/// What a target is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetUsage {
    /// HDR off-screen buffer (glow, base).
    Offscreen,
    /// Final displayable image.
    Output,
}

/// Parameters for the in-place glow effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlowParams {
    pub threshold: f32,
    /// Blur radius in pixels.
    pub radius: f32,
    /// GPU glow chain resolution divisor.
    pub downsample: u32,
}

/// Parameters for the additive composite.
///
/// `out = (base_weight * base + glow_weight * glow) * exposure`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeParams {
    pub base_weight: f32,
    pub glow_weight: f32,
    pub exposure: f32,
    pub clamp: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to allocate {width}x{height} target '{label}': {message}")]
    Allocation {
        label: String,
        width: u32,
        height: u32,
        message: String,
    },
    #[error("no suitable GPU adapter found")]
    AdapterNotFound,
    #[error("device error: {0}")]
    Device(String),
    #[error("readback failed: {0}")]
    Readback(String),
    #[error("target size mismatch: expected {expected:?}, got {actual:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

pub trait RenderBackend {
    type Target;

    /// Allocate a target. Allocation failure is fatal to the caller.
    fn create_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        usage: TargetUsage,
    ) -> Result<Self::Target, BackendError>;

    fn target_size(&self, target: &Self::Target) -> (u32, u32);

    /// Clear `target` to `clear` and draw every drawable object in `scene`.
    fn render_scene(
        &mut self,
        scene: &SceneGraph,
        camera: &Camera,
        target: &mut Self::Target,
        clear: [f32; 4],
    ) -> Result<(), BackendError>;

    /// Replace `target` with its thresholded and blurred version.
    fn apply_glow(&mut self, target: &mut Self::Target, params: &GlowParams) -> Result<(), BackendError>;

    /// Blend `base` and `glow` into `output`, sampling both at matching UVs.
    fn composite(
        &mut self,
        base: &Self::Target,
        glow: &Self::Target,
        output: &mut Self::Target,
        params: &CompositeParams,
    ) -> Result<(), BackendError>;

    /// Add `weight * glow` onto `output` in place, keeping its alpha.
    fn add_glow(
        &mut self,
        glow: &Self::Target,
        output: &mut Self::Target,
        weight: f32,
        clamp: bool,
    ) -> Result<(), BackendError>;

    /// Resize any internal effect resources to a new viewport.
    fn resize_effects(&mut self, width: u32, height: u32, downsample: u32) -> Result<(), BackendError>;

    /// Read a target back as 8-bit RGBA.
    fn snapshot(&mut self, target: &Self::Target) -> Result<RgbaImage, BackendError>;
}

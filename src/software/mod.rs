//! Deterministic CPU backend.
//!
//! Renders at full resolution and ignores the glow downsample factor, so the
//! same scene always produces the same pixels. Used for headless runs and
//! tests.

pub mod bloom;
pub mod frame_buffer;
pub mod raster;

use image::RgbaImage;

use crate::backend::{BackendError, CompositeParams, GlowParams, RenderBackend, TargetUsage};
use crate::camera::Camera;
use crate::scene_graph::SceneGraph;

pub use frame_buffer::FrameBuffer;
pub use raster::GeometryCache;

/// Largest width or height a software target may have.
pub const MAX_TARGET_DIMENSION: u32 = 8192;

pub struct SoftwareBackend {
    geometry: GeometryCache,
    scratch: Vec<[f32; 4]>,
    effect_size: (u32, u32),
    targets_created: u64,
    fragments_last_pass: u32,
}

impl SoftwareBackend {
    pub fn new() -> Self {
        Self {
            geometry: GeometryCache::new(),
            scratch: Vec::new(),
            effect_size: (0, 0),
            targets_created: 0,
            fragments_last_pass: 0,
        }
    }

    /// How many targets have been allocated so far.
    pub fn targets_created(&self) -> u64 {
        self.targets_created
    }

    /// Fragments that passed the depth test during the last scene render.
    pub fn fragments_last_pass(&self) -> u32 {
        self.fragments_last_pass
    }

    pub fn effect_size(&self) -> (u32, u32) {
        self.effect_size
    }
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderBackend for SoftwareBackend {
    type Target = FrameBuffer;

    fn create_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        _usage: TargetUsage,
    ) -> Result<FrameBuffer, BackendError> {
        if width == 0 || height == 0 || width > MAX_TARGET_DIMENSION || height > MAX_TARGET_DIMENSION {
            return Err(BackendError::Allocation {
                label: label.to_string(),
                width,
                height,
                message: format!("dimensions must be within 1..={}", MAX_TARGET_DIMENSION),
            });
        }
        self.targets_created += 1;
        log::debug!("Allocated software target '{}' {}x{}", label, width, height);
        Ok(FrameBuffer::new(label, width, height))
    }

    fn target_size(&self, target: &FrameBuffer) -> (u32, u32) {
        target.size()
    }

    fn render_scene(
        &mut self,
        scene: &SceneGraph,
        camera: &Camera,
        target: &mut FrameBuffer,
        clear: [f32; 4],
    ) -> Result<(), BackendError> {
        target.clear(clear);
        self.fragments_last_pass = raster::draw_scene(target, scene, camera, &self.geometry);
        Ok(())
    }

    fn apply_glow(&mut self, target: &mut FrameBuffer, params: &GlowParams) -> Result<(), BackendError> {
        bloom::threshold(target, params.threshold);
        bloom::blur(target, params.radius, &mut self.scratch);
        Ok(())
    }

    fn composite(
        &mut self,
        base: &FrameBuffer,
        glow: &FrameBuffer,
        output: &mut FrameBuffer,
        params: &CompositeParams,
    ) -> Result<(), BackendError> {
        let expected = output.size();
        for actual in [base.size(), glow.size()] {
            if actual != expected {
                return Err(BackendError::SizeMismatch { expected, actual });
            }
        }
        bloom::composite(base, glow, output, params);
        Ok(())
    }

    fn add_glow(
        &mut self,
        glow: &FrameBuffer,
        output: &mut FrameBuffer,
        weight: f32,
        clamp: bool,
    ) -> Result<(), BackendError> {
        if glow.size() != output.size() {
            return Err(BackendError::SizeMismatch {
                expected: output.size(),
                actual: glow.size(),
            });
        }
        bloom::add_glow(glow, output, weight, clamp);
        Ok(())
    }

    fn resize_effects(&mut self, width: u32, height: u32, _downsample: u32) -> Result<(), BackendError> {
        self.effect_size = (width, height);
        self.scratch = Vec::with_capacity(width as usize * height as usize);
        Ok(())
    }

    fn snapshot(&mut self, target: &FrameBuffer) -> Result<RgbaImage, BackendError> {
        Ok(target.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_oversized_target() {
        let mut backend = SoftwareBackend::new();
        let err = backend
            .create_target("huge", MAX_TARGET_DIMENSION + 1, 4, TargetUsage::Offscreen)
            .unwrap_err();
        assert!(matches!(err, BackendError::Allocation { .. }));
        assert_eq!(backend.targets_created(), 0);
    }

    #[test]
    fn test_composite_size_mismatch() {
        let mut backend = SoftwareBackend::new();
        let base = backend.create_target("base", 4, 4, TargetUsage::Offscreen).unwrap();
        let glow = backend.create_target("glow", 2, 2, TargetUsage::Offscreen).unwrap();
        let mut out = backend.create_target("out", 4, 4, TargetUsage::Output).unwrap();
        let params = CompositeParams {
            base_weight: 1.0,
            glow_weight: 1.0,
            exposure: 1.0,
            clamp: false,
        };
        let err = backend.composite(&base, &glow, &mut out, &params).unwrap_err();
        assert!(matches!(err, BackendError::SizeMismatch { actual: (2, 2), .. }));
    }

    #[test]
    fn test_add_glow_size_mismatch() {
        let mut backend = SoftwareBackend::new();
        let glow = backend.create_target("group", 3, 3, TargetUsage::Offscreen).unwrap();
        let mut out = backend.create_target("out", 4, 4, TargetUsage::Output).unwrap();
        let err = backend.add_glow(&glow, &mut out, 1.0, false).unwrap_err();
        assert!(matches!(err, BackendError::SizeMismatch { actual: (3, 3), .. }));
    }

    #[test]
    fn test_render_clears_to_color() {
        let mut backend = SoftwareBackend::new();
        let mut target = backend.create_target("base", 3, 3, TargetUsage::Offscreen).unwrap();
        let clear = [0.0627, 0.1255, 0.251, 1.0];
        backend
            .render_scene(&SceneGraph::new(), &Camera::default(), &mut target, clear)
            .unwrap();
        assert_eq!(target.pixel(1, 1), clear);
        assert_eq!(backend.fragments_last_pass(), 0);
    }
}

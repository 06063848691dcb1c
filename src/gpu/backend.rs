//! wgpu implementation of [`RenderBackend`].

use image::RgbaImage;

use crate::backend::{BackendError, CompositeParams, GlowParams, RenderBackend, TargetUsage};
use crate::camera::Camera;
use crate::config::DEFAULT_DOWNSAMPLE;
use crate::scene_graph::SceneGraph;

use super::bloom_processor::BloomProcessor;
use super::composite::CompositePass;
use super::context::GpuContext;
use super::readback::read_texture_rgba8;
use super::renderer::SceneRenderer;
use super::{DEPTH_FORMAT, HDR_FORMAT, OUTPUT_FORMAT};

/// A GPU render target. Off-screen targets carry their own depth buffer.
pub struct GpuTarget {
    label: String,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    depth_view: Option<wgpu::TextureView>,
    width: u32,
    height: u32,
    usage: TargetUsage,
}

impl GpuTarget {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn view(&self) -> &wgpu::TextureView {
        &self.view
    }

    pub fn usage(&self) -> TargetUsage {
        self.usage
    }
}

pub struct GpuBackend {
    context: GpuContext,
    scene: SceneRenderer,
    bloom: BloomProcessor,
    composite: CompositePass,
}

impl GpuBackend {
    pub fn new(context: GpuContext, width: u32, height: u32) -> Self {
        let device = &context.device;
        let scene = SceneRenderer::new(device, HDR_FORMAT);
        let bloom = BloomProcessor::new(device, HDR_FORMAT, width, height, DEFAULT_DOWNSAMPLE);
        let composite = CompositePass::new(device, OUTPUT_FORMAT);
        Self {
            context,
            scene,
            bloom,
            composite,
        }
    }

    /// Create a backend on a headless device.
    pub fn headless(width: u32, height: u32) -> Result<Self, BackendError> {
        let context = GpuContext::headless_blocking()?;
        Ok(Self::new(context, width, height))
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn bloom(&self) -> &BloomProcessor {
        &self.bloom
    }
}

fn require(target: &GpuTarget, usage: TargetUsage, operation: &str) -> Result<(), BackendError> {
    if target.usage != usage {
        return Err(BackendError::Device(format!(
            "{} needs a {:?} target, '{}' is {:?}",
            operation, usage, target.label, target.usage
        )));
    }
    Ok(())
}

impl RenderBackend for GpuBackend {
    type Target = GpuTarget;

    fn create_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        usage: TargetUsage,
    ) -> Result<GpuTarget, BackendError> {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let (format, texture_usage) = match usage {
            TargetUsage::Offscreen => (
                HDR_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            ),
            TargetUsage::Output => (
                OUTPUT_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_SRC,
            ),
        };

        let (texture, depth) = self.context.catch_allocation(label, width, height, |device| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: texture_usage,
                view_formats: &[],
            });
            let depth = (usage == TargetUsage::Offscreen).then(|| {
                device.create_texture(&wgpu::TextureDescriptor {
                    label: Some(&format!("{} Depth", label)),
                    size,
                    mip_level_count: 1,
                    sample_count: 1,
                    dimension: wgpu::TextureDimension::D2,
                    format: DEPTH_FORMAT,
                    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                    view_formats: &[],
                })
            });
            (texture, depth)
        })?;

        log::debug!("Allocated GPU target '{}' {}x{} ({:?})", label, width, height, format);
        Ok(GpuTarget {
            label: label.to_string(),
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            texture,
            depth_view: depth.map(|d| d.create_view(&wgpu::TextureViewDescriptor::default())),
            width,
            height,
            usage,
        })
    }

    fn target_size(&self, target: &GpuTarget) -> (u32, u32) {
        (target.width, target.height)
    }

    fn render_scene(
        &mut self,
        scene: &SceneGraph,
        camera: &Camera,
        target: &mut GpuTarget,
        clear: [f32; 4],
    ) -> Result<(), BackendError> {
        require(target, TargetUsage::Offscreen, "scene pass")?;
        let Some(depth_view) = target.depth_view.as_ref() else {
            return Err(BackendError::Device(format!("target '{}' has no depth buffer", target.label)));
        };
        self.scene.render(
            &self.context.device,
            &self.context.queue,
            scene,
            camera,
            (target.width, target.height),
            &target.view,
            depth_view,
            clear,
        );
        Ok(())
    }

    fn apply_glow(&mut self, target: &mut GpuTarget, params: &GlowParams) -> Result<(), BackendError> {
        require(target, TargetUsage::Offscreen, "glow pass")?;
        if params.downsample != self.bloom.current_downsample() {
            self.bloom
                .resize(&self.context.device, target.width, target.height, params.downsample);
        }
        self.bloom
            .process(&self.context.device, &self.context.queue, &target.view, params);
        Ok(())
    }

    fn composite(
        &mut self,
        base: &GpuTarget,
        glow: &GpuTarget,
        output: &mut GpuTarget,
        params: &CompositeParams,
    ) -> Result<(), BackendError> {
        require(output, TargetUsage::Output, "composite")?;
        let expected = (output.width, output.height);
        for actual in [(base.width, base.height), (glow.width, glow.height)] {
            if actual != expected {
                return Err(BackendError::SizeMismatch { expected, actual });
            }
        }
        self.composite.render(
            &self.context.device,
            &self.context.queue,
            &base.view,
            &glow.view,
            &output.view,
            params,
        );
        Ok(())
    }

    fn add_glow(
        &mut self,
        glow: &GpuTarget,
        output: &mut GpuTarget,
        weight: f32,
        clamp: bool,
    ) -> Result<(), BackendError> {
        require(output, TargetUsage::Output, "glow add")?;
        if (glow.width, glow.height) != (output.width, output.height) {
            return Err(BackendError::SizeMismatch {
                expected: (output.width, output.height),
                actual: (glow.width, glow.height),
            });
        }
        self.composite.add(
            &self.context.device,
            &self.context.queue,
            &glow.view,
            &output.view,
            weight,
            clamp,
        );
        Ok(())
    }

    fn resize_effects(&mut self, width: u32, height: u32, downsample: u32) -> Result<(), BackendError> {
        self.bloom.resize(&self.context.device, width, height, downsample);
        Ok(())
    }

    fn snapshot(&mut self, target: &GpuTarget) -> Result<RgbaImage, BackendError> {
        require(target, TargetUsage::Output, "readback")?;
        read_texture_rgba8(
            &self.context.device,
            &self.context.queue,
            &target.texture,
            target.width,
            target.height,
        )
    }
}

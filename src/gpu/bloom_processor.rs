//! Multi-pass glow processor.
//!
//! Runs in place on an HDR target:
//! 1. Threshold pass - extract bright pixels into a downsampled buffer
//! 2. Separable blur - horizontal then vertical passes
//! 3. Upsample - write the blurred result back over the target

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::backend::GlowParams;

use super::pipeline::{self, QUAD_VERTICES};

/// Width of the soft knee above the threshold.
const THRESHOLD_KNEE: f32 = 0.01;

/// Uniforms for threshold pass
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct ThresholdUniforms {
    threshold: f32,
    soft_knee: f32,
    _padding: [f32; 2],
}

/// Uniforms for blur pass
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct BlurUniforms {
    direction_and_radius: [f32; 4], // xy = direction, z = radius, w = unused
}

pub struct BloomProcessor {
    // Textures for bloom processing (downsampled resolution)
    bloom_view_a: wgpu::TextureView,
    bloom_view_b: wgpu::TextureView,

    threshold_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    upsample_pipeline: wgpu::RenderPipeline,

    single_texture_layout: wgpu::BindGroupLayout,

    threshold_uniform_buffer: wgpu::Buffer,
    blur_h_uniform_buffer: wgpu::Buffer,
    blur_v_uniform_buffer: wgpu::Buffer,
    threshold_uniform_bind_group: wgpu::BindGroup,
    blur_h_uniform_bind_group: wgpu::BindGroup,
    blur_v_uniform_bind_group: wgpu::BindGroup,

    quad_vertex_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,

    bloom_width: u32,
    bloom_height: u32,
    format: wgpu::TextureFormat,
    current_downsample: u32,
}

impl BloomProcessor {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        downsample: u32,
    ) -> Self {
        let downsample = downsample.clamp(1, 8);
        let bloom_width = (width / downsample).max(1);
        let bloom_height = (height / downsample).max(1);

        let bloom_view_a = Self::create_bloom_texture(device, format, bloom_width, bloom_height, "Bloom A");
        let bloom_view_b = Self::create_bloom_texture(device, format, bloom_width, bloom_height, "Bloom B");

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Bloom Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Bloom Quad Buffer"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let single_texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Bloom Single Texture Layout"),
            entries: &pipeline::texture_entries(0),
        });
        let uniform_layout = pipeline::uniform_layout(device, "Bloom Uniform Layout");

        let threshold_pipeline = pipeline::create_fullscreen_pipeline(
            device,
            "Bloom Threshold Pipeline",
            include_str!("shader_post_bloom_threshold.wgsl"),
            &[&single_texture_layout, &uniform_layout],
            format,
        );
        let blur_pipeline = pipeline::create_fullscreen_pipeline(
            device,
            "Bloom Blur Pipeline",
            include_str!("shader_post_bloom_blur.wgsl"),
            &[&single_texture_layout, &uniform_layout],
            format,
        );
        let upsample_pipeline = pipeline::create_fullscreen_pipeline(
            device,
            "Bloom Upsample Pipeline",
            include_str!("shader_post_bloom_upsample.wgsl"),
            &[&single_texture_layout],
            format,
        );

        let (threshold_uniform_buffer, threshold_uniform_bind_group) = Self::create_uniform(
            device,
            &uniform_layout,
            "Bloom Threshold Uniform",
            std::mem::size_of::<ThresholdUniforms>(),
        );
        let (blur_h_uniform_buffer, blur_h_uniform_bind_group) = Self::create_uniform(
            device,
            &uniform_layout,
            "Bloom Blur H Uniform",
            std::mem::size_of::<BlurUniforms>(),
        );
        let (blur_v_uniform_buffer, blur_v_uniform_bind_group) = Self::create_uniform(
            device,
            &uniform_layout,
            "Bloom Blur V Uniform",
            std::mem::size_of::<BlurUniforms>(),
        );

        Self {
            bloom_view_a,
            bloom_view_b,
            threshold_pipeline,
            blur_pipeline,
            upsample_pipeline,
            single_texture_layout,
            threshold_uniform_buffer,
            blur_h_uniform_buffer,
            blur_v_uniform_buffer,
            threshold_uniform_bind_group,
            blur_h_uniform_bind_group,
            blur_v_uniform_bind_group,
            quad_vertex_buffer,
            sampler,
            bloom_width,
            bloom_height,
            format,
            current_downsample: downsample,
        }
    }

    fn create_uniform(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        label: &str,
        size: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        (buffer, bind_group)
    }

    fn create_bloom_texture(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        label: &str,
    ) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Resize bloom textures
    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32, downsample: u32) {
        let ds = downsample.clamp(1, 8);
        let bloom_w = (width / ds).max(1);
        let bloom_h = (height / ds).max(1);
        self.current_downsample = ds;

        if bloom_w == self.bloom_width && bloom_h == self.bloom_height {
            return;
        }

        self.bloom_width = bloom_w;
        self.bloom_height = bloom_h;
        self.bloom_view_a = Self::create_bloom_texture(device, self.format, bloom_w, bloom_h, "Bloom A");
        self.bloom_view_b = Self::create_bloom_texture(device, self.format, bloom_w, bloom_h, "Bloom B");
        log::debug!("Bloom buffers resized to {}x{} (downsample {})", bloom_w, bloom_h, ds);
    }

    pub fn current_downsample(&self) -> u32 {
        self.current_downsample
    }

    pub fn bloom_size(&self) -> (u32, u32) {
        (self.bloom_width, self.bloom_height)
    }

    fn texture_bind_group(&self, device: &wgpu::Device, label: &str, view: &wgpu::TextureView) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout: &self.single_texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    /// Replace the contents of `target` with its thresholded, blurred version.
    pub fn process(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        target: &wgpu::TextureView,
        params: &GlowParams,
    ) {
        // Radius is given in full-resolution pixels.
        let radius = params.radius / self.current_downsample as f32;

        queue.write_buffer(
            &self.threshold_uniform_buffer,
            0,
            bytemuck::bytes_of(&ThresholdUniforms {
                threshold: params.threshold,
                soft_knee: THRESHOLD_KNEE,
                _padding: [0.0; 2],
            }),
        );
        queue.write_buffer(
            &self.blur_h_uniform_buffer,
            0,
            bytemuck::bytes_of(&BlurUniforms {
                direction_and_radius: [1.0, 0.0, radius, 0.0],
            }),
        );
        queue.write_buffer(
            &self.blur_v_uniform_buffer,
            0,
            bytemuck::bytes_of(&BlurUniforms {
                direction_and_radius: [0.0, 1.0, radius, 0.0],
            }),
        );

        let target_group = self.texture_bind_group(device, "Bloom Target Bind Group", target);
        let a_group = self.texture_bind_group(device, "Bloom A Bind Group", &self.bloom_view_a);
        let b_group = self.texture_bind_group(device, "Bloom B Bind Group", &self.bloom_view_b);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Bloom Encoder"),
        });

        // 1. Threshold: target -> bloom_a (downsampled)
        pipeline::draw_fullscreen(
            &mut encoder,
            "Bloom Threshold Pass",
            &self.threshold_pipeline,
            &[&target_group, &self.threshold_uniform_bind_group],
            &self.quad_vertex_buffer,
            &self.bloom_view_a,
        );
        // 2. Horizontal blur: bloom_a -> bloom_b
        pipeline::draw_fullscreen(
            &mut encoder,
            "Bloom Blur H Pass",
            &self.blur_pipeline,
            &[&a_group, &self.blur_h_uniform_bind_group],
            &self.quad_vertex_buffer,
            &self.bloom_view_b,
        );
        // 3. Vertical blur: bloom_b -> bloom_a
        pipeline::draw_fullscreen(
            &mut encoder,
            "Bloom Blur V Pass",
            &self.blur_pipeline,
            &[&b_group, &self.blur_v_uniform_bind_group],
            &self.quad_vertex_buffer,
            &self.bloom_view_a,
        );
        // 4. Upsample: bloom_a -> target
        pipeline::draw_fullscreen(
            &mut encoder,
            "Bloom Upsample Pass",
            &self.upsample_pipeline,
            &[&a_group],
            &self.quad_vertex_buffer,
            target,
        );

        queue.submit(Some(encoder.finish()));
    }
}

//! Final additive blend of the base and glow targets.
//!
//! Extra glow groups are added afterwards with a one-to-one blend, reusing
//! the same shader with a zero base weight.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::backend::CompositeParams;

use super::pipeline::{self, QUAD_VERTICES};

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct CompositeUniforms {
    /// base weight, glow weight, exposure, clamp flag
    weights: [f32; 4],
}

pub struct CompositePass {
    pipeline: wgpu::RenderPipeline,
    add_pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    quad_vertex_buffer: wgpu::Buffer,
    sampler: wgpu::Sampler,
}

impl CompositePass {
    pub fn new(device: &wgpu::Device, output_format: wgpu::TextureFormat) -> Self {
        let [base_texture, base_sampler] = pipeline::texture_entries(0);
        let [glow_texture, glow_sampler] = pipeline::texture_entries(2);
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Composite Texture Layout"),
            entries: &[base_texture, base_sampler, glow_texture, glow_sampler],
        });
        let uniform_layout = pipeline::uniform_layout(device, "Composite Uniform Layout");

        let pipeline = pipeline::create_fullscreen_pipeline(
            device,
            "Composite Pipeline",
            include_str!("shader_composite.wgsl"),
            &[&texture_layout, &uniform_layout],
            output_format,
        );
        let add_pipeline = pipeline::create_fullscreen_pipeline_blended(
            device,
            "Composite Add Pipeline",
            include_str!("shader_composite.wgsl"),
            &[&texture_layout, &uniform_layout],
            output_format,
            pipeline::ADDITIVE_BLEND,
        );

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Composite Uniform Buffer"),
            size: std::mem::size_of::<CompositeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Uniform Bind Group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let quad_vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Composite Quad Buffer"),
            contents: bytemuck::cast_slice(QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        // Nearest: base and glow are sampled at the same texel centers.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Composite Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Self {
            pipeline,
            add_pipeline,
            texture_layout,
            uniform_buffer,
            uniform_bind_group,
            quad_vertex_buffer,
            sampler,
        }
    }

    fn texture_bind_group(
        &self,
        device: &wgpu::Device,
        base: &wgpu::TextureView,
        glow: &wgpu::TextureView,
    ) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composite Texture Bind Group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(base),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(glow),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        })
    }

    fn write_uniforms(&self, queue: &wgpu::Queue, base_weight: f32, glow_weight: f32, exposure: f32, clamp: bool) {
        let uniforms = CompositeUniforms {
            weights: [base_weight, glow_weight, exposure, if clamp { 1.0 } else { 0.0 }],
        };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        base: &wgpu::TextureView,
        glow: &wgpu::TextureView,
        output: &wgpu::TextureView,
        params: &CompositeParams,
    ) {
        self.write_uniforms(queue, params.base_weight, params.glow_weight, params.exposure, params.clamp);
        let texture_bind_group = self.texture_bind_group(device, base, glow);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Composite Encoder"),
        });
        pipeline::draw_fullscreen(
            &mut encoder,
            "Composite Pass",
            &self.pipeline,
            &[&texture_bind_group, &self.uniform_bind_group],
            &self.quad_vertex_buffer,
            output,
        );
        queue.submit(Some(encoder.finish()));
    }

    /// Add `weight * glow` on top of the current contents of `output`.
    pub fn add(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        glow: &wgpu::TextureView,
        output: &wgpu::TextureView,
        weight: f32,
        clamp: bool,
    ) {
        self.write_uniforms(queue, 0.0, weight, 1.0, clamp);
        let texture_bind_group = self.texture_bind_group(device, glow, glow);

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Composite Add Encoder"),
        });
        pipeline::draw_fullscreen_with(
            &mut encoder,
            "Composite Add Pass",
            &self.add_pipeline,
            &[&texture_bind_group, &self.uniform_bind_group],
            &self.quad_vertex_buffer,
            output,
            wgpu::LoadOp::Load,
        );
        queue.submit(Some(encoder.finish()));
    }
}

//! Scene pass: draws every drawable object with its current material.

use bytemuck::{Pod, Zeroable};

use crate::camera::{Camera, CameraUniforms};
use crate::scene_graph::{MeshType, ObjectKind, SceneGraph};

use super::mesh::{upload_line, MeshLibrary};
use super::pipeline;

/// Objects drawn per render pass. Larger scenes are split across passes.
const MAX_OBJECTS_PER_PASS: usize = 256;

/// Uniform buffer alignment (WebGPU minUniformBufferOffsetAlignment is typically 256 bytes)
const UNIFORM_ALIGNMENT: usize = 256;

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct ObjectUniforms {
    view_proj: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    color: [f32; 4],
    /// x = multiply by vertex colors
    params: [f32; 4],
    // Padding to reach 256-byte alignment (160 bytes of data + 96 bytes padding)
    _padding: [f32; 24],
}

enum DrawShape {
    Mesh(MeshType),
    Line(wgpu::Buffer, u32),
}

struct DrawItem {
    shape: DrawShape,
    uniforms: ObjectUniforms,
}

pub struct SceneRenderer {
    mesh_pipeline: wgpu::RenderPipeline,
    line_pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    meshes: MeshLibrary,
}

impl SceneRenderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Object Uniform Buffer (Dynamic)"),
            size: (UNIFORM_ALIGNMENT * MAX_OBJECTS_PER_PASS) as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<ObjectUniforms>() as u64),
                },
                count: None,
            }],
            label: Some("object_bind_group_layout"),
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &uniform_buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ObjectUniforms>() as u64),
                }),
            }],
            label: Some("object_bind_group"),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        Self {
            mesh_pipeline: pipeline::create_scene_pipeline(
                device,
                &pipeline_layout,
                format,
                wgpu::PrimitiveTopology::TriangleList,
            ),
            line_pipeline: pipeline::create_scene_pipeline(
                device,
                &pipeline_layout,
                format,
                wgpu::PrimitiveTopology::LineStrip,
            ),
            uniform_buffer,
            bind_group,
            meshes: MeshLibrary::new(device),
        }
    }

    fn collect(&self, device: &wgpu::Device, scene: &SceneGraph, camera: &CameraUniforms) -> Vec<DrawItem> {
        scene
            .renderables()
            .filter(|(_, object)| object.is_drawable())
            .filter_map(|(_, object)| {
                let material = object.material.as_ref()?;
                let shape = match &object.kind {
                    ObjectKind::Mesh(mesh_type) => DrawShape::Mesh(*mesh_type),
                    ObjectKind::Line(line) => {
                        let (buffer, count) = upload_line(device, line)?;
                        DrawShape::Line(buffer, count)
                    }
                };
                Some(DrawItem {
                    shape,
                    uniforms: ObjectUniforms {
                        view_proj: camera.view_proj,
                        model: object.transform.matrix().to_cols_array_2d(),
                        color: material.shaded_rgba(),
                        params: [if material.vertex_colors { 1.0 } else { 0.0 }, 0.0, 0.0, 0.0],
                        _padding: [0.0; 24],
                    },
                })
            })
            .collect()
    }

    /// Clear `color_view` and `depth_view`, then draw the scene into them.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        scene: &SceneGraph,
        camera: &Camera,
        size: (u32, u32),
        color_view: &wgpu::TextureView,
        depth_view: &wgpu::TextureView,
        clear: [f32; 4],
    ) {
        let camera = CameraUniforms::from_camera(camera, size.0, size.1);
        let items = self.collect(device, scene, &camera);

        let batches: Vec<&[DrawItem]> = if items.is_empty() {
            vec![&items[..]]
        } else {
            items.chunks(MAX_OBJECTS_PER_PASS).collect()
        };
        if batches.len() > 1 {
            log::debug!("Scene split into {} passes ({} objects)", batches.len(), items.len());
        }

        for (batch_index, batch) in batches.iter().enumerate() {
            // queue.write_buffer() lands before the submit below, so each
            // batch needs its own submission.
            for (slot, item) in batch.iter().enumerate() {
                let offset = (slot * UNIFORM_ALIGNMENT) as u64;
                queue.write_buffer(&self.uniform_buffer, offset, bytemuck::bytes_of(&item.uniforms));
            }

            let first = batch_index == 0;
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Encoder"),
            });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Scene Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: color_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: if first {
                                wgpu::LoadOp::Clear(wgpu::Color {
                                    r: clear[0] as f64,
                                    g: clear[1] as f64,
                                    b: clear[2] as f64,
                                    a: clear[3] as f64,
                                })
                            } else {
                                wgpu::LoadOp::Load
                            },
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: depth_view,
                        depth_ops: Some(wgpu::Operations {
                            load: if first {
                                wgpu::LoadOp::Clear(1.0)
                            } else {
                                wgpu::LoadOp::Load
                            },
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });

                for (slot, item) in batch.iter().enumerate() {
                    let offset = (slot * UNIFORM_ALIGNMENT) as u32;
                    match &item.shape {
                        DrawShape::Mesh(mesh_type) => {
                            let geometry = self.meshes.get(*mesh_type);
                            pass.set_pipeline(&self.mesh_pipeline);
                            pass.set_bind_group(0, &self.bind_group, &[offset]);
                            pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                            pass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                            pass.draw_indexed(0..geometry.num_indices, 0, 0..1);
                        }
                        DrawShape::Line(buffer, count) => {
                            pass.set_pipeline(&self.line_pipeline);
                            pass.set_bind_group(0, &self.bind_group, &[offset]);
                            pass.set_vertex_buffer(0, buffer.slice(..));
                            pass.draw(0..*count, 0..1);
                        }
                    }
                }
            }
            queue.submit(Some(encoder.finish()));
        }
    }
}

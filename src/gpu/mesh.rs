use wgpu::util::DeviceExt;

use crate::mesh::{geometry_for, Geometry, Vertex};
use crate::scene_graph::{LineStrip, MeshType};

/// Uploaded geometry for a mesh type.
pub struct MeshGeometry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub num_indices: u32,
}

impl MeshGeometry {
    pub fn upload(device: &wgpu::Device, name: &str, geometry: &Geometry) -> Self {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Vertex Buffer", name)),
            contents: bytemuck::cast_slice(&geometry.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        // Pad to a 4-byte multiple for COPY_BUFFER_ALIGNMENT.
        let mut indices = geometry.indices.clone();
        if indices.len() % 2 != 0 {
            indices.push(0);
        }
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{} Index Buffer", name)),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex_buffer,
            index_buffer,
            num_indices: geometry.indices.len() as u32,
        }
    }
}

/// Built-in meshes, uploaded once per device.
pub struct MeshLibrary {
    cube: MeshGeometry,
    plane: MeshGeometry,
    sphere: MeshGeometry,
}

impl MeshLibrary {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            cube: MeshGeometry::upload(device, "Cube", &geometry_for(MeshType::Cube)),
            plane: MeshGeometry::upload(device, "Plane", &geometry_for(MeshType::Plane)),
            sphere: MeshGeometry::upload(device, "Sphere", &geometry_for(MeshType::Sphere)),
        }
    }

    pub fn get(&self, mesh_type: MeshType) -> &MeshGeometry {
        match mesh_type {
            MeshType::Cube => &self.cube,
            MeshType::Plane => &self.plane,
            MeshType::Sphere => &self.sphere,
        }
    }
}

/// Per-frame vertex buffer for a line strip. `None` for fewer than two points.
pub fn upload_line(device: &wgpu::Device, line: &LineStrip) -> Option<(wgpu::Buffer, u32)> {
    if line.len() < 2 {
        return None;
    }
    let vertices: Vec<Vertex> = line
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| Vertex::new(p.to_array(), line.color_at(i).to_array()))
        .collect();
    let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("Line Vertex Buffer"),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    Some((buffer, vertices.len() as u32))
}

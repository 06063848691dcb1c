//! Unit geometry shared by the software rasterizer and the GPU backend.

use bytemuck::{Pod, Zeroable};

use crate::scene_graph::MeshType;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl Vertex {
    pub const fn new(pos: [f32; 3], col: [f32; 3]) -> Self {
        Self { position: pos, color: col }
    }

    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12, // [f32; 3] is 12 bytes
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

const WHITE: [f32; 3] = [1.0, 1.0, 1.0];

/// Indexed triangle geometry.
#[derive(Debug, Clone)]
pub struct Geometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl Geometry {
    /// Iterate triangles as vertex triples.
    pub fn triangles(&self) -> impl Iterator<Item = [&Vertex; 3]> {
        self.indices.chunks_exact(3).map(move |tri| {
            [
                &self.vertices[tri[0] as usize],
                &self.vertices[tri[1] as usize],
                &self.vertices[tri[2] as usize],
            ]
        })
    }
}

/// Geometry for a built-in mesh type.
pub fn geometry_for(mesh_type: MeshType) -> Geometry {
    match mesh_type {
        MeshType::Cube => create_cube_geometry(),
        MeshType::Plane => create_plane_geometry(),
        MeshType::Sphere => create_sphere_geometry(),
    }
}

/// Unit cube centered at origin.
pub fn create_cube_geometry() -> Geometry {
    let vertices = vec![
        // Front face (Z+)
        Vertex::new([-0.5, -0.5, 0.5], WHITE),
        Vertex::new([0.5, -0.5, 0.5], WHITE),
        Vertex::new([0.5, 0.5, 0.5], WHITE),
        Vertex::new([-0.5, 0.5, 0.5], WHITE),
        // Back face (Z-)
        Vertex::new([-0.5, -0.5, -0.5], WHITE),
        Vertex::new([-0.5, 0.5, -0.5], WHITE),
        Vertex::new([0.5, 0.5, -0.5], WHITE),
        Vertex::new([0.5, -0.5, -0.5], WHITE),
        // Top face (Y+)
        Vertex::new([-0.5, 0.5, -0.5], WHITE),
        Vertex::new([-0.5, 0.5, 0.5], WHITE),
        Vertex::new([0.5, 0.5, 0.5], WHITE),
        Vertex::new([0.5, 0.5, -0.5], WHITE),
        // Bottom face (Y-)
        Vertex::new([-0.5, -0.5, -0.5], WHITE),
        Vertex::new([0.5, -0.5, -0.5], WHITE),
        Vertex::new([0.5, -0.5, 0.5], WHITE),
        Vertex::new([-0.5, -0.5, 0.5], WHITE),
        // Right face (X+)
        Vertex::new([0.5, -0.5, -0.5], WHITE),
        Vertex::new([0.5, 0.5, -0.5], WHITE),
        Vertex::new([0.5, 0.5, 0.5], WHITE),
        Vertex::new([0.5, -0.5, 0.5], WHITE),
        // Left face (X-)
        Vertex::new([-0.5, -0.5, -0.5], WHITE),
        Vertex::new([-0.5, -0.5, 0.5], WHITE),
        Vertex::new([-0.5, 0.5, 0.5], WHITE),
        Vertex::new([-0.5, 0.5, -0.5], WHITE),
    ];

    let indices = vec![
        0, 1, 2, 2, 3, 0, // Front
        4, 5, 6, 6, 7, 4, // Back
        8, 9, 10, 10, 11, 8, // Top
        12, 13, 14, 14, 15, 12, // Bottom
        16, 17, 18, 18, 19, 16, // Right
        20, 21, 22, 22, 23, 20, // Left
    ];

    Geometry { vertices, indices }
}

/// Unit plane in the XZ plane (Y up), centered at origin.
pub fn create_plane_geometry() -> Geometry {
    let vertices = vec![
        Vertex::new([-0.5, 0.0, -0.5], WHITE),
        Vertex::new([0.5, 0.0, -0.5], WHITE),
        Vertex::new([0.5, 0.0, 0.5], WHITE),
        Vertex::new([-0.5, 0.0, 0.5], WHITE),
    ];

    let indices = vec![0, 2, 1, 2, 0, 3];

    Geometry { vertices, indices }
}

/// UV sphere centered at origin with radius 0.5.
/// Uses 16 latitude rings and 32 longitude segments.
pub fn create_sphere_geometry() -> Geometry {
    let lat_segments = 16;
    let lon_segments = 32;
    let radius = 0.5;

    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for lat in 0..=lat_segments {
        let theta = std::f32::consts::PI * (lat as f32) / (lat_segments as f32);
        let sin_theta = theta.sin();
        let cos_theta = theta.cos();

        for lon in 0..=lon_segments {
            let phi = 2.0 * std::f32::consts::PI * (lon as f32) / (lon_segments as f32);
            let x = phi.cos() * sin_theta;
            let y = cos_theta;
            let z = phi.sin() * sin_theta;

            vertices.push(Vertex::new([x * radius, y * radius, z * radius], WHITE));
        }
    }

    for lat in 0..lat_segments {
        for lon in 0..lon_segments {
            let first = (lat * (lon_segments + 1) + lon) as u16;
            let second = first + lon_segments as u16 + 1;

            indices.push(first);
            indices.push(first + 1);
            indices.push(second);

            indices.push(second);
            indices.push(first + 1);
            indices.push(second + 1);
        }
    }

    Geometry { vertices, indices }
}

pub mod backend;
pub mod bloom_processor;
pub mod composite;
pub mod context;
pub mod mesh;
pub mod pipeline;
pub mod readback;
pub mod renderer;

pub use backend::{GpuBackend, GpuTarget};
pub use context::GpuContext;

/// Format of the glow and base targets (HDR, so intensities above 1 survive).
pub const HDR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Format of the composited output.
pub const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

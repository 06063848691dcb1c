pub mod backend;
pub mod camera;
pub mod compositor;
pub mod config;
pub mod layers;
pub mod mask;
pub mod material;
pub mod mesh;
pub mod scene_graph;

// Renderers
pub mod gpu;
pub mod software;

// Offline rendering
pub mod cli;
pub mod demo_scenes;
pub mod frame_loop;

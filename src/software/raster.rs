//! Scanline-free triangle and line rasterization.
//!
//! Triangles are filled with edge functions over their screen bounding box,
//! sampled at pixel centers. Faces are not culled. Triangles with a vertex
//! behind the camera (clip w <= 0) are skipped rather than clipped. Line
//! segments are clipped against the near plane and then the viewport, so
//! the walk is bounded by the viewport size.

use glam::{Mat4, Vec3, Vec4};

use crate::camera::Camera;
use crate::mesh::{geometry_for, Geometry};
use crate::scene_graph::{LineStrip, MeshType, ObjectKind, SceneGraph};

use super::frame_buffer::FrameBuffer;

const MIN_CLIP_W: f32 = 1e-5;

/// Unit geometries built once and shared by every draw.
pub struct GeometryCache {
    cube: Geometry,
    plane: Geometry,
    sphere: Geometry,
}

impl GeometryCache {
    pub fn new() -> Self {
        Self {
            cube: geometry_for(MeshType::Cube),
            plane: geometry_for(MeshType::Plane),
            sphere: geometry_for(MeshType::Sphere),
        }
    }

    pub fn get(&self, mesh_type: MeshType) -> &Geometry {
        match mesh_type {
            MeshType::Cube => &self.cube,
            MeshType::Plane => &self.plane,
            MeshType::Sphere => &self.sphere,
        }
    }
}

impl Default for GeometryCache {
    fn default() -> Self {
        Self::new()
    }
}

/// A vertex after projection to screen space.
#[derive(Debug, Clone, Copy)]
struct ScreenVertex {
    x: f32,
    y: f32,
    z: f32,
    color: [f32; 4],
}

fn project(mvp: &Mat4, position: Vec3, color: [f32; 4], width: u32, height: u32) -> Option<ScreenVertex> {
    let clip: Vec4 = *mvp * position.extend(1.0);
    to_screen(clip, color, width, height)
}

fn to_screen(clip: Vec4, color: [f32; 4], width: u32, height: u32) -> Option<ScreenVertex> {
    if clip.w <= MIN_CLIP_W {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    Some(ScreenVertex {
        x: (ndc.x * 0.5 + 0.5) * width as f32,
        y: (0.5 - ndc.y * 0.5) * height as f32,
        z: ndc.z,
        color,
    })
}

#[inline]
fn lerp_color(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    let mut out = a;
    for (c, v) in out.iter_mut().enumerate() {
        *v = a[c] + (b[c] - a[c]) * t;
    }
    out
}

fn lerp_vertex(a: &ScreenVertex, b: &ScreenVertex, t: f32) -> ScreenVertex {
    ScreenVertex {
        x: a.x + (b.x - a.x) * t,
        y: a.y + (b.y - a.y) * t,
        z: a.z + (b.z - a.z) * t,
        color: if a.color == b.color { a.color } else { lerp_color(a.color, b.color, t) },
    }
}

/// Clip a clip-space segment to the near plane (z >= 0 with depth in 0..1).
fn clip_near(a: (Vec4, [f32; 4]), b: (Vec4, [f32; 4])) -> Option<((Vec4, [f32; 4]), (Vec4, [f32; 4]))> {
    let (da, db) = (a.0.z, b.0.z);
    if da < 0.0 && db < 0.0 {
        return None;
    }
    if da >= 0.0 && db >= 0.0 {
        return Some((a, b));
    }
    let t = da / (da - db);
    let cut = (a.0 + (b.0 - a.0) * t, lerp_color(a.1, b.1, t));
    if da < 0.0 {
        Some((cut, b))
    } else {
        Some((a, cut))
    }
}

/// Liang-Barsky clip of a screen-space segment to `[0, width] x [0, height]`.
fn clip_to_viewport(a: ScreenVertex, b: ScreenVertex, width: u32, height: u32) -> Option<(ScreenVertex, ScreenVertex)> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let (mut t0, mut t1) = (0.0f32, 1.0f32);

    for (p, q) in [
        (-dx, a.x),
        (dx, width as f32 - a.x),
        (-dy, a.y),
        (dy, height as f32 - a.y),
    ] {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }

    Some((lerp_vertex(&a, &b, t0), lerp_vertex(&a, &b, t1)))
}

#[inline]
fn edge(a: &ScreenVertex, b: &ScreenVertex, px: f32, py: f32) -> f32 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

#[inline]
fn tint(base: [f32; 4], vertex: [f32; 3], use_vertex: bool) -> [f32; 4] {
    if use_vertex {
        [base[0] * vertex[0], base[1] * vertex[1], base[2] * vertex[2], base[3]]
    } else {
        base
    }
}

fn fill_triangle(fb: &mut FrameBuffer, v: [ScreenVertex; 3]) -> u32 {
    let area = edge(&v[0], &v[1], v[2].x, v[2].y);
    if area.abs() < f32::EPSILON {
        return 0;
    }

    let max_x = fb.width() as f32 - 1.0;
    let max_y = fb.height() as f32 - 1.0;
    let min_px = v.iter().map(|p| p.x).fold(f32::INFINITY, f32::min).floor().max(0.0);
    let max_px = v.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max).ceil().min(max_x);
    let min_py = v.iter().map(|p| p.y).fold(f32::INFINITY, f32::min).floor().max(0.0);
    let max_py = v.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max).ceil().min(max_y);
    if min_px > max_px || min_py > max_py {
        return 0;
    }

    let flat = v[0].color == v[1].color && v[1].color == v[2].color;
    let mut written = 0;
    for y in min_py as u32..=max_py as u32 {
        for x in min_px as u32..=max_px as u32 {
            let px = x as f32 + 0.5;
            let py = y as f32 + 0.5;
            let w0 = edge(&v[1], &v[2], px, py) / area;
            let w1 = edge(&v[2], &v[0], px, py) / area;
            let w2 = edge(&v[0], &v[1], px, py) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let depth = w0 * v[0].z + w1 * v[1].z + w2 * v[2].z;
            let mut color = v[0].color;
            if !flat {
                for (c, out) in color.iter_mut().enumerate() {
                    *out = w0 * v[0].color[c] + w1 * v[1].color[c] + w2 * v[2].color[c];
                }
            }
            if fb.write_fragment(x, y, depth, color) {
                written += 1;
            }
        }
    }
    written
}

fn draw_segment(fb: &mut FrameBuffer, a: ScreenVertex, b: ScreenVertex) -> u32 {
    let (width, height) = fb.size();
    let Some((a, b)) = clip_to_viewport(a, b, width, height) else {
        return 0;
    };
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let steps = dx.abs().max(dy.abs()).ceil().max(1.0) as u32;
    let flat = a.color == b.color;

    let mut written = 0;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let x = a.x + dx * t;
        let y = a.y + dy * t;
        if x < 0.0 || y < 0.0 {
            continue;
        }
        let depth = a.z + (b.z - a.z) * t;
        let color = if flat { a.color } else { lerp_color(a.color, b.color, t) };
        if fb.write_fragment(x as u32, y as u32, depth, color) {
            written += 1;
        }
    }
    written
}

fn draw_mesh(fb: &mut FrameBuffer, geometry: &Geometry, mvp: &Mat4, base: [f32; 4], vertex_colors: bool) -> u32 {
    let (w, h) = fb.size();
    let mut written = 0;
    for tri in geometry.triangles() {
        let projected = [
            project(mvp, Vec3::from(tri[0].position), tint(base, tri[0].color, vertex_colors), w, h),
            project(mvp, Vec3::from(tri[1].position), tint(base, tri[1].color, vertex_colors), w, h),
            project(mvp, Vec3::from(tri[2].position), tint(base, tri[2].color, vertex_colors), w, h),
        ];
        if let [Some(a), Some(b), Some(c)] = projected {
            written += fill_triangle(fb, [a, b, c]);
        }
    }
    written
}

fn draw_line(fb: &mut FrameBuffer, line: &LineStrip, mvp: &Mat4, base: [f32; 4], vertex_colors: bool) -> u32 {
    let (w, h) = fb.size();
    let clipped: Vec<(Vec4, [f32; 4])> = line
        .points
        .iter()
        .enumerate()
        .map(|(i, p)| (*mvp * p.extend(1.0), tint(base, line.color_at(i).to_array(), vertex_colors)))
        .collect();

    let mut written = 0;
    for pair in clipped.windows(2) {
        let Some((a, b)) = clip_near(pair[0], pair[1]) else {
            continue;
        };
        if let (Some(a), Some(b)) = (to_screen(a.0, a.1, w, h), to_screen(b.0, b.1, w, h)) {
            written += draw_segment(fb, a, b);
        }
    }
    written
}

/// Draw every drawable object of `scene` into `fb`. Returns the number of
/// fragments that passed the depth test.
pub fn draw_scene(fb: &mut FrameBuffer, scene: &SceneGraph, camera: &Camera, geometry: &GeometryCache) -> u32 {
    let aspect = fb.width() as f32 / fb.height().max(1) as f32;
    let view_proj = camera.view_projection_matrix(aspect);

    let mut written = 0;
    for (_, object) in scene.renderables() {
        if !object.is_drawable() {
            continue;
        }
        let Some(material) = object.material.as_ref() else {
            continue;
        };
        let mvp = view_proj * object.transform.matrix();
        let base = material.shaded_rgba();

        written += match &object.kind {
            ObjectKind::Mesh(mesh_type) => {
                draw_mesh(fb, geometry.get(*mesh_type), &mvp, base, material.vertex_colors)
            }
            ObjectKind::Line(line) => draw_line(fb, line, &mvp, base, material.vertex_colors),
        };
    }
    written
}

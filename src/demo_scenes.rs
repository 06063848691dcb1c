//! Ready-made scenes for offline renders.
//!
//! Each demo mixes glowing and non-glowing objects so the selective bloom is
//! visible. Random placement is seeded, so a given seed always builds the same
//! scene.

use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::camera::Camera;
use crate::layers::BLOOM_LAYER;
use crate::material::{Color, Material, MaterialRef, MaterialRegistry};
use crate::scene_graph::{EntityId, LineStrip, MeshType, ObjectKind, RenderObject, SceneGraph, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum DemoKind {
    /// Random spheres plus a glowing rainbow curve
    Bloom,
    /// Glowing sphere beside a plain box
    Selective,
    /// Lit building with glowing lamps on a blue backdrop
    Model,
    /// Bright sun with orbiting sparks and a dark planet
    Sun,
    /// Rainbow helix next to a plain ring
    Coil,
    /// Red and green spheres in separate glow groups around a plain blue one
    Spheres,
}

impl DemoKind {
    pub const ALL: [DemoKind; 6] = [
        DemoKind::Bloom,
        DemoKind::Selective,
        DemoKind::Model,
        DemoKind::Sun,
        DemoKind::Coil,
        DemoKind::Spheres,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            DemoKind::Bloom => "bloom",
            DemoKind::Selective => "selective",
            DemoKind::Model => "model",
            DemoKind::Sun => "sun",
            DemoKind::Coil => "coil",
            DemoKind::Spheres => "spheres",
        }
    }

    /// Bloom preset tuned for this demo.
    pub fn preset(&self) -> &'static str {
        match self {
            DemoKind::Bloom => "bloom",
            DemoKind::Selective => "selective",
            DemoKind::Model => "model",
            DemoKind::Sun => "sun",
            DemoKind::Coil => "light",
            DemoKind::Spheres => "sphere",
        }
    }
}

/// Per-frame movement applied by [`DemoScene::advance`].
#[derive(Debug, Clone, Copy)]
enum Motion {
    /// Add `rate * dt` to the Euler rotation.
    Spin { id: EntityId, rate: Vec3 },
    /// Circle `center` in the plane spanned by `u` and `v`.
    Orbit {
        id: EntityId,
        center: Vec3,
        u: Vec3,
        v: Vec3,
        radius: f32,
        rate: f32,
        phase: f32,
    },
}

pub struct DemoScene {
    kind: DemoKind,
    pub scene: SceneGraph,
    pub camera: Camera,
    pub materials: MaterialRegistry,
    motions: Vec<Motion>,
    camera_orbit_rate: f32,
    time: f32,
}

impl DemoScene {
    pub fn build(kind: DemoKind, seed: u64) -> Self {
        let mut demo = Self {
            kind,
            scene: SceneGraph::new(),
            camera: Camera::default(),
            materials: MaterialRegistry::new(),
            motions: Vec::new(),
            camera_orbit_rate: 0.0,
            time: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(seed);

        match kind {
            DemoKind::Bloom => demo.build_bloom(&mut rng),
            DemoKind::Selective => demo.build_selective(),
            DemoKind::Model => demo.build_model(),
            DemoKind::Sun => demo.build_sun(&mut rng),
            DemoKind::Coil => demo.build_coil(),
            DemoKind::Spheres => demo.build_spheres(),
        }
        log::debug!("Built '{}' demo with {} objects", kind.name(), demo.scene.len());
        demo
    }

    pub fn kind(&self) -> DemoKind {
        self.kind
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    /// Step every animation by `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.time += dt;
        for motion in &self.motions {
            match *motion {
                Motion::Spin { id, rate } => {
                    if let Some(object) = self.scene.get_mut(id) {
                        object.transform.rotation += rate * dt;
                    }
                }
                Motion::Orbit {
                    id,
                    center,
                    u,
                    v,
                    radius,
                    rate,
                    phase,
                } => {
                    let angle = phase + rate * self.time;
                    if let Some(object) = self.scene.get_mut(id) {
                        object.transform.position = center + (u * angle.cos() + v * angle.sin()) * radius;
                    }
                }
            }
        }
        if self.camera_orbit_rate != 0.0 {
            self.camera.orbit_y(self.camera_orbit_rate * dt);
        }
    }

    fn solid(&mut self, name: &str, hex: u32, intensity: f32) -> MaterialRef {
        self.materials.get_or_insert_with(name, || {
            Material::builder(name)
                .color(Color::from_hex(hex))
                .intensity(intensity)
                .build()
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn orbit(&mut self, id: EntityId, center: Vec3, u: Vec3, v: Vec3, radius: f32, rate: f32, phase: f32) {
        if let Some(object) = self.scene.get_mut(id) {
            object.transform.position = center + (u * phase.cos() + v * phase.sin()) * radius;
        }
        self.motions.push(Motion::Orbit {
            id,
            center,
            u,
            v,
            radius,
            rate,
            phase,
        });
    }

    fn build_bloom(&mut self, rng: &mut StdRng) {
        self.camera = Camera::new(Vec3::new(0.0, 0.0, 20.0), Vec3::ZERO)
            .with_fov(40.0)
            .with_clip(1.0, 200.0);
        self.camera_orbit_rate = 0.2;

        for i in 0..3 {
            let color = Color::from_hsl(rng.gen(), 0.7, rng.gen::<f32>() * 0.2 + 0.05);
            let material = self.materials.register(
                Material::builder(format!("sphere_{}", i))
                    .color(color)
                    .intensity(4.0)
                    .build(),
            );

            let direction = Vec3::new(
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
                rng.gen_range(-5.0..5.0),
            )
            .try_normalize()
            .unwrap_or(Vec3::X);
            let distance = rng.gen::<f32>() * 4.0 + 2.0;
            // Unit sphere mesh has radius 0.5.
            let scale = (rng.gen::<f32>() * rng.gen::<f32>() + 0.5) * 2.0;

            let mut object = RenderObject::new(ObjectKind::Mesh(MeshType::Sphere))
                .with_transform(Transform::at(direction * distance).with_scale(scale))
                .with_material(material);
            if i != 1 {
                object.layers.enable(BLOOM_LAYER);
            }
            self.scene.spawn(object);
        }

        let line_material = self.materials.get_or_insert_with("rainbow_line", || {
            Material::builder("rainbow_line").vertex_colors(true).build()
        });
        let line = RenderObject::new(ObjectKind::Line(hilbert_curve(20.0)))
            .with_material(line_material)
            .with_layer(BLOOM_LAYER);
        self.scene.spawn(line);
    }

    fn build_selective(&mut self) {
        self.camera = Camera::new(Vec3::new(0.0, 0.0, 30.0), Vec3::ZERO);

        let glow = self.solid("glow_sphere", 0xff33cc, 1.5);
        let sphere = self.scene.spawn(
            RenderObject::new(ObjectKind::Mesh(MeshType::Sphere))
                .with_transform(Transform::at(Vec3::new(-5.0, 0.0, 0.0)).with_scale(6.0))
                .with_material(glow)
                .with_layer(BLOOM_LAYER),
        );

        let plain = self.solid("plain_box", 0x33cc66, 1.0);
        let cube = self.scene.spawn(
            RenderObject::new(ObjectKind::Mesh(MeshType::Cube))
                .with_transform(Transform::at(Vec3::new(5.0, 0.0, 0.0)).with_scale(5.0))
                .with_material(plain),
        );

        self.motions.push(Motion::Spin {
            id: cube,
            rate: Vec3::new(0.4, 0.7, 0.0),
        });
        self.motions.push(Motion::Spin {
            id: sphere,
            rate: Vec3::new(0.0, 0.3, 0.0),
        });
    }

    fn build_model(&mut self) {
        self.camera = Camera::new(Vec3::new(0.0, 6.0, 24.0), Vec3::new(0.0, 2.0, 0.0));
        self.camera_orbit_rate = 0.15;

        let ground = self.solid("ground", 0x2a3340, 1.0);
        self.scene.spawn(
            RenderObject::new(ObjectKind::Mesh(MeshType::Plane))
                .with_transform(Transform::at(Vec3::new(0.0, -2.0, 0.0)).with_scale(24.0))
                .with_material(ground),
        );

        let wall = self.solid("building", 0x8899aa, 1.0);
        let mut body = Transform::at(Vec3::new(0.0, 2.0, 0.0));
        body.scale = Vec3::new(6.0, 8.0, 6.0);
        self.scene.spawn(
            RenderObject::new(ObjectKind::Mesh(MeshType::Cube))
                .with_transform(body)
                .with_material(wall),
        );

        let lamp = self.solid("emitter", 0xfff2cc, 3.0);
        for x in [-3.4, 3.4] {
            self.scene.spawn(
                RenderObject::new(ObjectKind::Mesh(MeshType::Sphere))
                    .with_transform(Transform::at(Vec3::new(x, 6.6, 3.4)).with_scale(1.2))
                    .with_material(lamp.clone())
                    .with_layer(BLOOM_LAYER),
            );
        }
    }

    fn build_sun(&mut self, rng: &mut StdRng) {
        self.camera = Camera::new(Vec3::new(20.0, 0.0, 0.0), Vec3::ZERO).with_clip(1.0, 200.0);

        let sun = self.solid("sun", 0xfdb813, 2.5);
        let sun_id = self.scene.spawn(
            RenderObject::new(ObjectKind::Mesh(MeshType::Sphere))
                .with_transform(Transform::default().with_scale(6.0))
                .with_material(sun)
                .with_layer(BLOOM_LAYER),
        );
        self.motions.push(Motion::Spin {
            id: sun_id,
            rate: Vec3::new(0.0, 0.2, 0.0),
        });

        // The camera looks down -X, so orbits lie in the YZ plane.
        let (u, v) = (Vec3::Z, Vec3::Y);

        let spark = self.solid("spark", 0xffffff, 2.0);
        for _ in 0..24 {
            let id = self.scene.spawn(
                RenderObject::new(ObjectKind::Mesh(MeshType::Sphere))
                    .with_transform(Transform::default().with_scale(0.3))
                    .with_material(spark.clone())
                    .with_layer(BLOOM_LAYER),
            );
            let radius = rng.gen_range(4.5..8.0);
            let rate = rng.gen_range(0.3..1.2);
            let phase = rng.gen_range(0.0..std::f32::consts::TAU);
            self.orbit(id, Vec3::ZERO, u, v, radius, rate, phase);
        }

        let planet = self.solid("planet", 0x2255aa, 1.0);
        let planet_id = self.scene.spawn(
            RenderObject::new(ObjectKind::Mesh(MeshType::Sphere))
                .with_transform(Transform::default().with_scale(2.0))
                .with_material(planet),
        );
        // Passes between the camera and the sun.
        self.orbit(planet_id, Vec3::new(6.0, 0.0, 0.0), u, v, 3.0, 0.5, 0.0);
    }

    fn build_coil(&mut self) {
        self.camera = Camera::new(Vec3::new(0.0, 0.0, 60.0), Vec3::ZERO).with_clip(1.0, 500.0);

        let ring_material = self.materials.get_or_insert_with("ring", || {
            Material::builder("ring").vertex_colors(true).build()
        });
        let ring_object = RenderObject::new(ObjectKind::Line(ring(10.0, Color::rgb(0.0, 1.0, 1.0))))
            .with_transform(Transform::at(Vec3::new(-14.0, 0.0, 0.0)))
            .with_material(ring_material);
        self.scene.spawn(ring_object);

        let helix_material = self.materials.get_or_insert_with("helix", || {
            Material::builder("helix").vertex_colors(true).intensity(1.5).build()
        });
        let helix_id = self.scene.spawn(
            RenderObject::new(ObjectKind::Line(helix(10.0, 4.0, 5)))
                .with_transform(Transform::at(Vec3::new(14.0, 0.0, 0.0)))
                .with_material(helix_material)
                .with_layer(BLOOM_LAYER),
        );
        self.motions.push(Motion::Spin {
            id: helix_id,
            rate: Vec3::new(0.0, 0.6, 0.0),
        });
    }

    /// The second glow group of the "sphere" preset reads layer 2.
    fn build_spheres(&mut self) {
        self.camera = Camera::new(Vec3::new(0.0, 10.0, 10.0), Vec3::ZERO).with_fov(60.0);
        self.camera_orbit_rate = 0.3;

        let spheres = [
            ("red", 0xff0000, -6.0, Some(BLOOM_LAYER)),
            ("blue", 0x0000ff, 0.0, None),
            ("green", 0x00ff00, 6.0, Some(BLOOM_LAYER + 1)),
        ];
        for (name, hex, x, layer) in spheres {
            let material = self.solid(name, hex, 1.0);
            let object = RenderObject::new(ObjectKind::Mesh(MeshType::Sphere))
                .with_transform(Transform::at(Vec3::new(x, 0.0, 0.0)).with_scale(2.0))
                .with_material(material);
            self.scene.spawn(match layer {
                Some(layer) => object.with_layer(layer),
                None => object,
            });
        }
    }
}

/// Corners of a cube of edge `size`, in first-order 3D Hilbert order.
fn hilbert_points(size: f32) -> [Vec3; 8] {
    let h = size / 2.0;
    [
        Vec3::new(-h, h, -h),
        Vec3::new(-h, h, h),
        Vec3::new(-h, -h, h),
        Vec3::new(-h, -h, -h),
        Vec3::new(h, -h, -h),
        Vec3::new(h, -h, h),
        Vec3::new(h, h, h),
        Vec3::new(h, h, -h),
    ]
}

fn catmull_rom(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3, t: f32) -> Vec3 {
    let t2 = t * t;
    let t3 = t2 * t;
    0.5 * ((2.0 * p1)
        + (p2 - p0) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (3.0 * p1 - p0 - 3.0 * p2 + p3) * t3)
}

/// Smooth rainbow curve through a Hilbert path, 12 samples per control point.
pub fn hilbert_curve(size: f32) -> LineStrip {
    let points = hilbert_points(size);
    let n = points.len();
    let divisions = 12 * n;
    let segments = (n - 1) as f32;

    let mut line = LineStrip::new();
    for i in 0..divisions {
        let t = i as f32 / divisions as f32;
        let scaled = t * segments;
        let seg = (scaled.floor() as usize).min(n - 2);
        let local = scaled - seg as f32;

        let p0 = points[seg.saturating_sub(1)];
        let p1 = points[seg];
        let p2 = points[seg + 1];
        let p3 = points[(seg + 2).min(n - 1)];
        line.push(catmull_rom(p0, p1, p2, p3, local), Color::from_hsl(t, 1.0, 0.5));
    }
    line
}

/// Flat circle in the XY plane, one point per degree.
pub fn ring(radius: f32, color: Color) -> LineStrip {
    let mut line = LineStrip::new();
    for i in 0..=360 {
        let angle = (i as f32).to_radians();
        line.push(Vec3::new(angle.sin() * radius, angle.cos() * radius, 0.0), color);
    }
    line
}

/// Helix along Y with a hue gradient from bottom to top.
pub fn helix(radius: f32, pitch: f32, turns: u32) -> LineStrip {
    let steps = 360 * turns.max(1);
    let height = pitch * turns as f32;
    let mut line = LineStrip::new();
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        let angle = (i as f32).to_radians();
        line.push(
            Vec3::new(angle.sin() * radius, t * height - height / 2.0, angle.cos() * radius),
            Color::from_hsl(t, 1.0, 0.5),
        );
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{GlowClassifier, LayerClassifier};

    fn glowing_count(demo: &DemoScene) -> usize {
        let classifier = LayerClassifier::default();
        demo.scene
            .renderables()
            .filter(|(id, object)| classifier.is_glowing(*id, object))
            .count()
    }

    #[test]
    fn test_every_demo_mixes_glow_and_plain() {
        for kind in DemoKind::ALL {
            let demo = DemoScene::build(kind, 7);
            let glowing = glowing_count(&demo);
            assert!(glowing > 0, "{} has no glowing objects", kind.name());
            assert!(glowing < demo.scene.len(), "{} has no plain objects", kind.name());
        }
    }

    #[test]
    fn test_bloom_demo_layout() {
        let demo = DemoScene::build(DemoKind::Bloom, 1);
        assert_eq!(demo.scene.len(), 4);
        assert_eq!(glowing_count(&demo), 3);
    }

    #[test]
    fn test_spheres_demo_uses_both_groups() {
        let demo = DemoScene::build(DemoKind::Spheres, 0);
        assert_eq!(demo.scene.len(), 3);
        assert_eq!(glowing_count(&demo), 1);

        let config = crate::config::BloomConfig::preset(DemoKind::Spheres.preset()).unwrap();
        let group = LayerClassifier::new(crate::layers::Layers::only(config.groups[0].layer));
        let in_group = demo
            .scene
            .renderables()
            .filter(|(id, object)| group.is_glowing(*id, object))
            .count();
        assert_eq!(in_group, 1);
    }

    #[test]
    fn test_same_seed_same_scene() {
        let a = DemoScene::build(DemoKind::Sun, 42);
        let b = DemoScene::build(DemoKind::Sun, 42);
        let positions = |d: &DemoScene| -> Vec<Vec3> {
            d.scene.renderables().map(|(_, o)| o.transform.position).collect()
        };
        assert_eq!(positions(&a), positions(&b));
    }

    #[test]
    fn test_advance_moves_orbits() {
        let mut demo = DemoScene::build(DemoKind::Sun, 3);
        let before: Vec<Vec3> = demo.scene.renderables().map(|(_, o)| o.transform.position).collect();
        demo.advance(0.5);
        let after: Vec<Vec3> = demo.scene.renderables().map(|(_, o)| o.transform.position).collect();
        assert_ne!(before, after);
        assert!((demo.time() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_curves() {
        let curve = hilbert_curve(20.0);
        assert_eq!(curve.len(), 96);
        assert!((curve.points[0] - Vec3::new(-10.0, 10.0, -10.0)).length() < 1e-4);

        let coil = helix(10.0, 4.0, 2);
        assert_eq!(coil.len(), 721);
        assert!((coil.points[0].y + 4.0).abs() < 1e-4);
        assert!((coil.points[720].y - 4.0).abs() < 1e-4);

        assert_eq!(ring(1.0, Color::WHITE).len(), 361);
    }
}

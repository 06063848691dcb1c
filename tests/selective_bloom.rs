use std::sync::Arc;

use glam::Vec3;
use image::RgbaImage;

use selective_bloom::backend::{BackendError, CompositeParams, GlowParams, RenderBackend, TargetUsage};
use selective_bloom::camera::Camera;
use selective_bloom::compositor::{CompositorError, DualCompositor};
use selective_bloom::config::{BloomConfig, GlowGroup, OutputMode};
use selective_bloom::demo_scenes::{DemoKind, DemoScene};
use selective_bloom::layers::{LayerClassifier, BLOOM_LAYER};
use selective_bloom::mask::{MaskController, MaskMode};
use selective_bloom::material::{Color, Material, MaterialRef};
use selective_bloom::scene_graph::{EntityId, MeshType, ObjectKind, RenderObject, SceneGraph, Transform};
use selective_bloom::software::{FrameBuffer, SoftwareBackend};

fn sphere_at(position: Vec3, material: MaterialRef, glowing: bool) -> RenderObject {
    let object = RenderObject::new(ObjectKind::Mesh(MeshType::Sphere))
        .with_transform(Transform::at(position).with_scale(3.0))
        .with_material(material);
    if glowing {
        object.with_layer(BLOOM_LAYER)
    } else {
        object
    }
}

fn solid(name: &str, hex: u32) -> MaterialRef {
    Material::builder(name).color(Color::from_hex(hex)).build().into_ref()
}

fn camera() -> Camera {
    Camera::new(Vec3::new(0.0, 0.0, 12.0), Vec3::ZERO)
}

/// One glowing sphere on the right, two plain ones on the left and middle.
fn three_object_scene() -> (SceneGraph, Vec<(EntityId, MaterialRef)>) {
    let mut scene = SceneGraph::new();
    let mut originals = Vec::new();
    for (x, hex, glowing) in [(-3.0, 0x00ff00, false), (0.0, 0x0000ff, false), (3.0, 0xff00ff, true)] {
        let material = solid("sphere", hex);
        let id = scene.spawn(sphere_at(Vec3::new(x, 0.0, 0.0), Arc::clone(&material), glowing));
        originals.push((id, material));
    }
    (scene, originals)
}

fn compositor(width: u32, height: u32, config: BloomConfig) -> DualCompositor<SoftwareBackend> {
    DualCompositor::new(SoftwareBackend::new(), width, height, config).unwrap()
}

/// Software backend that can be told to fail the glow pass or the effect resize.
struct FlakyBackend {
    inner: SoftwareBackend,
    /// Glow passes that succeed before the next one fails.
    glows_before_failure: usize,
    fail_effects: bool,
}

impl FlakyBackend {
    fn new() -> Self {
        Self {
            inner: SoftwareBackend::new(),
            glows_before_failure: usize::MAX,
            fail_effects: false,
        }
    }
}

impl RenderBackend for FlakyBackend {
    type Target = FrameBuffer;

    fn create_target(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
        usage: TargetUsage,
    ) -> Result<FrameBuffer, BackendError> {
        self.inner.create_target(label, width, height, usage)
    }

    fn target_size(&self, target: &FrameBuffer) -> (u32, u32) {
        self.inner.target_size(target)
    }

    fn render_scene(
        &mut self,
        scene: &SceneGraph,
        camera: &Camera,
        target: &mut FrameBuffer,
        clear: [f32; 4],
    ) -> Result<(), BackendError> {
        self.inner.render_scene(scene, camera, target, clear)
    }

    fn apply_glow(&mut self, target: &mut FrameBuffer, params: &GlowParams) -> Result<(), BackendError> {
        if self.glows_before_failure == 0 {
            return Err(BackendError::Device("glow pass lost".to_string()));
        }
        self.glows_before_failure = self.glows_before_failure.saturating_sub(1);
        self.inner.apply_glow(target, params)
    }

    fn composite(
        &mut self,
        base: &FrameBuffer,
        glow: &FrameBuffer,
        output: &mut FrameBuffer,
        params: &CompositeParams,
    ) -> Result<(), BackendError> {
        self.inner.composite(base, glow, output, params)
    }

    fn add_glow(
        &mut self,
        glow: &FrameBuffer,
        output: &mut FrameBuffer,
        weight: f32,
        clamp: bool,
    ) -> Result<(), BackendError> {
        self.inner.add_glow(glow, output, weight, clamp)
    }

    fn resize_effects(&mut self, width: u32, height: u32, downsample: u32) -> Result<(), BackendError> {
        if self.fail_effects {
            return Err(BackendError::Device("effect resize refused".to_string()));
        }
        self.inner.resize_effects(width, height, downsample)
    }

    fn snapshot(&mut self, target: &FrameBuffer) -> Result<RgbaImage, BackendError> {
        self.inner.snapshot(target)
    }
}

fn group(name: &str, layer: u8, strength: f32) -> GlowGroup {
    GlowGroup {
        name: name.to_string(),
        layer,
        threshold: 0.0,
        strength,
        radius: 3.0,
    }
}

#[test]
fn test_three_objects_one_glowing() {
    let (mut scene, originals) = three_object_scene();
    let mut controller = MaskController::new(MaskMode::Darken);
    let classifier = LayerClassifier::default();

    assert_eq!(controller.saved_len(), 0);
    let summary = controller.mask(&mut scene, &classifier).unwrap();
    assert_eq!(summary.masked, 2);
    assert_eq!(summary.glowing, 1);

    let placeholder = Arc::clone(controller.placeholder());
    let on_placeholder = originals
        .iter()
        .filter(|(id, _)| Arc::ptr_eq(scene.material(*id).unwrap(), &placeholder))
        .count();
    assert_eq!(on_placeholder, 2);

    let restored = controller.restore(&mut scene);
    assert_eq!(restored.restored, 2);
    assert_eq!(controller.saved_len(), 0);
    for (id, material) in &originals {
        assert!(Arc::ptr_eq(scene.material(*id).unwrap(), material));
    }
}

#[test]
fn test_render_frame_restores_original_materials() {
    let (mut scene, originals) = three_object_scene();
    let mut compositor = compositor(64, 64, BloomConfig::default());

    for _ in 0..3 {
        assert_eq!(compositor.mask_controller().saved_len(), 0);
        compositor.render_frame(&mut scene, &camera()).unwrap();
        assert_eq!(compositor.mask_controller().saved_len(), 0);
        for (id, material) in &originals {
            assert!(Arc::ptr_eq(scene.material(*id).unwrap(), material));
        }
    }
    assert_eq!(compositor.frames_rendered(), 3);
}

#[test]
fn test_only_glowing_objects_reach_glow_buffer() {
    let mut scene = SceneGraph::new();
    scene.spawn(sphere_at(Vec3::new(-3.0, 0.0, 0.0), solid("plain", 0x00ff00), false));
    scene.spawn(sphere_at(Vec3::new(3.0, 0.0, 0.0), solid("glow", 0xff00ff), true));

    let config = BloomConfig {
        radius: 2.0,
        ..BloomConfig::default()
    };
    let mut compositor = compositor(64, 64, config);
    compositor.render_frame(&mut scene, &camera()).unwrap();

    // Plain sphere covers the left of the frame, glowing one the right.
    let glow = compositor.glow_target();
    let base = compositor.base_target();
    assert_eq!(&glow.pixel(13, 32)[..3], &[0.0, 0.0, 0.0]);
    assert!(glow.pixel(51, 32)[0] > 0.5);
    assert!(base.pixel(13, 32)[1] > 0.9);
    assert!(base.pixel(51, 32)[2] > 0.9);
}

#[test]
fn test_darken_occludes_and_hide_reveals() {
    let build = || {
        let mut scene = SceneGraph::new();
        scene.spawn(sphere_at(Vec3::new(0.0, 0.0, -5.0), solid("glow", 0xffffff), true));
        scene.spawn(sphere_at(Vec3::ZERO, solid("blocker", 0x808080), false));
        scene
    };
    let config = BloomConfig {
        radius: 0.0,
        ..BloomConfig::default()
    };

    let mut scene = build();
    let mut darken = compositor(48, 48, config.clone());
    darken.render_frame(&mut scene, &camera()).unwrap();
    assert_eq!(darken.glow_target().total_energy(), 0.0);

    let mut scene = build();
    let mut hide = compositor(
        48,
        48,
        BloomConfig {
            mask_mode: MaskMode::Hide,
            ..config
        },
    );
    hide.render_frame(&mut scene, &camera()).unwrap();
    assert!(hide.glow_target().pixel(24, 24)[0] > 0.9);
}

#[test]
fn test_repeated_frames_are_identical() {
    let (mut scene, _) = three_object_scene();
    let mut compositor = compositor(80, 60, BloomConfig::preset("selective").unwrap());

    compositor.render_frame(&mut scene, &camera()).unwrap();
    let first = compositor.snapshot_output().unwrap();
    compositor.render_frame(&mut scene, &camera()).unwrap();
    let second = compositor.snapshot_output().unwrap();

    assert_eq!(first.as_raw(), second.as_raw());
}

#[test]
fn test_zero_strength_output_equals_base() {
    let (mut scene, _) = three_object_scene();
    let config = BloomConfig {
        strength: 0.0,
        radius: 6.0,
        ..BloomConfig::default()
    };
    let mut compositor = compositor(64, 48, config);
    compositor.render_frame(&mut scene, &camera()).unwrap();

    assert!(compositor.glow_target().total_energy() > 0.0);
    assert_eq!(compositor.output().pixels(), compositor.base_target().pixels());
}

#[test]
fn test_glow_only_output_mode() {
    let (mut scene, _) = three_object_scene();
    let config = BloomConfig {
        output_mode: OutputMode::GlowOnly,
        ..BloomConfig::default()
    };
    let mut compositor = compositor(64, 48, config);
    compositor.render_frame(&mut scene, &camera()).unwrap();

    let glow: Vec<[f32; 3]> = compositor.glow_target().pixels().iter().map(|p| [p[0], p[1], p[2]]).collect();
    let output: Vec<[f32; 3]> = compositor.output().pixels().iter().map(|p| [p[0], p[1], p[2]]).collect();
    assert_eq!(glow, output);
}

#[test]
fn test_output_follows_resize() {
    let (mut scene, _) = three_object_scene();
    let mut compositor = compositor(32, 32, BloomConfig::default());

    assert!(compositor.resize(100, 50).unwrap());
    compositor.render_frame(&mut scene, &camera()).unwrap();

    assert_eq!(compositor.glow_target().size(), (100, 50));
    assert_eq!(compositor.base_target().size(), (100, 50));
    assert_eq!(compositor.snapshot_output().unwrap().dimensions(), (100, 50));
    assert_eq!(compositor.backend().effect_size(), (100, 50));
}

#[test]
fn test_same_size_resize_is_noop() {
    let mut compositor = compositor(32, 32, BloomConfig::default());
    assert!(compositor.resize(64, 64).unwrap());
    let allocated = compositor.backend().targets_created();
    let generation = compositor.generation();

    assert!(!compositor.resize(64, 64).unwrap());
    assert_eq!(compositor.backend().targets_created(), allocated);
    assert_eq!(compositor.generation(), generation);
}

#[test]
fn test_objects_added_between_frames_are_classified() {
    let (mut scene, _) = three_object_scene();
    let mut compositor = compositor(32, 32, BloomConfig::default());
    compositor.render_frame(&mut scene, &camera()).unwrap();

    scene.spawn(sphere_at(Vec3::new(0.0, 3.0, 0.0), solid("late", 0xffff00), true));
    let stats = compositor.render_frame(&mut scene, &camera()).unwrap();
    assert_eq!(stats.mask.glowing, 2);
    assert_eq!(stats.mask.masked, 2);
}

#[test]
fn test_demo_scene_animation_frames() {
    let mut demo = DemoScene::build(DemoKind::Sun, 11);
    let originals: Vec<(EntityId, MaterialRef)> = demo
        .scene
        .renderables()
        .filter_map(|(id, o)| o.material.clone().map(|m| (id, m)))
        .collect();

    let mut compositor = compositor(64, 48, BloomConfig::preset(DemoKind::Sun.preset()).unwrap());
    for _ in 0..3 {
        demo.advance(1.0 / 30.0);
        compositor.render_frame(&mut demo.scene, &demo.camera).unwrap();
    }

    for (id, material) in &originals {
        assert!(Arc::ptr_eq(demo.scene.material(*id).unwrap(), material));
    }
    assert!(compositor.output().total_energy() > 0.0);
}

/// Red on the bloom layer, green on layer 2, blue on layer 3, grey plain.
fn layered_scene() -> (SceneGraph, Vec<(EntityId, MaterialRef)>) {
    let mut scene = SceneGraph::new();
    let mut originals = Vec::new();
    let red = solid("red", 0xff0000);
    originals.push((scene.spawn(sphere_at(Vec3::new(-3.0, 2.0, 0.0), Arc::clone(&red), true)), red));
    let green = solid("green", 0x00ff00);
    let id = scene.spawn(sphere_at(Vec3::new(3.0, 2.0, 0.0), Arc::clone(&green), false).with_layer(2));
    originals.push((id, green));
    let blue = solid("blue", 0x0000ff);
    let id = scene.spawn(sphere_at(Vec3::new(-3.0, -2.0, 0.0), Arc::clone(&blue), false).with_layer(3));
    originals.push((id, blue));
    let grey = solid("grey", 0x808080);
    originals.push((scene.spawn(sphere_at(Vec3::new(3.0, -2.0, 0.0), Arc::clone(&grey), false)), grey));
    (scene, originals)
}

#[test]
fn test_glow_groups_blur_their_own_layers() {
    let (mut scene, originals) = layered_scene();
    let config = BloomConfig {
        groups: vec![group("green", 2, 1.0), group("blue", 3, 1.0)],
        ..BloomConfig::default()
    };
    let mut compositor = compositor(64, 48, config);
    let stats = compositor.render_frame(&mut scene, &camera()).unwrap();

    assert_eq!(stats.mask.glowing, 1);
    assert_eq!(stats.groups.len(), 2);
    for group in &stats.groups {
        assert_eq!(group.mask.glowing, 1);
        assert_eq!(group.mask.masked, 3);
        assert_eq!(group.restore.restored, 3);
    }
    for (id, material) in &originals {
        assert!(Arc::ptr_eq(scene.material(*id).unwrap(), material));
    }
    assert_eq!(compositor.mask_controller().saved_len(), 0);

    // Green glows only in the first group, blue only in the second.
    let green = compositor.group_target(0).unwrap();
    let blue = compositor.group_target(1).unwrap();
    assert!(green.pixels().iter().any(|p| p[1] > 0.5));
    assert!(green.pixels().iter().all(|p| p[0] == 0.0 && p[2] == 0.0));
    assert!(blue.pixels().iter().any(|p| p[2] > 0.5));
    assert!(blue.pixels().iter().all(|p| p[0] == 0.0 && p[1] == 0.0));
    assert!(compositor.glow_target().pixels().iter().all(|p| p[1] == 0.0 && p[2] == 0.0));
}

#[test]
fn test_zero_strength_group_adds_nothing() {
    let render = |groups: Vec<GlowGroup>| {
        let (mut scene, _) = layered_scene();
        let config = BloomConfig {
            groups,
            ..BloomConfig::default()
        };
        let mut compositor = compositor(64, 48, config);
        compositor.render_frame(&mut scene, &camera()).unwrap();
        compositor
    };

    let both = render(vec![group("silent", 2, 0.0), group("loud", 3, 2.0)]);
    let loud_only = render(vec![group("loud", 3, 2.0)]);
    let none = render(Vec::new());

    // The silent group still renders and blurs its layer.
    assert!(both.group_target(0).unwrap().total_energy() > 0.0);
    assert_eq!(both.output().pixels(), loud_only.output().pixels());
    assert!(both.output().total_energy() > none.output().total_energy());

    // Output is the primary composite plus 2x the loud group's glow.
    let loud = both.group_target(1).unwrap();
    for (((o, b), g), l) in both
        .output()
        .pixels()
        .iter()
        .zip(both.base_target().pixels())
        .zip(both.glow_target().pixels())
        .zip(loud.pixels())
    {
        for c in 0..3 {
            let expected = (1.0 * b[c] + 1.0 * g[c]) * 1.0 + 2.0 * l[c];
            assert_eq!(o[c], expected);
        }
    }
}

#[test]
fn test_failed_glow_pass_restores_materials() {
    let (mut scene, originals) = three_object_scene();
    let mut compositor = DualCompositor::new(FlakyBackend::new(), 32, 32, BloomConfig::default()).unwrap();
    compositor.backend_mut().glows_before_failure = 0;

    let err = compositor.render_frame(&mut scene, &camera()).unwrap_err();
    assert!(matches!(err, CompositorError::Backend(BackendError::Device(_))));
    assert_eq!(compositor.mask_controller().saved_len(), 0);
    for (id, material) in &originals {
        assert!(Arc::ptr_eq(scene.material(*id).unwrap(), material));
    }
    assert_eq!(compositor.frames_rendered(), 0);

    compositor.backend_mut().glows_before_failure = usize::MAX;
    compositor.render_frame(&mut scene, &camera()).unwrap();
    assert_eq!(compositor.frames_rendered(), 1);
}

#[test]
fn test_failed_group_glow_restores_materials() {
    let (mut scene, originals) = layered_scene();
    let config = BloomConfig {
        groups: vec![group("green", 2, 1.0)],
        ..BloomConfig::default()
    };
    let mut compositor = DualCompositor::new(FlakyBackend::new(), 32, 32, config).unwrap();
    compositor.backend_mut().glows_before_failure = 1;

    assert!(compositor.render_frame(&mut scene, &camera()).is_err());
    assert_eq!(compositor.mask_controller().saved_len(), 0);
    for (id, material) in &originals {
        assert!(Arc::ptr_eq(scene.material(*id).unwrap(), material));
    }
}

#[test]
fn test_failed_set_config_keeps_previous_state() {
    let mut compositor = DualCompositor::new(FlakyBackend::new(), 32, 32, BloomConfig::default()).unwrap();
    compositor.backend_mut().fail_effects = true;

    let update = BloomConfig {
        mask_mode: MaskMode::Hide,
        downsample: 4,
        groups: vec![group("green", 2, 1.0)],
        ..BloomConfig::default()
    };
    assert!(compositor.set_config(update.clone()).is_err());
    assert_eq!(compositor.mask_controller().mode(), MaskMode::Darken);
    assert_eq!(compositor.config(), &BloomConfig::default());
    assert_eq!(compositor.group_count(), 0);

    compositor.backend_mut().fail_effects = false;
    compositor.set_config(update).unwrap();
    assert_eq!(compositor.mask_controller().mode(), MaskMode::Hide);
    assert_eq!(compositor.config().downsample, 4);
    assert_eq!(compositor.group_count(), 1);
}
